//! SPP links exposed by the OS as serial devices.
//!
//! Linux binds RFCOMM links to `/dev/rfcommN` (`rfcomm bind`), Windows creates
//! an outgoing COM port per paired SPP device. Each connection tier maps to a
//! device path configured for the peer; a tier without one fails immediately
//! so the negotiator moves on.

use super::{ConnectionNegotiator, ConnectionTier, Endpoint, Peer, RfcommSocket, SocketFactory};
use crate::config::{Config, PeerConfig};
use anyhow::Result;
use log::debug;
use serialport::SerialPort;
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

/// Opens the serial device configured for one tier.
pub struct SerialSocketFactory {
    tier: ConnectionTier,
    ports: HashMap<String, String>,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialSocketFactory {
    pub fn new(tier: ConnectionTier, peers: &[PeerConfig], baud_rate: u32, timeout: Duration) -> Self {
        let ports = peers
            .iter()
            .filter_map(|p| {
                let path = match tier {
                    ConnectionTier::Secure => p.port.as_ref(),
                    ConnectionTier::Insecure => p.insecure_port.as_ref(),
                    ConnectionTier::Legacy => p.legacy_port.as_ref(),
                }?;
                Some((p.address.clone(), path.clone()))
            })
            .collect();
        Self {
            tier,
            ports,
            baud_rate,
            timeout,
        }
    }
}

impl SocketFactory for SerialSocketFactory {
    fn create_socket(&self, peer: &Peer, endpoint: &Endpoint) -> io::Result<Box<dyn RfcommSocket>> {
        let path = self.ports.get(&peer.identifier).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {} port configured for {}", self.tier, peer),
            )
        })?;
        debug!("{} -> {} via {}", endpoint, peer, path);
        Ok(Box::new(SerialSocket {
            path: path.clone(),
            baud_rate: self.baud_rate,
            timeout: self.timeout,
            port: None,
        }))
    }
}

/// Negotiator whose three tiers use the serial devices listed in `config`.
pub fn negotiator_from_config(config: &Config) -> Result<ConnectionNegotiator> {
    let bt = &config.bluetooth;
    let timeout = Duration::from_millis(bt.io_timeout_ms);
    let factory = |tier| -> Box<dyn SocketFactory> {
        Box::new(SerialSocketFactory::new(tier, &config.peers, bt.baud_rate, timeout))
    };
    Ok(ConnectionNegotiator::new(
        factory(ConnectionTier::Secure),
        factory(ConnectionTier::Insecure),
        factory(ConnectionTier::Legacy),
    )
    .with_service_uuid(bt.service_uuid()?)
    .with_legacy_channel(bt.legacy_channel))
}

struct SerialSocket {
    path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialSocket {
    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial link not open"))
    }
}

impl Write for SerialSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port_mut()?.flush()
    }
}

impl RfcommSocket for SerialSocket {
    fn connect(&mut self) -> io::Result<()> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{}: {}", self.path, e)))?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        // dropping the handle closes the device
        self.port.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers() -> Vec<PeerConfig> {
        vec![PeerConfig {
            address: "00:11:22:AA:BB:CC".into(),
            name: "HC-05".into(),
            port: Some("/dev/rfcomm0".into()),
            insecure_port: None,
            legacy_port: Some("/dev/rfcomm7".into()),
        }]
    }

    #[test]
    fn tier_without_port_fails_fast() {
        let factory = SerialSocketFactory::new(
            ConnectionTier::Insecure,
            &peers(),
            9600,
            Duration::from_millis(100),
        );
        let peer = Peer::new("00:11:22:AA:BB:CC", "HC-05");
        let endpoint = Endpoint::Service {
            uuid: crate::bluetooth::SERIAL_PORT_SERVICE_UUID,
            secure: false,
        };
        let err = factory.create_socket(&peer, &endpoint).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn unopened_socket_refuses_writes() {
        let factory = SerialSocketFactory::new(
            ConnectionTier::Legacy,
            &peers(),
            9600,
            Duration::from_millis(100),
        );
        let peer = Peer::new("00:11:22:AA:BB:CC", "HC-05");
        let mut socket = factory.create_socket(&peer, &Endpoint::Channel(1)).unwrap();
        let err = socket.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(socket.close().is_ok());
    }
}
