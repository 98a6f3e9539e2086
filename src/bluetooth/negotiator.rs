//! Tiered connection establishment.

use super::{
    release_socket, ConnectionTier, Endpoint, Peer, RfcommSocket, SocketFactory, LEGACY_CHANNEL,
    SERIAL_PORT_SERVICE_UUID,
};
use crate::metrics;
use log::{debug, error, info};
use std::fmt;
use std::io;
use uuid::Uuid;

/// A tier that did not produce a connection, and why.
#[derive(Debug)]
pub struct TierFailure {
    pub tier: ConnectionTier,
    pub error: io::Error,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("MAC address {address} is not in the paired list")]
    PeerNotFound { address: String },

    #[error("could not connect to {address}: {}", join_failures(.failures))]
    ConnectionFailed {
        address: String,
        failures: Vec<TierFailure>,
    },
}

fn join_failures(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A connected socket and the tier that produced it.
pub struct Connection {
    pub peer: Peer,
    pub tier: ConnectionTier,
    pub socket: Box<dyn RfcommSocket>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Resolves an address against a peer snapshot and connects through the
/// first tier that works.
pub struct ConnectionNegotiator {
    secure: Box<dyn SocketFactory>,
    insecure: Box<dyn SocketFactory>,
    legacy: Box<dyn SocketFactory>,
    service_uuid: Uuid,
    legacy_channel: u8,
}

impl ConnectionNegotiator {
    pub fn new(
        secure: Box<dyn SocketFactory>,
        insecure: Box<dyn SocketFactory>,
        legacy: Box<dyn SocketFactory>,
    ) -> Self {
        Self {
            secure,
            insecure,
            legacy,
            service_uuid: SERIAL_PORT_SERVICE_UUID,
            legacy_channel: LEGACY_CHANNEL,
        }
    }

    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    pub fn with_legacy_channel(mut self, channel: u8) -> Self {
        self.legacy_channel = channel;
        self
    }

    /// Exact, case-sensitive lookup of `address` among `peers`.
    pub fn resolve<'a>(address: &str, peers: &'a [Peer]) -> Option<&'a Peer> {
        peers.iter().find(|p| p.identifier == address)
    }

    /// Connect to `address`, trying secure, insecure and legacy tiers in turn.
    ///
    /// Blocks for as long as the underlying primitives do. Nothing is attempted
    /// when the address is not in `peers`.
    pub fn connect(&self, address: &str, peers: &[Peer]) -> Result<Connection, NegotiationError> {
        let peer = match Self::resolve(address, peers) {
            Some(peer) => peer,
            None => {
                error!("MAC address provided is not in paired list: {}", address);
                return Err(NegotiationError::PeerNotFound {
                    address: address.to_string(),
                });
            }
        };

        let mut failures = Vec::new();
        for tier in ConnectionTier::ALL {
            match self.attempt(tier, peer) {
                Ok(socket) => {
                    info!("Successfully connected to {} ({} tier)", peer, tier);
                    metrics::inc_tier_success(tier);
                    return Ok(Connection {
                        peer: peer.clone(),
                        tier,
                        socket,
                    });
                }
                Err(e) => {
                    error!("Error creating {} socket for {}: {}", tier, peer, e);
                    metrics::inc_tier_failures();
                    failures.push(TierFailure { tier, error: e });
                }
            }
        }

        Err(NegotiationError::ConnectionFailed {
            address: address.to_string(),
            failures,
        })
    }

    fn plan(&self, tier: ConnectionTier) -> (&dyn SocketFactory, Endpoint) {
        match tier {
            ConnectionTier::Secure => (
                self.secure.as_ref(),
                Endpoint::Service {
                    uuid: self.service_uuid,
                    secure: true,
                },
            ),
            ConnectionTier::Insecure => (
                self.insecure.as_ref(),
                Endpoint::Service {
                    uuid: self.service_uuid,
                    secure: false,
                },
            ),
            ConnectionTier::Legacy => (self.legacy.as_ref(), Endpoint::Channel(self.legacy_channel)),
        }
    }

    fn attempt(&self, tier: ConnectionTier, peer: &Peer) -> io::Result<Box<dyn RfcommSocket>> {
        let (factory, endpoint) = self.plan(tier);
        debug!("Trying {} tier: {} on {}", tier, endpoint, peer);
        let mut socket = factory.create_socket(peer, &endpoint)?;
        match socket.connect() {
            Ok(()) => Ok(socket),
            Err(e) => {
                // half-open sockets must not outlive their tier
                release_socket(socket.as_mut());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct ScriptedSocket {
        name: &'static str,
        connect_ok: bool,
        log: Log,
    }

    impl Write for ScriptedSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RfcommSocket for ScriptedSocket {
        fn connect(&mut self) -> io::Result<()> {
            self.log.lock().unwrap().push(format!("connect {}", self.name));
            if self.connect_ok {
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
        }
        fn close(&mut self) -> io::Result<()> {
            self.log.lock().unwrap().push(format!("close {}", self.name));
            Ok(())
        }
    }

    fn tier(name: &'static str, connect_ok: bool, log: &Log) -> Box<dyn SocketFactory> {
        let log = log.clone();
        Box::new(
            move |_: &Peer, endpoint: &Endpoint| -> io::Result<Box<dyn RfcommSocket>> {
                log.lock().unwrap().push(format!("create {} {}", name, endpoint));
                Ok(Box::new(ScriptedSocket {
                    name,
                    connect_ok,
                    log: log.clone(),
                }))
            },
        )
    }

    fn peers() -> Vec<Peer> {
        vec![
            Peer::new("00:11:22:AA:BB:CC", "HC-05"),
            Peer::new("11:22:33:44:55:66", "Printer"),
        ]
    }

    #[test]
    fn unknown_address_touches_no_tier() {
        let log: Log = Default::default();
        let negotiator = ConnectionNegotiator::new(
            tier("secure", true, &log),
            tier("insecure", true, &log),
            tier("legacy", true, &log),
        );
        let err = negotiator.connect("00:11:22:aa:bb:cc", &peers()).unwrap_err();
        assert!(matches!(err, NegotiationError::PeerNotFound { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn first_tier_wins() {
        let log: Log = Default::default();
        let negotiator = ConnectionNegotiator::new(
            tier("secure", true, &log),
            tier("insecure", true, &log),
            tier("legacy", true, &log),
        );
        let conn = negotiator.connect("11:22:33:44:55:66", &peers()).unwrap();
        assert_eq!(conn.tier, ConnectionTier::Secure);
        assert_eq!(conn.peer.display_name, "Printer");
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "create secure service 00001101-0000-1000-8000-00805f9b34fb (secure)",
                "connect secure",
            ]
        );
    }

    #[test]
    fn legacy_uses_configured_channel() {
        let log: Log = Default::default();
        let negotiator = ConnectionNegotiator::new(
            tier("secure", false, &log),
            tier("insecure", false, &log),
            tier("legacy", true, &log),
        )
        .with_legacy_channel(3);
        let conn = negotiator.connect("00:11:22:AA:BB:CC", &peers()).unwrap();
        assert_eq!(conn.tier, ConnectionTier::Legacy);
        assert!(log
            .lock()
            .unwrap()
            .contains(&"create legacy channel 3".to_string()));
    }

    #[test]
    fn factory_error_advances_to_next_tier() {
        let log: Log = Default::default();
        let broken: Box<dyn SocketFactory> =
            Box::new(|_: &Peer, _: &Endpoint| -> io::Result<Box<dyn RfcommSocket>> {
                Err(io::Error::new(io::ErrorKind::Unsupported, "no api"))
            });
        let negotiator =
            ConnectionNegotiator::new(broken, tier("insecure", true, &log), tier("legacy", true, &log));
        let conn = negotiator.connect("00:11:22:AA:BB:CC", &peers()).unwrap();
        assert_eq!(conn.tier, ConnectionTier::Insecure);
    }

    #[test]
    fn all_tiers_failing_reports_each_failure() {
        let log: Log = Default::default();
        let negotiator = ConnectionNegotiator::new(
            tier("secure", false, &log),
            tier("insecure", false, &log),
            tier("legacy", false, &log),
        );
        match negotiator.connect("00:11:22:AA:BB:CC", &peers()) {
            Err(NegotiationError::ConnectionFailed { failures, .. }) => {
                let tiers: Vec<_> = failures.iter().map(|f| f.tier).collect();
                assert_eq!(tiers, ConnectionTier::ALL.to_vec());
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let closes = log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.starts_with("close"))
            .count();
        assert_eq!(closes, 3);
    }
}
