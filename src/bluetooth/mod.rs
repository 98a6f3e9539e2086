//! # Bluetooth Serial Link Module
//!
//! Everything needed to get bytes onto a serial port profile (SPP) link to a
//! paired device:
//!
//! - [`Peer`] and [`PeerSource`] describe the currently paired devices
//! - [`RfcommSocket`] and [`SocketFactory`] abstract the platform primitives
//! - [`negotiator::ConnectionNegotiator`] walks the connection tiers
//! - [`transmitter::send`] writes a payload and always releases the socket
//!
//! ## Connection Tiers
//!
//! Platform stacks disagree on how SPP connections should be opened, so the
//! negotiator tries, in order:
//!
//! 1. a secure (encrypted) connection to the SPP service UUID
//! 2. an insecure connection to the same UUID
//! 3. a legacy connection straight to RFCOMM channel 1, skipping service lookup
//!
//! Each tier is just another [`SocketFactory`]; the platform layer decides what
//! "secure", "insecure" and "legacy" mean for it.
//!
//! ## Configuration
//!
//! ```toml
//! [bluetooth]
//! service_uuid = "00001101-0000-1000-8000-00805f9b34fb"
//! legacy_channel = 1
//! baud_rate = 9600
//! ```

use log::{error, info};
use std::fmt;
use std::io::{self, Write};
use uuid::Uuid;

pub mod negotiator;
#[cfg(feature = "serial")]
pub mod serial;
pub mod transmitter;

pub use negotiator::{Connection, ConnectionNegotiator, NegotiationError, TierFailure};
pub use transmitter::{send, TransmitError};

/// Well-known service class UUID of the serial port profile.
pub const SERIAL_PORT_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel used when connecting without service lookup.
pub const LEGACY_CHANNEL: u8 = 1;

/// A paired device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub identifier: String,
    pub display_name: String,
}

impl Peer {
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.identifier)
    }
}

/// Supplies a fresh snapshot of paired devices for each delivery.
pub trait PeerSource: Send + Sync {
    fn paired_peers(&self) -> io::Result<Vec<Peer>>;
}

impl PeerSource for Vec<Peer> {
    fn paired_peers(&self) -> io::Result<Vec<Peer>> {
        Ok(self.clone())
    }
}

/// Ranked connection strategies, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionTier {
    Secure,
    Insecure,
    Legacy,
}

impl ConnectionTier {
    /// All tiers in the order they are attempted.
    pub const ALL: [ConnectionTier; 3] = [
        ConnectionTier::Secure,
        ConnectionTier::Insecure,
        ConnectionTier::Legacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionTier::Secure => "secure",
            ConnectionTier::Insecure => "insecure",
            ConnectionTier::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ConnectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tier connects to on the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Look up the service record for `uuid`, optionally requiring encryption.
    Service { uuid: Uuid, secure: bool },
    /// Connect to a fixed RFCOMM channel.
    Channel(u8),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Service { uuid, secure: true } => write!(f, "service {} (secure)", uuid),
            Endpoint::Service { uuid, secure: false } => write!(f, "service {} (insecure)", uuid),
            Endpoint::Channel(ch) => write!(f, "channel {}", ch),
        }
    }
}

/// A stream socket to a peer. Created unconnected by a [`SocketFactory`].
pub trait RfcommSocket: Write + Send {
    /// Block until connected or failed. There is no built-in timeout.
    fn connect(&mut self) -> io::Result<()>;

    /// Release the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

/// Creates sockets for one connection tier.
pub trait SocketFactory: Send + Sync {
    fn create_socket(&self, peer: &Peer, endpoint: &Endpoint) -> io::Result<Box<dyn RfcommSocket>>;
}

impl<F> SocketFactory for F
where
    F: Fn(&Peer, &Endpoint) -> io::Result<Box<dyn RfcommSocket>> + Send + Sync,
{
    fn create_socket(&self, peer: &Peer, endpoint: &Endpoint) -> io::Result<Box<dyn RfcommSocket>> {
        self(peer, endpoint)
    }
}

/// Close a socket, logging rather than propagating a failure.
pub(crate) fn release_socket(socket: &mut dyn RfcommSocket) {
    match socket.close() {
        Ok(()) => info!("Closed socket successfully"),
        Err(e) => {
            crate::metrics::inc_release_failures();
            error!("Exception trying to close socket: {}", e);
        }
    }
}
