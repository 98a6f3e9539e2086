//! Payload transmission over a connected socket.

use super::{release_socket, RfcommSocket};
use crate::hexcodec;
use log::{debug, error, info};
use std::io::{self, Write};

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("error writing to output stream: {0}")]
    WriteFailed(#[source] io::Error),
}

/// Closes the socket exactly once, on explicit release or on drop.
struct SocketGuard {
    socket: Box<dyn RfcommSocket>,
    released: bool,
}

impl SocketGuard {
    fn new(socket: Box<dyn RfcommSocket>) -> Self {
        Self {
            socket,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            release_socket(self.socket.as_mut());
        }
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Write `payload`, flush, then close the socket whatever happened.
///
/// Returns the number of bytes written. A failure to close is logged only.
pub fn send(socket: Box<dyn RfcommSocket>, payload: &[u8]) -> Result<usize, TransmitError> {
    let mut guard = SocketGuard::new(socket);
    debug!(
        "Writing {} bytes: {}",
        payload.len(),
        hexcodec::preview(payload, 32)
    );

    let result = guard
        .socket
        .write_all(payload)
        .and_then(|_| guard.socket.flush());
    guard.release();

    match result {
        Ok(()) => {
            info!("Sent message successfully ({} bytes)", payload.len());
            Ok(payload.len())
        }
        Err(e) => {
            error!("Error writing to output stream: {}", e);
            Err(TransmitError::WriteFailed(e))
        }
    }
}
