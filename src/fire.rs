//! # Delivery Pipeline
//!
//! Turns a stored descriptor record into bytes on the wire:
//!
//! ```text
//! record ──validate──▶ descriptor ──encode──▶ payload
//!                                                │
//! peers ──resolve──▶ negotiator ──tiers──▶ socket ┴──▶ transmitter ──▶ closed
//! ```
//!
//! Every stage that can block (connect, write) runs on the caller's thread in
//! [`deliver`]; [`fire_async`] moves the whole pipeline onto a blocking worker
//! so an async host is never stalled. Nothing here retries or times out; wrap
//! `fire_async` in `tokio::time::timeout` when a deadline matters.

use crate::bluetooth::{
    self, ConnectionNegotiator, ConnectionTier, NegotiationError, PeerSource, TransmitError,
};
use crate::descriptor::{CommandDescriptor, DescriptorError};
use crate::logutil::escape_log;
use crate::metrics;
use crate::record::DescriptorRecord;
use log::{error, info, warn};
use serde::Serialize;
use std::io;
use std::sync::Arc;

/// What happened to one delivery, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryOutcome {
    Sent,
    PeerNotFound,
    ConnectionFailed,
    WriteFailed,
    InvalidDescriptor,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("invalid descriptor at fire time: {0}")]
    InvalidDescriptor(#[from] DescriptorError),

    #[error("failed to list paired devices: {0}")]
    PeerListUnavailable(#[source] io::Error),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Transmit(#[from] TransmitError),

    #[error("delivery worker stopped: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl DeliveryError {
    pub fn outcome(&self) -> DeliveryOutcome {
        match self {
            DeliveryError::InvalidDescriptor(_) => DeliveryOutcome::InvalidDescriptor,
            DeliveryError::PeerListUnavailable(_) => DeliveryOutcome::PeerNotFound,
            DeliveryError::Negotiation(NegotiationError::PeerNotFound { .. }) => {
                DeliveryOutcome::PeerNotFound
            }
            DeliveryError::Negotiation(NegotiationError::ConnectionFailed { .. }) => {
                DeliveryOutcome::ConnectionFailed
            }
            DeliveryError::Transmit(TransmitError::WriteFailed(_)) => DeliveryOutcome::WriteFailed,
            DeliveryError::Worker(_) => DeliveryOutcome::ConnectionFailed,
        }
    }
}

/// Details of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub address: String,
    pub peer_name: String,
    pub tier: ConnectionTier,
    pub bytes_sent: usize,
}

/// Outcome of any delivery result, for reporting and metrics.
pub fn outcome_of(result: &Result<DeliveryReport, DeliveryError>) -> DeliveryOutcome {
    match result {
        Ok(_) => DeliveryOutcome::Sent,
        Err(e) => e.outcome(),
    }
}

/// Send a validated descriptor to its peer.
pub fn deliver(
    descriptor: &CommandDescriptor,
    peers: &dyn PeerSource,
    negotiator: &ConnectionNegotiator,
) -> Result<DeliveryReport, DeliveryError> {
    // Encode before touching the radio: a placeholder that was substituted
    // with garbage must not cost a connection.
    let payload = descriptor.encoded_payload()?;
    let snapshot = peers
        .paired_peers()
        .map_err(DeliveryError::PeerListUnavailable)?;

    let connection = negotiator.connect(descriptor.address(), &snapshot)?;
    let bytes_sent = bluetooth::send(connection.socket, &payload)?;
    metrics::add_bytes_sent(bytes_sent);

    Ok(DeliveryReport {
        address: descriptor.address().to_string(),
        peer_name: connection.peer.display_name,
        tier: connection.tier,
        bytes_sent,
    })
}

/// Validate a (substituted) record and deliver it, recording the outcome.
pub fn fire(
    record: &DescriptorRecord,
    peers: &dyn PeerSource,
    negotiator: &ConnectionNegotiator,
) -> Result<DeliveryReport, DeliveryError> {
    let result = record
        .descriptor()
        .map_err(DeliveryError::from)
        .and_then(|descriptor| {
            if descriptor.has_placeholders() {
                warn!(
                    "Firing with unsubstituted variables: {}",
                    escape_log(&descriptor.to_string())
                );
            }
            deliver(&descriptor, peers, negotiator)
        });

    let outcome = outcome_of(&result);
    metrics::record_outcome(outcome);
    match &result {
        Ok(report) => info!(
            "Delivered {} bytes to {} over {} tier",
            report.bytes_sent, report.address, report.tier
        ),
        Err(e) => error!("Delivery failed ({:?}): {}", outcome, e),
    }
    result
}

/// Run [`fire`] on a blocking worker thread.
///
/// A worker that dies before reporting is counted here, since [`fire`] never
/// got to record it.
pub async fn fire_async(
    record: DescriptorRecord,
    peers: Arc<dyn PeerSource>,
    negotiator: Arc<ConnectionNegotiator>,
) -> Result<DeliveryReport, DeliveryError> {
    let worker =
        tokio::task::spawn_blocking(move || fire(&record, peers.as_ref(), negotiator.as_ref()));
    match worker.await {
        Ok(result) => result,
        Err(e) => {
            let err = DeliveryError::from(e);
            metrics::record_outcome(err.outcome());
            error!("Delivery failed ({:?}): {}", err.outcome(), err);
            Err(err)
        }
    }
}
