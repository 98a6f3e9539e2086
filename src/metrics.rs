//! Process-wide delivery counters.
//! Lock-free so concurrent deliveries never contend on them.
use crate::bluetooth::ConnectionTier;
use crate::fire::DeliveryOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static SENT: AtomicU64 = AtomicU64::new(0);
static PEER_NOT_FOUND: AtomicU64 = AtomicU64::new(0);
static CONNECTION_FAILED: AtomicU64 = AtomicU64::new(0);
static WRITE_FAILED: AtomicU64 = AtomicU64::new(0);
static INVALID_DESCRIPTOR: AtomicU64 = AtomicU64::new(0);
static SECURE_CONNECTS: AtomicU64 = AtomicU64::new(0);
static INSECURE_CONNECTS: AtomicU64 = AtomicU64::new(0);
static LEGACY_CONNECTS: AtomicU64 = AtomicU64::new(0);
static TIER_FAILURES: AtomicU64 = AtomicU64::new(0);
static RELEASE_FAILURES: AtomicU64 = AtomicU64::new(0);
static BYTES_SENT: AtomicU64 = AtomicU64::new(0);

pub fn record_outcome(outcome: DeliveryOutcome) {
    let counter = match outcome {
        DeliveryOutcome::Sent => &SENT,
        DeliveryOutcome::PeerNotFound => &PEER_NOT_FOUND,
        DeliveryOutcome::ConnectionFailed => &CONNECTION_FAILED,
        DeliveryOutcome::WriteFailed => &WRITE_FAILED,
        DeliveryOutcome::InvalidDescriptor => &INVALID_DESCRIPTOR,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tier_success(tier: ConnectionTier) {
    let counter = match tier {
        ConnectionTier::Secure => &SECURE_CONNECTS,
        ConnectionTier::Insecure => &INSECURE_CONNECTS,
        ConnectionTier::Legacy => &LEGACY_CONNECTS,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tier_failures() {
    TIER_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_release_failures() {
    RELEASE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn add_bytes_sent(n: usize) {
    BYTES_SENT.fetch_add(n as u64, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub sent: u64,
    pub peer_not_found: u64,
    pub connection_failed: u64,
    pub write_failed: u64,
    pub invalid_descriptor: u64,
    pub secure_connects: u64,
    pub insecure_connects: u64,
    pub legacy_connects: u64,
    pub tier_failures: u64,
    pub release_failures: u64,
    pub bytes_sent: u64,
}

impl Snapshot {
    pub fn deliveries(&self) -> u64 {
        self.sent
            + self.peer_not_found
            + self.connection_failed
            + self.write_failed
            + self.invalid_descriptor
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        sent: SENT.load(Ordering::Relaxed),
        peer_not_found: PEER_NOT_FOUND.load(Ordering::Relaxed),
        connection_failed: CONNECTION_FAILED.load(Ordering::Relaxed),
        write_failed: WRITE_FAILED.load(Ordering::Relaxed),
        invalid_descriptor: INVALID_DESCRIPTOR.load(Ordering::Relaxed),
        secure_connects: SECURE_CONNECTS.load(Ordering::Relaxed),
        insecure_connects: INSECURE_CONNECTS.load(Ordering::Relaxed),
        legacy_connects: LEGACY_CONNECTS.load(Ordering::Relaxed),
        tier_failures: TIER_FAILURES.load(Ordering::Relaxed),
        release_failures: RELEASE_FAILURES.load(Ordering::Relaxed),
        bytes_sent: BYTES_SENT.load(Ordering::Relaxed),
    }
}
