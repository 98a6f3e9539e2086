//! # btserial - Bluetooth Serial Sender for Automation Triggers
//!
//! btserial sends a byte payload to a previously paired Bluetooth serial port
//! profile (SPP) device whenever an automation fires. The operator describes
//! the action once (target address, message, formatting flags); the tool
//! validates it up front and turns it into exact bytes at fire time.
//!
//! ## Features
//!
//! - **Strict Validation**: hardware addresses, hex payloads and empty-message rules are
//!   checked before an action is saved, with one clear error per mistake.
//! - **Deferred Variables**: `%name` placeholders in the address or message are
//!   substituted by the host when the action fires.
//! - **Tiered Connections**: secure, insecure and legacy channel connections are tried in
//!   turn, because platform stacks disagree on which one works.
//! - **Guaranteed Cleanup**: every socket opened along the way is closed exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use btserial::config::Config;
//! use btserial::record::DescriptorRecord;
//!
//! # #[cfg(feature = "serial")]
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("btserial.toml").await?;
//!     let negotiator = btserial::bluetooth::serial::negotiator_from_config(&config)?;
//!     let record = DescriptorRecord::generate("00:11:22:AA:BB:CC", "AT", true, false)?;
//!     let report = btserial::fire::fire(&record, &config.peers, &negotiator)?;
//!     println!("sent {} bytes over the {} tier", report.bytes_sent, report.tier);
//!     Ok(())
//! }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```
//!
//! ## Module Organization
//!
//! - [`hexcodec`] - strict hex text to byte conversion
//! - [`address`] - hardware address and placeholder recognition
//! - [`descriptor`] - validated send commands, payload encoding and summaries
//! - [`record`] - the persisted key/value form of a descriptor
//! - [`bluetooth`] - peers, connection tiers, negotiation and transmission
//! - [`fire`] - the end-to-end delivery pipeline
//! - [`config`] - configuration loading
//! - [`metrics`] - delivery counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Descriptor    │ ← validation, payload, summary
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Negotiator    │ ← peer resolution, secure → insecure → legacy
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Transmitter   │ ← write, flush, close once
//! └─────────────────┘
//! ```

pub mod address;
pub mod bluetooth;
pub mod config;
pub mod descriptor;
pub mod fire;
pub mod hexcodec;
pub mod logutil;
pub mod metrics;
pub mod record;
