//! # codecsync - protocol synchronization for Cisco Room-OS codecs
//!
//! codecsync keeps a control system in step with a Cisco video codec over its
//! terminal API. It logs in, switches the codec to JSON output, registers for
//! feedback, and then mirrors the codec's calls, presentation, layouts,
//! directory, bookings and status into typed state while sending commands back.
//!
//! ## Features
//!
//! - **Handshake tracking**: six monotonic milestones, exactly one completion per connection.
//! - **Command queue**: a handshake lane that always drains and a feature lane gated on sync.
//! - **Reassembly**: CRLF line splitting and multi-line JSON / feedback-list documents.
//! - **Tagged requests**: `resultid` correlation with timeouts and stale-response rejection.
//! - **State mirrors**: calls, presentation, layouts, phonebook, bookings, codec info.
//! - **Transports**: TCP, RS-232 (feature `serial`) and an in-memory mock.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codecsync::codec::device::CodecDevice;
//! use codecsync::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (device, handle, mut events) = CodecDevice::from_config(&config)?;
//!     tokio::spawn(device.run());
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`codec`] - sans-IO engine, state mirrors and the async device worker
//! - [`protocol`] - line and message reassembly, login, JSON helpers, XSig
//! - [`transport`] - TCP, serial and mock links to the codec
//! - [`config`] - configuration management and validation
//! - [`validation`] - command argument validation and quoting
//! - [`error`] - crate error type
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CodecDevice    │ ← worker loop: timers, reconnect, control requests
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  CodecEngine    │ ← bytes in, CodecEvents out, commands queued
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Transport     │ ← TCP / serial / mock
//! └─────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod transport;
pub mod validation;

pub use error::{CodecError, Result};
