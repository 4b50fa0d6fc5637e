//! # coolhub-app
//!
//! Application layer — the control coordinator and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ControlLog` — append & query control events (write-ahead audit log)
//!   - `ControlPublisher` — publish actuator commands and alarms
//! - Define the **inbound message** type the transport feeds into the
//!   coordinator queue
//! - Run the **control coordinator**: the single owner of control mode and
//!   the last issued command
//! - Provide shared infrastructure that doesn't need IO (capped exponential
//!   backoff)
//!
//! ## Dependency rule
//! Depends on `coolhub-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod backoff;
pub mod coordinator;
pub mod inbound;
pub mod ports;
