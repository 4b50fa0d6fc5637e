//! # coolhub-domain
//!
//! Pure domain model for the coolhub server-room cooling controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Readings** (validated temperature/humidity samples) and the
//!   telemetry decoder that produces them from raw bus payloads
//! - Define **Fan state**, **control mode** and **Commands** (the only
//!   artifact sent to the actuator)
//! - Define **Control events** (the append-only audit record)
//! - Define the **hysteresis policy** and the **override arbiter**
//! - Contain all invariant enforcement and decision logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod alarm;
pub mod arbiter;
pub mod button;
pub mod command;
pub mod event;
pub mod fan;
pub mod policy;
pub mod reading;
pub mod telemetry;
