//! Shared types for the Hermes bulk-messaging gateway: configuration,
//! the error taxonomy, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
