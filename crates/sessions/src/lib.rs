//! Session registry for Hermes.
//!
//! One session per paired device: it owns the messaging connection and
//! the success/failure logs of its current dispatch.

pub mod store;

pub use store::{parse_session_id, SessionEntry, SessionSnapshot, SessionStore, SessionSummary};
