//! Hermes gateway: HTTP surface, session handshake and bulk dispatch.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod qr;
pub mod runtime;
pub mod state;
