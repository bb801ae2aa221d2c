//! Session runtime: the login handshake, message construction from an
//! upload, and the batched dispatch engine.

pub mod dispatch;
pub mod handshake;
pub mod template;

pub use dispatch::{into_batches, spawn_dispatch, DispatchReport};
pub use handshake::{open_session, Handshake, HandshakeFailure};
pub use template::{build_messages, expand, Message, PHONE_COLUMN};
