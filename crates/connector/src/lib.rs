//! `hm-connector`: messaging connections for Hermes.
//!
//! Provides the [`MessagingConnection`] / [`Connector`] traits the gateway
//! drives, a REST implementation against an external protocol bridge
//! ([`BridgeConnector`]), an in-process dry run ([`LoopbackConnector`]),
//! and recipient address formatting.
//!
//! # Backend selection
//!
//! Use [`create_connector`] to build the right implementation from the
//! `messaging.backend` config field:
//!
//! | Backend    | Implementation       | Best for                         |
//! |------------|----------------------|----------------------------------|
//! | `bridge`   | `BridgeConnector`    | Production delivery (default)    |
//! | `loopback` | `LoopbackConnector`  | Rehearsing uploads, local dev    |

pub mod address;
pub mod bridge;
pub mod loopback;
pub mod traits;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use address::recipient_address;
pub use bridge::{from_reqwest, BridgeConnection, BridgeConnector};
pub use loopback::{LoopbackConnection, LoopbackConnector};
pub use traits::{Connector, MessagingConnection};

use std::sync::Arc;

use hm_domain::config::{MessagingBackend, MessagingConfig};
use hm_domain::error::Result;

/// Create the [`Connector`] selected by `cfg.backend`.
pub fn create_connector(cfg: &MessagingConfig) -> Result<Arc<dyn Connector>> {
    match cfg.backend {
        MessagingBackend::Bridge => {
            let connector = BridgeConnector::new(cfg)?;
            tracing::info!(bridge_url = %cfg.bridge_url, "using bridge messaging backend");
            Ok(Arc::new(connector))
        }
        MessagingBackend::Loopback => {
            tracing::warn!("using loopback messaging backend; nothing will be delivered");
            Ok(Arc::new(LoopbackConnector))
        }
    }
}
