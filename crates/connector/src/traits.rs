//! The capability every messaging backend exposes to the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use hm_domain::config::MessagingConfig;
use hm_domain::error::Result;
use tokio::sync::oneshot;

/// One authenticated (or authenticating) link to the messaging network.
///
/// A connection belongs to exactly one session.  The gateway holds it as
/// `Arc<dyn MessagingConnection>` so the dispatch engine and the session
/// store can share it.
#[async_trait]
pub trait MessagingConnection: Send + Sync {
    /// Run the login flow.
    ///
    /// The login code is delivered through `token_tx` as soon as it is
    /// known; the future itself resolves once the device has been paired
    /// (or the flow failed).  Implementations must send at most once.
    async fn login(&self, token_tx: oneshot::Sender<String>) -> Result<()>;

    async fn is_authenticated(&self) -> Result<bool>;

    /// Deliver one text message to a fully-qualified recipient address.
    async fn send_text(&self, recipient: &str, body: &str) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Factory for new connections, one per session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, cfg: &MessagingConfig) -> Result<Arc<dyn MessagingConnection>>;
}
