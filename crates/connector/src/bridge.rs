//! REST client for an external protocol bridge.
//!
//! The bridge owns the actual network protocol; this side only drives its
//! connection lifecycle:
//!
//! | Call                                 | Purpose                           |
//! |--------------------------------------|-----------------------------------|
//! | `POST /connections`                  | open a connection, returns `id`   |
//! | `POST /connections/{id}/login`       | start pairing, returns `code`     |
//! | `GET /connections/{id}`              | `logged_in` flag / terminal error |
//! | `POST /connections/{id}/messages`    | send `{to, text}`                 |
//! | `POST /connections/{id}/logout`      | unpair the device                 |
//! | `DELETE /connections/{id}`           | close the connection              |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hm_domain::config::{ClientIdentity, MessagingConfig, ProtocolVersion};
use hm_domain::error::{Error, Result};
use hm_domain::trace::TraceEvent;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::traits::{Connector, MessagingConnection};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
struct OpenRequest<'a> {
    version: Option<ProtocolVersion>,
    client: &'a ClientIdentity,
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    code: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionStatus {
    #[serde(default)]
    logged_in: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    text: &'a str,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared HTTP plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct BridgeHttp {
    http: Client,
    base_url: String,
}

impl BridgeHttp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, emit a `BridgeCall` trace event and turn non-2xx
    /// replies into `Error::Upstream`.
    async fn call(&self, endpoint: &str, rb: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let result = rb.header("X-Trace-Id", Uuid::new_v4().to_string()).send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => {
                let status = resp.status();
                TraceEvent::BridgeCall {
                    endpoint: endpoint.to_owned(),
                    status: status.as_u16(),
                    duration_ms,
                }
                .emit();

                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::Upstream(format!(
                        "{endpoint} returned {}: {body}",
                        status.as_u16()
                    )));
                }
                Ok(resp)
            }
            Err(e) => {
                TraceEvent::BridgeCall {
                    endpoint: endpoint.to_owned(),
                    status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                    duration_ms,
                }
                .emit();
                Err(from_reqwest(e))
            }
        }
    }

    async fn json<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            Error::Upstream(format!("failed to parse {endpoint} response: {e}: {body}"))
        })
    }
}

/// Map a `reqwest::Error` into the domain error.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opens bridge connections.  Created once; the `reqwest::Client` pool is
/// shared by every connection it hands out.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    inner: BridgeHttp,
}

impl BridgeConnector {
    pub fn new(cfg: &MessagingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            inner: BridgeHttp {
                http,
                base_url: cfg.bridge_url.trim_end_matches('/').to_owned(),
            },
        })
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self, cfg: &MessagingConfig) -> Result<Arc<dyn MessagingConnection>> {
        let req = OpenRequest {
            version: cfg.version,
            client: &cfg.client,
        };
        let resp = self
            .inner
            .call(
                "POST /connections",
                self.inner.http.post(self.inner.url("/connections")).json(&req),
            )
            .await?;
        let opened: OpenResponse = self.inner.json("POST /connections", resp).await?;

        tracing::debug!(connection_id = %opened.id, "bridge connection opened");

        Ok(Arc::new(BridgeConnection {
            http: self.inner.clone(),
            id: opened.id,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            scan_timeout: Duration::from_secs(cfg.scan_timeout_secs),
            logged_in: AtomicBool::new(false),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct BridgeConnection {
    http: BridgeHttp,
    id: String,
    poll_interval: Duration,
    scan_timeout: Duration,
    logged_in: AtomicBool,
}

impl BridgeConnection {
    fn path(&self, suffix: &str) -> String {
        self.http.url(&format!("/connections/{}{}", self.id, suffix))
    }

    async fn status(&self) -> Result<ConnectionStatus> {
        let resp = self
            .http
            .call("GET /connections/{id}", self.http.http.get(self.path("")))
            .await?;
        self.http.json("GET /connections/{id}", resp).await
    }
}

#[async_trait]
impl MessagingConnection for BridgeConnection {
    async fn login(&self, token_tx: oneshot::Sender<String>) -> Result<()> {
        let resp = self
            .http
            .call(
                "POST /connections/{id}/login",
                self.http.http.post(self.path("/login")),
            )
            .await?;
        let login: LoginResponse = self.http.json("POST /connections/{id}/login", resp).await?;

        if token_tx.send(login.code).is_err() {
            tracing::debug!(connection_id = %self.id, "login code receiver already gone");
        }

        // A failed poll is not terminal; only the bridge's own error or the
        // scan deadline ends pairing.
        let deadline = Instant::now() + self.scan_timeout;
        loop {
            let status = match self.status().await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(connection_id = %self.id, error = %e, "status poll failed");
                    ConnectionStatus::default()
                }
            };
            if let Some(err) = status.error {
                return Err(Error::Upstream(format!("login failed: {err}")));
            }
            if status.logged_in {
                self.logged_in.store(true, Ordering::SeqCst);
                tracing::info!(connection_id = %self.id, "device paired");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "login code not scanned within {}s",
                    self.scan_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn is_authenticated(&self) -> Result<bool> {
        if self.logged_in.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let logged_in = self.status().await?.logged_in;
        if logged_in {
            self.logged_in.store(true, Ordering::SeqCst);
        }
        Ok(logged_in)
    }

    async fn send_text(&self, recipient: &str, body: &str) -> Result<()> {
        let req = SendRequest {
            to: recipient,
            text: body,
        };
        self.http
            .call(
                "POST /connections/{id}/messages",
                self.http.http.post(self.path("/messages")).json(&req),
            )
            .await
            .map(|_| ())
            .map_err(|e| match e {
                Error::Upstream(msg) => Error::Send(msg),
                other => other,
            })
    }

    async fn logout(&self) -> Result<()> {
        self.http
            .call(
                "POST /connections/{id}/logout",
                self.http.http.post(self.path("/logout")),
            )
            .await?;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.http
            .call(
                "DELETE /connections/{id}",
                self.http.http.delete(self.path("")),
            )
            .await?;
        Ok(())
    }
}
