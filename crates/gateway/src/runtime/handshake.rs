//! Login handshake: open a connection, register the session, and wait for
//! the login code without blocking other sessions.
//!
//! The connection's login flow runs on its own task.  It hands the code
//! over through a one-shot channel; a failure travels through a second
//! one-shot so the waiting caller always learns why no code arrived.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hm_connector::Connector;
use hm_domain::config::MessagingConfig;
use hm_domain::error::Error;
use hm_domain::trace::TraceEvent;
use hm_sessions::SessionStore;
use tokio::sync::oneshot;
use uuid::Uuid;

/// A registered session and the code the user has to scan.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub session_id: Uuid,
    pub code: String,
}

/// Why a handshake did not produce a code.
///
/// `session_id` is set when the session had already been registered; it
/// stays in the store until cleaned up.
#[derive(Debug)]
pub struct HandshakeFailure {
    pub session_id: Option<Uuid>,
    pub error: Error,
}

impl HandshakeFailure {
    fn before_registration(error: Error) -> Self {
        Self {
            session_id: None,
            error: upstream(error),
        }
    }
}

pub async fn open_session(
    connector: &dyn Connector,
    sessions: &Arc<SessionStore>,
    cfg: &MessagingConfig,
) -> std::result::Result<Handshake, HandshakeFailure> {
    let started = Instant::now();
    let connection = connector
        .connect(cfg)
        .await
        .map_err(HandshakeFailure::before_registration)?;

    let session_id = sessions.create(connection.clone());

    let (token_tx, token_rx) = oneshot::channel::<String>();
    let (fail_tx, fail_rx) = oneshot::channel::<Error>();

    let login_conn = connection.clone();
    tokio::spawn(async move {
        match login_conn.login(token_tx).await {
            Ok(()) => tracing::info!(%session_id, "session logged in"),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "login failed");
                if let Err(e) = login_conn.disconnect().await {
                    tracing::warn!(%session_id, error = %e, "disconnect after failed login failed");
                }
                if fail_tx.send(e).is_err() {
                    tracing::debug!(%session_id, "login failed after the code was delivered");
                }
            }
        }
    });

    let wait = async move {
        match token_rx.await {
            Ok(code) => Ok(code),
            // The token sender is dropped when login returns, so the real
            // reason (if any) is on the failure channel.
            Err(_) => Err(fail_rx
                .await
                .unwrap_or_else(|_| Error::Upstream("login ended without a code".into()))),
        }
    };

    let timeout = Duration::from_secs(cfg.login_timeout_secs);
    let outcome = match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => {
            if let Err(e) = connection.disconnect().await {
                tracing::warn!(%session_id, error = %e, "disconnect after login timeout failed");
            }
            Err(Error::Upstream(format!(
                "no login code within {}s",
                timeout.as_secs()
            )))
        }
    };

    match outcome {
        Ok(code) => {
            TraceEvent::HandshakeCompleted {
                session_id: session_id.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            }
            .emit();
            Ok(Handshake { session_id, code })
        }
        Err(error) => {
            let error = upstream(error);
            TraceEvent::HandshakeFailed {
                session_id: session_id.to_string(),
                reason: error.to_string(),
            }
            .emit();
            Err(HandshakeFailure {
                session_id: Some(session_id),
                error,
            })
        }
    }
}

fn upstream(e: Error) -> Error {
    match e {
        Error::Upstream(_) => e,
        other => Error::Upstream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use hm_connector::{LoopbackConnector, MessagingConnection};
    use hm_domain::error::Result;

    use super::*;

    enum LoginBehavior {
        Fail,
        Hang,
        CodeThenFail,
    }

    struct ScriptedConnection {
        behavior: LoginBehavior,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MessagingConnection for ScriptedConnection {
        async fn login(&self, token_tx: oneshot::Sender<String>) -> Result<()> {
            match self.behavior {
                LoginBehavior::Fail => Err(Error::Http("connection refused".into())),
                LoginBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                LoginBehavior::CodeThenFail => {
                    let _ = token_tx.send("code-1".into());
                    Err(Error::Timeout("not scanned".into()))
                }
            }
        }
        async fn is_authenticated(&self) -> Result<bool> {
            Ok(false)
        }
        async fn send_text(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn logout(&self) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<()> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedConnector {
        behavior: fn() -> LoginBehavior,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _: &MessagingConfig) -> Result<Arc<dyn MessagingConnection>> {
            Ok(Arc::new(ScriptedConnection {
                behavior: (self.behavior)(),
                disconnected: self.disconnected.clone(),
            }))
        }
    }

    fn scripted(behavior: fn() -> LoginBehavior) -> (ScriptedConnector, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            ScriptedConnector {
                behavior,
                disconnected: flag.clone(),
            },
            flag,
        )
    }

    #[tokio::test]
    async fn loopback_handshake_registers_idle_session() {
        let sessions = Arc::new(SessionStore::new());
        let hs = open_session(&LoopbackConnector, &sessions, &MessagingConfig::default())
            .await
            .unwrap();
        assert!(hs.code.starts_with("loopback-"));
        let snap = sessions.get(&hs.session_id).unwrap();
        assert!(!snap.processing);
        assert!(snap.success.is_empty() && snap.failures.is_empty());
    }

    #[tokio::test]
    async fn login_failure_disconnects_and_surfaces_upstream_error() {
        let (connector, disconnected) = scripted(|| LoginBehavior::Fail);
        let sessions = Arc::new(SessionStore::new());
        let failure = open_session(&connector, &sessions, &MessagingConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, Error::Upstream(ref m) if m.contains("connection refused")));
        assert!(disconnected.load(Ordering::SeqCst));
        let id = failure.session_id.unwrap();
        assert!(sessions.get(&id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_code_times_out() {
        let (connector, disconnected) = scripted(|| LoginBehavior::Hang);
        let sessions = Arc::new(SessionStore::new());
        let cfg = MessagingConfig {
            login_timeout_secs: 2,
            ..Default::default()
        };
        let failure = open_session(&connector, &sessions, &cfg).await.unwrap_err();
        assert!(matches!(failure.error, Error::Upstream(ref m) if m.contains("2s")));
        assert!(disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_after_code_is_only_logged() {
        let (connector, _) = scripted(|| LoginBehavior::CodeThenFail);
        let sessions = Arc::new(SessionStore::new());
        let hs = open_session(&connector, &sessions, &MessagingConfig::default())
            .await
            .unwrap();
        assert_eq!(hs.code, "code-1");
    }
}
