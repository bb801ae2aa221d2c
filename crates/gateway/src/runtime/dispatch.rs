//! Batch dispatch engine.
//!
//! Messages are split into consecutive batches of `concurrency` items.
//! Every batch runs on its own [`JoinSet`] and is drained completely before
//! the next one starts, so at most `concurrency` sends are in flight.
//! Outcomes flow through an `mpsc` channel to a single aggregator task,
//! which is the only writer of the session's logs during a dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hm_connector::MessagingConnection;
use hm_domain::error::{Error, Result};
use hm_domain::trace::TraceEvent;
use hm_sessions::SessionStore;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use super::template::Message;

/// Totals for one finished dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub session_id: Uuid,
    pub sent: usize,
    pub failed: usize,
}

/// Split `messages` into consecutive chunks of at most `size`, preserving
/// order.
pub fn into_batches(messages: Vec<Message>, size: usize) -> Vec<Vec<Message>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(messages.len().div_ceil(size));
    let mut iter = messages.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

/// Claim the session and start sending in the background.
///
/// Returns as soon as the session is marked as processing.  Fails without
/// side effects if the session is unknown or already dispatching.
pub fn spawn_dispatch(
    store: Arc<SessionStore>,
    session_id: Uuid,
    messages: Vec<Message>,
    concurrency: usize,
) -> Result<JoinHandle<DispatchReport>> {
    if concurrency == 0 {
        return Err(Error::Validation("concurrency must be positive".into()));
    }
    let connection = store.begin_dispatch(&session_id)?;
    Ok(tokio::spawn(run(
        store,
        session_id,
        connection,
        messages,
        concurrency,
    )))
}

async fn run(
    store: Arc<SessionStore>,
    session_id: Uuid,
    connection: Arc<dyn MessagingConnection>,
    messages: Vec<Message>,
    concurrency: usize,
) -> DispatchReport {
    let started = Instant::now();
    let batches = into_batches(messages, concurrency);

    TraceEvent::DispatchStarted {
        session_id: session_id.to_string(),
        messages: batches.iter().map(Vec::len).sum(),
        batch_size: concurrency,
        batches: batches.len(),
    }
    .emit();

    let (tx, rx) = mpsc::channel::<Message>(concurrency);
    let aggregator = tokio::spawn(aggregate(store.clone(), session_id, rx));

    let mut report = DispatchReport {
        session_id,
        sent: 0,
        failed: 0,
    };

    for (index, batch) in batches.into_iter().enumerate() {
        tracing::debug!(%session_id, batch = index, size = batch.len(), "sending batch");

        let mut set = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(batch.len());
        for message in batch {
            let conn = connection.clone();
            let pending = message.clone();
            let handle = set.spawn(async move { send_one(conn.as_ref(), message).await });
            in_flight.insert(handle.id(), pending);
        }

        // Join barrier: the next batch starts only after every send here
        // has finished.
        while let Some(joined) = set.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, message)) => {
                    in_flight.remove(&id);
                    message
                }
                Err(e) => {
                    let Some(mut message) = in_flight.remove(&e.id()) else {
                        tracing::error!(%session_id, error = %e, "unknown send task failed");
                        continue;
                    };
                    message.mark_failed(format!("send task failed: {e}"));
                    message
                }
            };

            if outcome.sent {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
            if tx.send(outcome).await.is_err() {
                tracing::error!(%session_id, "dispatch aggregator stopped early");
            }
        }
    }

    drop(tx);
    if let Err(e) = aggregator.await {
        tracing::error!(%session_id, error = %e, "dispatch aggregator task failed");
    }

    if let Err(e) = connection.logout().await {
        tracing::warn!(%session_id, error = %e, "logout after dispatch failed");
    }
    if let Err(e) = connection.disconnect().await {
        tracing::warn!(%session_id, error = %e, "disconnect after dispatch failed");
    }

    if store
        .update(&session_id, |entry| entry.processing = false)
        .is_err()
    {
        tracing::debug!(%session_id, "session removed during dispatch");
    }

    TraceEvent::DispatchFinished {
        session_id: session_id.to_string(),
        sent: report.sent,
        failed: report.failed,
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();

    report
}

async fn send_one(conn: &dyn MessagingConnection, mut message: Message) -> Message {
    match conn.send_text(&message.recipient, &message.body).await {
        Ok(()) => message.mark_sent(),
        Err(e) => message.mark_failed(e),
    }
    message
}

/// Drain outcomes into the session's logs until every sender is gone.
async fn aggregate(store: Arc<SessionStore>, session_id: Uuid, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        if message.sent {
            tracing::debug!(%session_id, "{}", message.log);
        } else {
            tracing::warn!(%session_id, "{}", message.log);
        }
        if store
            .update(&session_id, |entry| entry.record(message.sent, message.log))
            .is_err()
        {
            tracing::debug!(%session_id, "session removed; dropping dispatch outcome");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
