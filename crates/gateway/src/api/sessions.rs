//! Session endpoints.
//!
//! Every route except creation identifies its session through the
//! `session` request header; creation returns the new id in the same
//! header.

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde_json::json;
use uuid::Uuid;

use hm_domain::error::Error;
use hm_sessions::{parse_session_id, SessionSnapshot};

use super::error::ApiError;
use super::SESSION_HEADER;
use crate::qr;
use crate::runtime::{build_messages, open_session, spawn_dispatch};
use crate::state::AppState;

/// Raw `session` header value, or a 400 when it is absent.
fn session_header(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation("session ID not passed".into()).into())
}

fn session_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    Ok(parse_session_id(session_header(headers)?)?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Open a connection, register a session and return the login code as a
/// PNG `data:` URL.
pub async fn create_session(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let handshake = open_session(
        state.connector.as_ref(),
        &state.sessions,
        &state.config.messaging,
    )
    .await
    .map_err(|f| ApiError::from(f.error).with_session(f.session_id))?;

    let image = qr::render_data_url(&handshake.code, state.config.qr.size)
        .map_err(|e| ApiError::from(e).with_session(Some(handshake.session_id)))?;

    Ok((
        StatusCode::OK,
        [(SESSION_HEADER, handshake.session_id.to_string())],
        image,
    ))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions/logged-in
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn logged_in(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = session_id(&headers)?;
    let connection = state.sessions.connection(&id)?;
    let logged_in = connection.is_authenticated().await?;
    Ok(Json(json!({ "loggedIn": logged_in })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/sessions/send
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accept a body template plus a CSV of recipients and start sending in
/// the background.  Progress is read back through `/v1/sessions/logs`.
pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = session_id(&headers)?;
    let connection = state.sessions.connection(&id)?;

    let mut body = String::new();
    let mut file: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Upload(e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("body") => {
                body = field.text().await.map_err(|e| Error::Upload(e.to_string()))?;
            }
            Some("file") => {
                let bytes = field.bytes().await.map_err(|e| Error::Upload(e.to_string()))?;
                file = Some(bytes.to_vec());
            }
            other => tracing::debug!(field = ?other, "ignoring unknown form field"),
        }
    }

    if body.trim().is_empty() {
        return Err(Error::Validation("body not specified in request form".into()).into());
    }
    let file = file.ok_or_else(|| Error::Upload("file not specified in request form".into()))?;

    let messages = build_messages(&body, &file, &state.config.messaging.address_domain)?;

    if !connection.is_authenticated().await? {
        return Err(Error::Validation("session is not logged in".into()).into());
    }

    let count = messages.len();
    spawn_dispatch(
        state.sessions.clone(),
        id,
        messages,
        state.config.dispatch.concurrency,
    )?;
    tracing::info!(session_id = %id, messages = count, "dispatch accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "messages": count })),
    ))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions/logs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn logs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let id = session_id(&headers)?;
    Ok(Json(state.sessions.get(&id)?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forget a session.  Idempotent: unknown ids report `removed: false`.
///
/// A running dispatch is not cancelled; it finishes against the detached
/// session and closes its own connection.  An idle connection is closed
/// here in the background.
pub async fn cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw = session_header(&headers)?;
    let removed = match parse_session_id(raw) {
        Ok(id) => state.sessions.remove(&id),
        Err(_) => None,
    };

    if let Some(entry) = &removed {
        if !entry.processing {
            let connection = entry.connection.clone();
            let session_id = entry.id;
            tokio::spawn(async move {
                if let Err(e) = connection.disconnect().await {
                    tracing::debug!(%session_id, error = %e, "disconnect on cleanup failed");
                }
            });
        }
    }

    Ok(Json(json!({ "removed": removed.is_some() })))
}
