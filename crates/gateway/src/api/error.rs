use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hm_domain::error::Error;
use uuid::Uuid;

use super::SESSION_HEADER;

/// Domain error rendered as `{ "error": "<message>" }` with a status code
/// derived from its variant.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    session_id: Option<Uuid>,
}

impl ApiError {
    /// Attach the session id so the caller can still clean it up.
    pub fn with_session(mut self, session_id: Option<Uuid>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Upload(_) => StatusCode::BAD_REQUEST,
            Error::DispatchInProgress(_) => StatusCode::CONFLICT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            session_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.error, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self.error, status = status.as_u16(), "request rejected");
        }

        let mut response =
            (status, Json(serde_json::json!({ "error": self.error.to_string() }))).into_response();
        if let Some(id) = self.session_id {
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_statuses() {
        let cases = [
            (Error::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST),
            (Error::Upload("x".into()), StatusCode::BAD_REQUEST),
            (Error::DispatchInProgress("x".into()), StatusCode::CONFLICT),
            (Error::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Other("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn session_header_is_attached() {
        let id = Uuid::new_v4();
        let response = ApiError::from(Error::Upstream("down".into()))
            .with_session(Some(id))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(SESSION_HEADER).unwrap(),
            id.to_string().as_str()
        );
    }
}
