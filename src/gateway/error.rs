//! Error taxonomy shared by every gateway operation.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("redirect target missing from headers, query and cookie")]
    MissingTarget,
    #[error("no session cookie")]
    NoSession,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("insufficient role")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GatewayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::MissingTarget => StatusCode::BAD_REQUEST,
            Self::NoSession | Self::Unauthenticated | Self::Forbidden => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidDomain(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::Conflict(message) => message.clone(),
            Self::MissingTarget => "Redirect URL missing".to_string(),
            Self::NoSession | Self::Unauthenticated => "Unauthorized".to_string(),
            Self::Forbidden => "Only admins can do this".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::InvalidDomain(_) | Self::Store(_) => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidDomain(input) => error!(input = %input, "Failed to resolve cookie domain"),
            Self::Store(err) => error!("Store error: {err:#}"),
            _ => {}
        }
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(
            GatewayError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::MissingTarget.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::NoSession.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::Forbidden.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::NotFound("User").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::InvalidDomain("localhost".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let err = GatewayError::Store(anyhow!("connection refused to 10.0.0.5"));
        assert_eq!(err.public_message(), "Internal Server Error");
        let err = GatewayError::InvalidDomain("intranet".into());
        assert_eq!(err.public_message(), "Internal Server Error");
    }
}
