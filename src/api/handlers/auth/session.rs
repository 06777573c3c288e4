//! Session endpoints: logout and validation.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::types::{ErrorResponse, MessageResponse, ValidateResponse};
use crate::gateway::{Gateway, GatewayError};

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(gateway: Extension<Arc<Gateway>>) -> Result<Response, GatewayError> {
    // Cleared even when no session was sent.
    let cookies = gateway.logout()?;
    Ok((StatusCode::OK, cookies, Json(MessageResponse::ok("Logged out"))).into_response())
}

#[utoipa::path(
    get,
    path = "/api/validate",
    responses(
        (status = 200, description = "Session is valid", body = ValidateResponse),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn validate(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
) -> Result<Json<ValidateResponse>, GatewayError> {
    let user = gateway.principal(&headers).await?;
    Ok(Json(ValidateResponse {
        success: true,
        message: "Session valid".to_string(),
        user: user.email,
    }))
}
