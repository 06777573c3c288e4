use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::types::{ErrorResponse, MessageResponse, RegisterRequest};
use crate::gateway::{Gateway, GatewayError};

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 400, description = "Malformed body, invalid email or empty password", body = ErrorResponse),
        (status = 409, description = "User with the specified email already exists", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    gateway: Extension<Arc<Gateway>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) =
        payload.map_err(|_| GatewayError::BadRequest("Invalid request body".to_string()))?;
    gateway.register(&request.email, &request.password).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::ok("User created"))).into_response())
}
