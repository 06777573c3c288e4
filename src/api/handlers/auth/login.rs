use axum::{
    Json,
    extract::{Extension, Query, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::types::{ErrorResponse, LoginQuery, LoginRequest, LoginResponse};
use crate::gateway::{Gateway, GatewayError};

#[utoipa::path(
    post,
    path = "/api/login",
    params(LoginQuery),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = LoginResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
    Query(query): Query<LoginQuery>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) =
        payload.map_err(|_| GatewayError::BadRequest("Invalid request body".to_string()))?;

    let outcome = gateway
        .login(
            &headers,
            &request.email,
            &request.password,
            query.redirect.as_deref(),
            query.token.as_deref(),
        )
        .await?;

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        redirect: outcome.redirect_url.is_some(),
        redirect_url: outcome.redirect_url,
    };
    Ok((StatusCode::OK, outcome.cookies, Json(response)).into_response())
}
