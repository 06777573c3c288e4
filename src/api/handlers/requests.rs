//! Access requests: users ask for a site, admins decide.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::instrument;

use super::auth::types::{AccessRequestBody, ErrorResponse, MessageResponse, UpdateRequestBody};
use crate::{
    gateway::{Gateway, GatewayError, RequestOutcome},
    store::{AccessRequest, SiteState},
};

#[utoipa::path(
    post,
    path = "/api/request",
    request_body = AccessRequestBody,
    responses(
        (status = 200, description = "Request recorded, or already present", body = MessageResponse),
        (status = 400, description = "Malformed body or target", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    ),
    tag = "requests"
)]
#[instrument(skip_all)]
pub async fn request_access(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
    payload: Result<Json<AccessRequestBody>, JsonRejection>,
) -> Result<Json<MessageResponse>, GatewayError> {
    let Json(body) =
        payload.map_err(|_| GatewayError::BadRequest("Invalid request body".to_string()))?;
    // An existing row is reported the same way so callers cannot probe its state.
    match gateway.request_access(&headers, &body.redirect).await? {
        RequestOutcome::Created | RequestOutcome::Existing(_) => {
            Ok(Json(MessageResponse::ok("Request submitted")))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/requests",
    responses(
        (status = 200, description = "Every (user, site) state", body = [AccessRequest]),
        (status = 401, description = "Not an admin", body = ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn list_requests(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
) -> Result<Json<Vec<AccessRequest>>, GatewayError> {
    Ok(Json(gateway.list_requests(&headers).await?))
}

#[utoipa::path(
    post,
    path = "/api/requests/update",
    request_body = UpdateRequestBody,
    responses(
        (status = 200, description = "State updated", body = MessageResponse),
        (status = 400, description = "Invalid state or unknown user, site or request", body = ErrorResponse),
        (status = 401, description = "Not an admin", body = ErrorResponse)
    ),
    tag = "requests"
)]
#[instrument(skip_all)]
pub async fn update_request(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
    payload: Result<Json<UpdateRequestBody>, JsonRejection>,
) -> Result<Json<MessageResponse>, GatewayError> {
    let Json(body) =
        payload.map_err(|_| GatewayError::BadRequest("Invalid request body".to_string()))?;
    let state: SiteState = body
        .new_state
        .parse()
        .map_err(|_| GatewayError::BadRequest("Invalid state".to_string()))?;

    gateway
        .update_request(&headers, &body.user_email, &body.site_url, state)
        .await
        .map_err(|err| match err {
            GatewayError::NotFound(what) => GatewayError::BadRequest(format!("{what} not found")),
            other => other,
        })?;
    Ok(Json(MessageResponse::ok("State updated")))
}
