use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::types::{ErrorResponse, RedirectQuery};
use crate::gateway::{AuthOutcome, Gateway, GatewayError};

#[utoipa::path(
    get,
    path = "/api/authenticate",
    params(RedirectQuery),
    responses(
        (status = 200, description = "Caller may reach the site"),
        (status = 303, description = "Redirect to the login page or the access-request page"),
        (status = 400, description = "No target site in headers, query or cookie", body = ErrorResponse),
        (status = 401, description = "Access requested or declined", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn authenticate(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, GatewayError> {
    let handoff = gateway
        .authenticate(&headers, query.redirect.as_deref())
        .await?;
    match &handoff.outcome {
        AuthOutcome::Allowed { user } => debug!(user = %user, "Access allowed"),
        AuthOutcome::Denied { user } => debug!(user = %user, "Access denied"),
        AuthOutcome::Login { .. } => debug!("Login required"),
        AuthOutcome::RequestAccess { .. } => debug!("Access request required"),
    }
    handoff.respond()
}
