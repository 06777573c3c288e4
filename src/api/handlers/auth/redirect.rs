use axum::{extract::Extension, http::HeaderMap, response::Response};
use std::sync::Arc;

use crate::gateway::{Gateway, GatewayError};

#[utoipa::path(
    get,
    path = "/api/redirect",
    responses(
        (status = 303, description = "Back to the remembered site, or to the gateway host")
    ),
    tag = "auth"
)]
pub async fn redirect(
    headers: HeaderMap,
    gateway: Extension<Arc<Gateway>>,
) -> Result<Response, GatewayError> {
    gateway.finish_redirect(&headers)
}
