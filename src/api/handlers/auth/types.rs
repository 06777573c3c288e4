//! Request/response types for gateway endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    /// Whether the browser has somewhere to go back to.
    pub redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Site the browser was on before the login detour.
    pub redirect: Option<String>,
    /// Handoff token issued by `/api/authenticate`.
    pub token: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct RedirectQuery {
    /// Site to check when the proxy does not send forwarded headers.
    pub redirect: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidateResponse {
    pub success: bool,
    pub message: String,
    pub user: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccessRequestBody {
    pub redirect: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateRequestBody {
    #[serde(rename = "userEmail")]
    pub user_email: String,
    #[serde(rename = "siteURL")]
    pub site_url: String,
    /// One of `requested`, `authorized`, `declined`.
    #[serde(rename = "newState")]
    pub new_state: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
