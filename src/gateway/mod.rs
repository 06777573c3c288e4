//! Forward-auth core.
//!
//! A protected site's reverse proxy asks [`Gateway::authenticate`] about every
//! request. Sites live on other origins than the gateway, so the login
//! session is carried over with a one-time token: the check writes a pending
//! session cookie on the site's domain referencing a fresh token, the login
//! page resolves that token, and the next check consumes it and promotes the
//! pending session. Authorization is then decided per (user, site).

mod authz;
mod config;
mod cookies;
mod credentials;
mod domain;
mod error;
mod facade;
mod relay;
mod session;
mod target;
mod token;

pub use authz::{Authorizer, Decision, RequestOutcome, decide_for};
pub use config::GatewayConfig;
pub use cookies::{SESSION_COOKIE_NAME, SITE_COOKIE_NAME};
pub use domain::{registrable_domain, same_registrable_domain};
pub use error::GatewayError;
pub use facade::{AuthOutcome, Gateway, Handoff, LoginOutcome};
pub use session::Session;
pub use token::{MemoryTokenBridge, TokenBridge};
