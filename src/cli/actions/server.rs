use crate::{
    api::{self, AdminBootstrap},
    cli::telemetry,
    gateway::GatewayConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub session_secret: SecretString,
    pub admin_email: Option<String>,
    pub admin_password: Option<SecretString>,
    pub login_path: String,
    pub request_path: String,
    pub session_ttl_seconds: u64,
    pub pending_session_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub redirect_ttl_seconds: u64,
    pub token_sweep_seconds: u64,
}

impl Args {
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(&self.base_url, self.session_secret.clone())
            .with_login_path(&self.login_path)
            .with_request_path(&self.request_path)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_pending_session_ttl_seconds(self.pending_session_ttl_seconds)
            .with_token_ttl_seconds(self.token_ttl_seconds)
            .with_redirect_ttl_seconds(self.redirect_ttl_seconds)
            .with_token_sweep_seconds(self.token_sweep_seconds)
    }

    /// Bootstrap admin credentials, when both halves were given.
    #[must_use]
    pub fn admin(&self) -> Option<AdminBootstrap> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.gateway_config();
    let admin = args.admin();

    debug!(base_url = config.base_url(), "Starting gateway");

    let result = api::new(args.port, args.dsn, config, admin).await;

    telemetry::shutdown_tracer();

    result
}
