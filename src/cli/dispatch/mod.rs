//! Map parsed CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::gateway;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let gateway_opts = gateway::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url: gateway_opts.base_url,
        session_secret: gateway_opts.session_secret,
        admin_email: gateway_opts.admin_email,
        admin_password: gateway_opts.admin_password,
        login_path: gateway_opts.login_path,
        request_path: gateway_opts.request_path,
        session_ttl_seconds: gateway_opts.session_ttl_seconds,
        pending_session_ttl_seconds: gateway_opts.pending_session_ttl_seconds,
        token_ttl_seconds: gateway_opts.token_ttl_seconds,
        redirect_ttl_seconds: gateway_opts.redirect_ttl_seconds,
        token_sweep_seconds: gateway_opts.token_sweep_seconds,
    }))
}
