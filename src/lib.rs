//! # Waypass (forward-auth gateway)
//!
//! `waypass` answers forward-auth checks for reverse proxies. Each protected
//! site asks the gateway whether the incoming request may pass; the gateway
//! answers with `200`, `401`, or a `303` to its login or access-request page.
//!
//! ## Cross-origin sessions
//!
//! Protected sites usually live on other registrable domains than the gateway,
//! so one cookie cannot cover them all. The gateway bridges a login across
//! origins with a one-time token:
//!
//! 1. An unauthenticated check writes a *pending* session cookie on the site's
//!    domain that references a fresh token, and redirects to the login page
//!    with that token in the query.
//! 2. Logging in resolves the token to the user.
//! 3. The next check consumes the token (at most once) and rewrites the
//!    pending session as an authenticated one.
//!
//! ## Authorization
//!
//! Access is tracked per (user, site) as `requested`, `authorized` or
//! `declined`. Users request access themselves; admins decide, and are
//! allowed on every site without a row.

pub mod api;
pub mod cli;
pub mod gateway;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
