//! Browser session cookie.
//!
//! A session is issued in one of two scopes. Logins write it for the
//! gateway's registrable domain. Forward-auth checks write it for the target
//! site's registrable domain, since that is the cookie the reverse proxy
//! forwards on later checks for that site.

use anyhow::Context;
use axum::http::{HeaderMap, header::SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{
    GatewayError,
    cookies::{self, CookieSigner, SESSION_COOKIE_NAME},
    domain::registrable_domain,
};

/// Decoded session payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    pub user: String,
    /// One-time token awaiting resolution, empty when none.
    pub pending: String,
}

impl Session {
    /// The authenticated user, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        (self.authenticated && !self.user.is_empty()).then_some(self.user.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    authenticated: bool,
    user: String,
    pending: String,
    exp: u64,
    iat: u64,
}

#[derive(Debug)]
pub struct SessionManager {
    signer: Arc<CookieSigner>,
    gateway_domain: String,
    ttl_seconds: u64,
    pending_ttl_seconds: u64,
}

impl SessionManager {
    /// # Errors
    /// Returns [`GatewayError::InvalidDomain`] when `base_url` has no registrable domain.
    pub fn new(
        signer: Arc<CookieSigner>,
        base_url: &str,
        ttl_seconds: u64,
        pending_ttl_seconds: u64,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            signer,
            gateway_domain: registrable_domain(base_url)?,
            ttl_seconds,
            pending_ttl_seconds,
        })
    }

    #[must_use]
    pub fn gateway_domain(&self) -> &str {
        &self.gateway_domain
    }

    /// Write an authenticated session for `user`, scoped to the gateway domain.
    ///
    /// # Errors
    /// Returns an error if the cookie cannot be signed or encoded.
    pub fn issue(&self, user: &str, headers: &mut HeaderMap) -> Result<(), GatewayError> {
        let session = Session {
            authenticated: true,
            user: user.to_string(),
            pending: String::new(),
        };
        self.write(&session, &self.gateway_domain, self.ttl_seconds, headers)
    }

    /// Write an authenticated session for `user`, scoped to the target's domain.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidDomain`] for targets without a registrable domain.
    pub fn issue_for(
        &self,
        target: &str,
        user: &str,
        headers: &mut HeaderMap,
    ) -> Result<(), GatewayError> {
        let domain = registrable_domain(target)?;
        let session = Session {
            authenticated: true,
            user: user.to_string(),
            pending: String::new(),
        };
        self.write(&session, &domain, self.ttl_seconds, headers)
    }

    /// Write an unauthenticated session that references a pending token.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidDomain`] for targets without a registrable domain.
    pub fn begin_pending(
        &self,
        target: &str,
        token: &str,
        headers: &mut HeaderMap,
    ) -> Result<(), GatewayError> {
        let domain = registrable_domain(target)?;
        let session = Session {
            authenticated: false,
            user: String::new(),
            pending: token.to_string(),
        };
        self.write(&session, &domain, self.pending_ttl_seconds, headers)
    }

    /// Decode the session carried by a request.
    ///
    /// When several session cookies arrive (overlapping domain scopes), an
    /// authenticated one wins over a pending one.
    ///
    /// # Errors
    /// Returns [`GatewayError::NoSession`] when no valid session cookie is present.
    pub fn read(&self, headers: &HeaderMap) -> Result<Session, GatewayError> {
        let mut sessions = cookies::read_cookies(headers, SESSION_COOKIE_NAME)
            .into_iter()
            .filter_map(|value| self.signer.open::<SessionClaims>(&value))
            .map(|claims| Session {
                authenticated: claims.authenticated,
                user: claims.user,
                pending: claims.pending,
            });

        let first = sessions.next().ok_or(GatewayError::NoSession)?;
        if first.authenticated {
            return Ok(first);
        }
        Ok(sessions.find(|session| session.authenticated).unwrap_or(first))
    }

    /// Expire the gateway-scoped session cookie.
    ///
    /// # Errors
    /// Returns an error if the header cannot be encoded.
    pub fn invalidate(&self, headers: &mut HeaderMap) -> Result<(), GatewayError> {
        let cookie = cookies::clear_cookie(SESSION_COOKIE_NAME, Some(&self.gateway_domain))
            .context("failed to build session cookie")?;
        headers.append(SET_COOKIE, cookie);
        Ok(())
    }

    fn write(
        &self,
        session: &Session,
        domain: &str,
        ttl_seconds: u64,
        headers: &mut HeaderMap,
    ) -> Result<(), GatewayError> {
        let now = cookies::now_seconds();
        let claims = SessionClaims {
            authenticated: session.authenticated,
            user: session.user.clone(),
            pending: session.pending.clone(),
            exp: now + ttl_seconds,
            iat: now,
        };
        let value = self.signer.seal(&claims)?;
        let cookie = cookies::set_cookie(SESSION_COOKIE_NAME, &value, Some(domain), ttl_seconds)
            .context("failed to build session cookie")?;
        debug!(domain, authenticated = session.authenticated, "Writing session cookie");
        headers.append(SET_COOKIE, cookie);
        Ok(())
    }
}
