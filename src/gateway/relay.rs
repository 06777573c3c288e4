//! Remembers the originally requested URL across the login detour.

use anyhow::Context;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    GatewayError,
    cookies::{self, CookieSigner, SITE_COOKIE_NAME},
};

#[derive(Debug, Serialize, Deserialize)]
struct SiteClaims {
    site: String,
    exp: u64,
    iat: u64,
}

/// The cookie has no `Domain`, so it stays on the gateway host.
#[derive(Debug)]
pub struct RedirectRelay {
    signer: Arc<CookieSigner>,
    ttl_seconds: u64,
}

impl RedirectRelay {
    #[must_use]
    pub fn new(signer: Arc<CookieSigner>, ttl_seconds: u64) -> Self {
        Self {
            signer,
            ttl_seconds,
        }
    }

    /// # Errors
    /// Returns an error if the cookie cannot be signed or encoded.
    pub fn remember(&self, target: &str, headers: &mut HeaderMap) -> Result<(), GatewayError> {
        let value = self.seal(target, cookies::now_seconds())?;
        let cookie = cookies::set_cookie(SITE_COOKIE_NAME, &value, None, self.ttl_seconds)
            .context("failed to build redirect cookie")?;
        headers.append(SET_COOKIE, cookie);
        Ok(())
    }

    /// The remembered target, `None` when absent, forged or expired.
    #[must_use]
    pub fn recall(&self, headers: &HeaderMap) -> Option<String> {
        cookies::read_cookies(headers, SITE_COOKIE_NAME)
            .iter()
            .find_map(|value| self.signer.open::<SiteClaims>(value))
            .map(|claims| claims.site)
            .filter(|site| !site.is_empty())
    }

    /// # Errors
    /// Returns an error if the header cannot be encoded.
    pub fn forget(&self, headers: &mut HeaderMap) -> Result<(), GatewayError> {
        let cookie = cookies::clear_cookie(SITE_COOKIE_NAME, None)
            .context("failed to build redirect cookie")?;
        headers.append(SET_COOKIE, cookie);
        Ok(())
    }

    fn seal(&self, target: &str, issued_at: u64) -> anyhow::Result<String> {
        self.signer.seal(&SiteClaims {
            site: target.to_string(),
            exp: issued_at + self.ttl_seconds,
            iat: issued_at,
        })
    }
}

/// `303 See Other` to `location`, carrying any cookies already queued in `headers`.
///
/// # Errors
/// Returns [`GatewayError::BadRequest`] when `location` is not a valid header value.
pub fn see_other(location: &str, mut headers: HeaderMap) -> Result<Response, GatewayError> {
    let location = HeaderValue::from_str(location)
        .map_err(|_| GatewayError::BadRequest("Invalid redirect URL".to_string()))?;
    headers.insert(LOCATION, location);
    Ok((StatusCode::SEE_OTHER, headers).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::header::COOKIE;
    use secrecy::SecretString;

    fn relay() -> RedirectRelay {
        let signer = Arc::new(CookieSigner::new(&SecretString::from("relay".to_string())));
        RedirectRelay::new(signer, 900)
    }

    fn as_request(value: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("{SITE_COOKIE_NAME}={value}"))?);
        Ok(headers)
    }

    #[test]
    fn remember_then_recall_returns_same_url() -> Result<()> {
        let relay = relay();
        let mut response = HeaderMap::new();
        relay.remember("https://app.example.com/a?b=c", &mut response)?;

        let header = response.get(SET_COOKIE).context("missing cookie")?.to_str()?;
        assert!(header.contains("Max-Age=900"));
        assert!(!header.contains("Domain="));

        let value = header
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value.to_string())
            .context("malformed cookie")?;
        assert_eq!(
            relay.recall(&as_request(&value)?).as_deref(),
            Some("https://app.example.com/a?b=c")
        );
        Ok(())
    }

    #[test]
    fn recall_is_empty_after_expiry() -> Result<()> {
        let relay = relay();
        let stale = relay.seal("https://app.example.com", cookies::now_seconds() - 901)?;
        assert_eq!(relay.recall(&as_request(&stale)?), None);
        assert_eq!(relay.recall(&HeaderMap::new()), None);
        Ok(())
    }

    #[test]
    fn forget_clears_host_cookie() -> Result<()> {
        let mut response = HeaderMap::new();
        relay().forget(&mut response)?;
        let header = response.get(SET_COOKIE).context("missing cookie")?.to_str()?;
        assert!(header.starts_with("waypass_site=;"));
        assert!(header.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn see_other_sets_location() -> Result<()> {
        let response = see_other("https://app.example.com/", HeaderMap::new())?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).context("missing location")?,
            "https://app.example.com/"
        );
        assert!(see_other("bad\nvalue", HeaderMap::new()).is_err());
        Ok(())
    }
}
