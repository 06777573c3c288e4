//! Signed cookie values and `Set-Cookie` construction.
//!
//! Cookie payloads are compact HS256 JWTs. Anything that fails signature or
//! expiry validation is treated exactly like a missing cookie.

use anyhow::{Context, Result};
use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

pub const SESSION_COOKIE_NAME: &str = "waypass_session";
pub const SITE_COOKIE_NAME: &str = "waypass_site";

pub struct CookieSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl CookieSigner {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Sign `claims` into a cookie-safe string.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be serialized.
    pub fn seal<C: Serialize>(&self, claims: &C) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .context("failed to sign cookie value")
    }

    /// Verify and decode a cookie value. `None` when tampered, malformed or expired.
    pub fn open<C: DeserializeOwned>(&self, value: &str) -> Option<C> {
        decode::<C>(value, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// Seconds since the Unix epoch, the unit of `exp`/`iat` claims.
pub fn now_seconds() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

/// Build a `Set-Cookie` value. Every cookie is `HttpOnly`, `Secure` and
/// `SameSite=None` so it survives the cross-site redirect chain.
pub fn set_cookie(
    name: &str,
    value: &str,
    domain: Option<&str>,
    max_age_seconds: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={max_age_seconds}");
    if let Some(domain) = domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    HeaderValue::from_str(&cookie)
}

/// Expire a cookie immediately. `domain` must match the one it was set with.
pub fn clear_cookie(name: &str, domain: Option<&str>) -> Result<HeaderValue, InvalidHeaderValue> {
    set_cookie(name, "", domain, 0)
}

/// Every value sent for `name`, in header order.
///
/// Browsers send one pair per matching cookie, so the same name can appear
/// more than once when cookies with different `Domain` scopes overlap.
pub fn read_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name && !val.trim().is_empty()).then(|| val.trim().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        value: String,
        exp: u64,
    }

    fn signer(secret: &str) -> CookieSigner {
        CookieSigner::new(&SecretString::from(secret.to_string()))
    }

    #[test]
    fn sealed_values_open_with_the_same_secret() -> anyhow::Result<()> {
        let signer = signer("s3cret");
        let probe = Probe {
            value: "hello".to_string(),
            exp: now_seconds() + 60,
        };
        let sealed = signer.seal(&probe)?;
        assert_eq!(signer.open::<Probe>(&sealed), Some(probe));
        Ok(())
    }

    #[test]
    fn foreign_tampered_and_expired_values_read_as_absent() -> anyhow::Result<()> {
        let probe = Probe {
            value: "hello".to_string(),
            exp: now_seconds() + 60,
        };
        let sealed = signer("one").seal(&probe)?;
        assert!(signer("two").open::<Probe>(&sealed).is_none());

        let mut tampered = sealed.clone();
        tampered.push('x');
        assert!(signer("one").open::<Probe>(&tampered).is_none());
        assert!(signer("one").open::<Probe>("not-a-jwt").is_none());

        let expired = signer("one").seal(&Probe {
            value: "old".to_string(),
            exp: now_seconds() - 1,
        })?;
        assert!(signer("one").open::<Probe>(&expired).is_none());
        Ok(())
    }

    #[test]
    fn set_cookie_carries_security_attributes() -> anyhow::Result<()> {
        let header = set_cookie("name", "v", Some("example.com"), 60)?;
        assert_eq!(
            header.to_str()?,
            "name=v; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=60; Domain=example.com"
        );
        let cleared = clear_cookie("name", None)?;
        assert_eq!(
            cleared.to_str()?,
            "name=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0"
        );
        Ok(())
    }

    #[test]
    fn read_cookies_collects_every_matching_pair() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1; waypass_session=x; b=2"));
        headers.append(COOKIE, HeaderValue::from_static("waypass_session=y; waypass_session="));
        assert_eq!(
            read_cookies(&headers, SESSION_COOKIE_NAME),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(read_cookies(&headers, SITE_COOKIE_NAME).is_empty());
    }
}
