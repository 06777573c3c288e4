//! Working out which site a forward-auth check is about.

use axum::http::HeaderMap;
use url::Url;

use super::GatewayError;

const X_ORIGINAL_URL: &str = "x-original-url";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_URI: &str = "x-forwarded-uri";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Target URL announced by the reverse proxy, if any.
///
/// `X-Original-URL` wins; otherwise the URL is rebuilt from
/// `X-Forwarded-Proto` (default `https`), `X-Forwarded-Host` and `X-Forwarded-Uri`.
pub fn forwarded_target(headers: &HeaderMap) -> Option<String> {
    if let Some(url) = header(headers, X_ORIGINAL_URL) {
        return Some(url.to_string());
    }
    let host = header(headers, X_FORWARDED_HOST)?;
    let proto = header(headers, X_FORWARDED_PROTO).unwrap_or("https");
    let uri = header(headers, X_FORWARDED_URI).unwrap_or("/");
    let separator = if uri.starts_with('/') { "" } else { "/" };
    Some(format!("{proto}://{host}{separator}{uri}"))
}

/// First usable target: forwarded headers, then query parameter, then the
/// remembered cookie. The literal `"null"` some frontends send is ignored.
pub fn pick_target(
    forwarded: Option<String>,
    query: Option<&str>,
    remembered: Option<String>,
) -> Option<String> {
    let query = query
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "null")
        .map(ToString::to_string);
    forwarded
        .or(query)
        .or(remembered)
        .map(|target| with_scheme(&target))
}

fn with_scheme(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// The site a target belongs to: `scheme://host[:port]`.
///
/// # Errors
/// Returns [`GatewayError::BadRequest`] when the target is not an http(s) URL.
pub fn site_origin(target: &str) -> Result<String, GatewayError> {
    let invalid = || GatewayError::BadRequest("Invalid redirect URL".to_string());
    let url = Url::parse(&with_scheme(target)).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(invalid());
    }
    Ok(origin.ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn original_url_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_ORIGINAL_URL, HeaderValue::from_static("https://a.example.com/x"));
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("b.example.com"));
        assert_eq!(
            forwarded_target(&headers).as_deref(),
            Some("https://a.example.com/x")
        );
    }

    #[test]
    fn forwarded_parts_are_combined() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("app.example.com"));
        headers.insert(X_FORWARDED_URI, HeaderValue::from_static("/dash?q=1"));
        assert_eq!(
            forwarded_target(&headers).as_deref(),
            Some("https://app.example.com/dash?q=1")
        );

        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
        assert_eq!(
            forwarded_target(&headers).as_deref(),
            Some("http://app.example.com/dash?q=1")
        );
        assert_eq!(forwarded_target(&HeaderMap::new()), None);
    }

    #[test]
    fn precedence_is_header_then_query_then_cookie() {
        let header = Some("https://h.example.com".to_string());
        let cookie = Some("https://c.example.com".to_string());
        assert_eq!(
            pick_target(header, Some("https://q.example.com"), cookie.clone()).as_deref(),
            Some("https://h.example.com")
        );
        assert_eq!(
            pick_target(None, Some("https://q.example.com"), cookie.clone()).as_deref(),
            Some("https://q.example.com")
        );
        assert_eq!(
            pick_target(None, Some("null"), cookie.clone()).as_deref(),
            Some("https://c.example.com")
        );
        assert_eq!(pick_target(None, Some(""), None), None);
    }

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(
            pick_target(None, Some("app.example.com"), None).as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn site_origin_drops_path_and_default_port() -> Result<(), GatewayError> {
        assert_eq!(
            site_origin("https://app.example.com/dash?q=1")?,
            "https://app.example.com"
        );
        assert_eq!(site_origin("https://app.example.com:443/")?, "https://app.example.com");
        assert_eq!(
            site_origin("http://app.example.com:8080/x")?,
            "http://app.example.com:8080"
        );
        assert_eq!(site_origin("app.example.com")?, "https://app.example.com");
        Ok(())
    }

    #[test]
    fn non_http_targets_are_rejected() {
        assert!(site_origin("javascript:alert(1)").is_err());
        assert!(site_origin("ftp://files.example.com").is_err());
    }
}
