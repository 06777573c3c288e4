//! Registrable-domain resolution used to scope cookies.

use url::{Host, Url};

use super::error::GatewayError;

/// Public suffixes made of two labels. Hosts ending in one of these keep three
/// labels instead of two.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "com.br",
    "net.br", "co.nz", "co.jp", "co.za", "com.mx", "com.ar", "com.tr", "com.cn",
];

/// Derive the cookie `Domain` for a URL or bare host.
///
/// `app.example.com` yields `example.com`, `foo.example.co.uk` yields
/// `example.co.uk`. Single-label hosts and IP addresses fail with
/// [`GatewayError::InvalidDomain`].
pub fn registrable_domain(input: &str) -> Result<String, GatewayError> {
    let invalid = || GatewayError::InvalidDomain(input.to_string());

    let trimmed = input.trim();
    let candidate = if trimmed.contains("//") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    let host = match url.host() {
        Some(Host::Domain(host)) => host.to_string(),
        _ => return Err(invalid()),
    };

    let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();
    let count = labels.len();
    if count < 2 {
        return Err(invalid());
    }

    let suffix = format!("{}.{}", labels[count - 2], labels[count - 1]);
    let keep = if count > 2 && MULTI_LABEL_SUFFIXES.contains(&suffix.as_str()) {
        3
    } else {
        2
    };
    Ok(labels[count - keep..].join("."))
}

/// Whether two URLs share a registrable domain, so one session cookie covers both.
pub fn same_registrable_domain(left: &str, right: &str) -> Result<bool, GatewayError> {
    Ok(registrable_domain(left)? == registrable_domain(right)?)
}
