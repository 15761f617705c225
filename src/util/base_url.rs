use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from validating the feed service base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to anything but a loopback host would leak the API token.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
    #[error("URL cannot be used as a base: {0}")]
    NotABase(String),
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => {
            let bare = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            bare.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
        }
        None => false,
    }
}

/// Validates the base URL of the feed service gateway.
///
/// HTTPS is required. Plain HTTP is accepted only for loopback hosts, which is
/// what mock servers in tests bind to.
///
/// ```
/// use chatter::util::validate_base_url;
///
/// assert!(validate_base_url("https://crm.example.com/services/chatter").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://crm.example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS base URL");
                return Err(UrlValidationError::Insecure);
            }
            tracing::warn!(base_url = %url, "Using non-HTTPS base URL (loopback only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.cannot_be_a_base() {
        return Err(UrlValidationError::NotABase(url.to_string()));
    }

    Ok(url)
}
