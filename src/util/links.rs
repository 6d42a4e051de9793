use thiserror::Error;
use url::Url;

/// Errors produced while turning scraped link text into a fetchable URL.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The link could not be parsed, even relative to its page.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The link uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The link carries no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Parses an absolute URL and checks it is fetchable over HTTP(S).
///
/// # Examples
///
/// ```
/// use gadio_feed::util::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/a.mp3").is_ok());
/// assert!(parse_http_url("file:///etc/passwd").is_err());
/// assert!(parse_http_url("").is_err());
/// ```
pub fn parse_http_url(raw: &str) -> Result<Url, LinkError> {
    check_http(Url::parse(raw.trim())?)
}

/// Resolves a scraped `href` against the URL of the page it was found on.
///
/// Absolute links pass through unchanged; relative and root-relative links
/// are joined onto `page`. Fragments are dropped so the same resource always
/// maps to the same URL string.
pub fn resolve_link(page: &Url, href: &str) -> Result<Url, LinkError> {
    let mut url = page.join(href.trim())?;
    url.set_fragment(None);
    check_http(url)
}

/// Returns true if `url` points at the same host (and port) as `base`.
pub fn same_host(base: &Url, url: &Url) -> bool {
    base.host_str() == url.host_str() && base.port_or_known_default() == url.port_or_known_default()
}

fn check_http(url: Url) -> Result<Url, LinkError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(LinkError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LinkError::MissingHost);
    }
    Ok(url)
}
