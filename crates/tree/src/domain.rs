use canvas_protocol::{FaviconRef, UNKNOWN_DOMAIN};
use url::Url;

/// Lowercase host of `url`, `None` when it does not parse or carries no host.
fn parse_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Grouping domain for a bookmark url: lowercase host with one leading `www.`
/// removed, or [`UNKNOWN_DOMAIN`].
pub fn extract_domain(url: &str) -> String {
    match parse_host(url) {
        Some(host) => match host.strip_prefix("www.") {
            Some(rest) if !rest.is_empty() => rest.to_string(),
            _ => host,
        },
        None => UNKNOWN_DOMAIN.to_string(),
    }
}

/// Favicon handle for `url`; the full host is kept (including `www.`).
pub fn favicon_for(url: &str) -> Option<FaviconRef> {
    parse_host(url).map(FaviconRef::new)
}
