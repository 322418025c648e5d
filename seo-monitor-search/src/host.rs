//! Host normalisation for rank matching and engine identification.
//!
//! Canonicalises hosts so that `http://www.Example.com:80/page` and
//! `example.com` compare as equal.

use url::Url;

/// Normalise the host of a URL for comparison.
///
/// Applies the following transformations:
///
/// 1. Accept scheme-less input (`example.com/path` is read as `http://example.com/path`).
/// 2. Lowercase the host (the `url` crate already does this).
/// 3. Drop scheme, port, path, query and fragment.
/// 4. Strip a single leading `www.` and a trailing `.`.
///
/// Returns `None` when no host can be recovered.
///
/// # Examples
///
/// ```
/// use seo_monitor_search::host::normalize_host;
///
/// assert_eq!(normalize_host("http://www.Example.com/page").as_deref(), Some("example.com"));
/// assert_eq!(normalize_host("example.com").as_deref(), Some("example.com"));
/// ```
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = parse_lenient(raw)?;
    let host = parsed.host_str()?.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

/// Derive an engine key from an engine's base URL.
///
/// Drops the scheme, splits the rest on `.` and takes the first label,
/// unless that label contains `http`, `www` or `search`, in which case the
/// second label is used. `http://www.google.co.uk` and `https://google.nl`
/// both yield `google`.
pub fn engine_key_from_base_url(base_url: &str) -> Option<String> {
    let trimmed = base_url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let labels: Vec<&str> = without_scheme.split('.').collect();
    let first = labels.first()?.to_lowercase();
    let candidate = if first.contains("http") || first.contains("www") || first.contains("search")
    {
        labels.get(1)?.to_lowercase()
    } else {
        first
    };
    let candidate = candidate.trim_start_matches("//").trim_matches('/');
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}

/// The `scheme://host[:port]` origin of a URL, used as a `Referer`.
pub fn origin(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

fn parse_lenient(raw: &str) -> Option<Url> {
    if raw.starts_with('/') && !raw.starts_with("//") {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if url.host_str().is_some() => Some(url),
        _ => Url::parse(&format!("http://{}", raw.trim_start_matches("//"))).ok(),
    }
}
