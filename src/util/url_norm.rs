use url::Url;

/// Reduces a post URL to its canonical identity form.
///
/// Keeps only scheme, host (with non-default port) and path; drops query
/// string and fragment, collapses repeated slashes and removes a trailing
/// slash from non-root paths. Two links to the same post therefore compare
/// equal whether or not the site appended `/`, `?utm_source=...` or `#top`.
///
/// Input that is not an absolute URL is returned unchanged.
pub fn normalize_post_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw.trim()) else {
        return raw.to_owned();
    };
    let Some(host) = url.host_str() else {
        return raw.to_owned();
    };

    let mut path = String::with_capacity(url.path().len());
    for ch in url.path().chars() {
        if ch == '/' && path.ends_with('/') {
            continue;
        }
        path.push(ch);
    }
    if path.is_empty() {
        path.push('/');
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, path),
        None => format!("{}://{}{}", url.scheme(), host, path),
    }
}

/// Resolves an `href`/`src` attribute against the page it appeared on.
///
/// Returns `None` for empty values and for anything that does not resolve to
/// an http(s) URL (`mailto:`, `javascript:`, `data:` and friends).
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
