//! Host key normalisation
//!
//! Targets arrive as bare hosts, `host:port` pairs or full URLs. Errors and
//! per-host rate limits are tracked per `host:port`, so every form that
//! reaches the same service must map to the same key.

/// Default port for a URL scheme, if it has a well-known one
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

/// Split `authority` into host and optional port, keeping IPv6 brackets
fn split_host_port(authority: &str) -> (&str, Option<&str>) {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => {
                let host = &authority[..=end];
                let port = authority[end + 1..].strip_prefix(':');
                (host, port.filter(|p| !p.is_empty()))
            }
            None => (authority, None),
        };
    }

    match authority.rsplit_once(':') {
        // More than one colon without brackets: bare IPv6 literal
        Some((host, _)) if host.contains(':') => (authority, None),
        Some((host, port)) if !port.is_empty() => (host, Some(port)),
        Some((host, _)) => (host, None),
        None => (authority, None),
    }
}

/// Reduce a target to the `host[:port]` key used for error tracking
///
/// ```
/// use scanmatrix::hosterrors::normalize_host_key;
///
/// assert_eq!(normalize_host_key("https://admin@Example.com/login"), "example.com:443");
/// assert_eq!(normalize_host_key("http://example.com:8080/"), "example.com:8080");
/// assert_eq!(normalize_host_key("10.0.0.1:22"), "10.0.0.1:22");
/// assert_eq!(normalize_host_key("example.com"), "example.com");
/// ```
pub fn normalize_host_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, trimmed),
    };

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let authority = match authority.rsplit_once('@') {
        Some((_, host)) => host,
        None => authority,
    };

    let (host, port) = split_host_port(authority);
    let host = host.to_ascii_lowercase();
    let port = port
        .map(str::to_string)
        .or_else(|| scheme.as_deref().and_then(default_port).map(|p| p.to_string()));

    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}
