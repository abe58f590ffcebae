use std::net::IpAddr;

/// Schemes that never carry a `//` authority
const OPAQUE_SCHEMES: [&str; 5] = ["data:", "about:", "blob:", "javascript:", "mailto:"];

/// Turn what a model typed into something `navigate` accepts.
///
/// URLs with a scheme and relative references pass through. Bare hosts get
/// `https://`, except loopback names and IP literals, which get `http://`.
/// A single word becomes `https://www.<word>.com`.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    if has_scheme(trimmed) || trimmed.starts_with(['/', '.', '?', '#']) {
        return trimmed.to_string();
    }

    let host = host_of(trimmed);
    if is_local_or_ip(host) {
        return format!("http://{}", trimmed);
    }
    if host.contains('.') {
        return format!("https://{}", trimmed);
    }

    format!("https://www.{}.com", trimmed)
}

fn has_scheme(url: &str) -> bool {
    if OPAQUE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return true;
    }
    match url.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Host part of a scheme-less URL, without port, path or brackets
fn host_of(url: &str) -> &str {
    let authority = url.split(['/', '?', '#']).next().unwrap_or(url);

    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

fn is_local_or_ip(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "localhost" || host.ends_with(".localhost") || host.parse::<IpAddr>().is_ok()
}
