//! Origin allow-list and URL sanitation

use url::{Host, Url};

/// Trim the raw query value and require an absolute http(s) URL.
pub fn sanitize_url(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return None;
    }
    Some(input.to_string())
}

/// Hostname of `url` without port. IPv6 literals come back unbracketed.
pub fn hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.host()? {
        Host::Domain(d) => Some(d.to_string()),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// True iff the URL's host equals an allowed entry or is a sub-domain of one.
///
/// An empty allow-list denies everything; operators must enumerate hosts.
pub fn is_allowed(url: &str, allow_hosts: &[String]) -> bool {
    if allow_hosts.is_empty() {
        return false;
    }

    let Some(host) = hostname(url) else {
        return false;
    };

    allow_hosts.iter().any(|allowed| {
        let allowed = allowed.trim().to_ascii_lowercase();
        !allowed.is_empty() && (host == allowed || host.ends_with(&format!(".{}", allowed)))
    })
}
