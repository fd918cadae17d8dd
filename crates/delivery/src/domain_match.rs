//! Domain matching: maps the page domain reported by the extension to a
//! registered platform.
//!
//! Comparison keys are bare hostnames: lower-cased, scheme/path/query/port
//! stripped. Two hostnames match when their keys are equal or when they share
//! the same root domain (last two labels), so `m.example.com` matches a
//! platform registered as `example.com`.

use campaign_core::types::Platform;
use url::Url;

/// Extract the lower-cased hostname from a bare domain or a full URL.
/// Returns `None` when the value cannot be parsed as a host.
pub fn normalize_host(input: &str) -> Option<String> {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Comparison key; falls back to the lower-cased raw value for inputs the
/// URL parser rejects.
fn match_key(input: &str) -> String {
    normalize_host(input).unwrap_or_else(|| input.trim().to_ascii_lowercase())
}

/// Display form used by the domain listing endpoint: hostname without a
/// leading `www.`.
pub fn canonical_domain(input: &str) -> String {
    let key = match_key(input);
    match key.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => key,
    }
}

/// Last two dot-separated labels of a hostname.
pub fn root_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        labels.join(".")
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

pub fn domains_match(a: &str, b: &str) -> bool {
    let a = match_key(a);
    let b = match_key(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let root_a = root_domain(&a);
    !root_a.is_empty() && root_a == root_domain(&b)
}

/// First active platform whose domain matches `page_domain`.
pub fn resolve_platform<'a>(page_domain: &str, platforms: &'a [Platform]) -> Option<&'a Platform> {
    platforms
        .iter()
        .filter(|p| p.is_active)
        .find(|p| domains_match(page_domain, &p.domain))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn platform(domain: &str, is_active: bool) -> Platform {
        Platform {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            is_active,
        }
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM").unwrap(), "example.com");
        assert_eq!(
            normalize_host("https://www.example.com:8443/path?q=1").unwrap(),
            "www.example.com"
        );
        assert_eq!(normalize_host("example.com/landing").unwrap(), "example.com");
        assert!(normalize_host("   ").is_none());
    }

    #[test]
    fn test_canonical_domain_strips_www() {
        assert_eq!(canonical_domain("https://www.instagram.com/"), "instagram.com");
        assert_eq!(canonical_domain("youtube.com"), "youtube.com");
        assert_eq!(canonical_domain("m.youtube.com"), "m.youtube.com");
    }

    #[test]
    fn test_root_domain() {
        assert_eq!(root_domain("sub.example.com"), "example.com");
        assert_eq!(root_domain("a.b.example.com"), "example.com");
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(root_domain("localhost"), "localhost");
    }

    #[test]
    fn test_domains_match() {
        assert!(domains_match("www.example.com", "example.com"));
        assert!(domains_match("https://EXAMPLE.com/page", "example.com"));
        assert!(!domains_match("example.com", "example.org"));
        assert!(!domains_match("", "example.com"));
    }

    #[test]
    fn test_resolve_platform_root_fallback() {
        let platforms = vec![platform("example.com", true)];
        let resolved = resolve_platform("m.example.com", &platforms).unwrap();
        assert_eq!(resolved.domain, "example.com");
    }

    #[test]
    fn test_resolve_platform_skips_inactive_and_unknown() {
        let platforms = vec![platform("youtube.com", false), platform("instagram.com", true)];
        assert!(resolve_platform("youtube.com", &platforms).is_none());
        assert!(resolve_platform("reddit.com", &platforms).is_none());
        assert_eq!(
            resolve_platform("www.instagram.com", &platforms).unwrap().domain,
            "instagram.com"
        );
    }
}
