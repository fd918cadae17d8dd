//! Geo-targeting helpers.
//!
//! Country codes come from proxy headers supplied by the hosting edge. They
//! are unauthenticated and only good for best-effort targeting.

use std::collections::HashSet;

pub const VERCEL_COUNTRY_HEADER: &str = "x-vercel-ip-country";
pub const CLOUDFLARE_COUNTRY_HEADER: &str = "cf-ipcountry";

/// Uppercase a two-letter code; rejects anything else and the `XX` unknown
/// marker.
pub fn normalize_country_code(value: &str) -> Option<String> {
    let value = value.trim();
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let upper = value.to_ascii_uppercase();
    if upper == "XX" {
        None
    } else {
        Some(upper)
    }
}

/// The first non-blank header wins; an invalid value yields `None` rather
/// than falling through to the next header.
pub fn country_from_headers(vercel: Option<&str>, cloudflare: Option<&str>) -> Option<String> {
    vercel
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(cloudflare)
        .and_then(normalize_country_code)
}

/// An empty (or missing) allow-list means every country, including unknown.
pub fn country_allowed(allow_list: Option<&HashSet<String>>, visitor_country: Option<&str>) -> bool {
    match allow_list {
        Some(codes) if !codes.is_empty() => visitor_country
            .map(|c| c.trim().to_ascii_uppercase())
            .is_some_and(|c| codes.iter().any(|code| code.eq_ignore_ascii_case(&c))),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_country_code() {
        assert_eq!(normalize_country_code("us").as_deref(), Some("US"));
        assert_eq!(normalize_country_code(" CA ").as_deref(), Some("CA"));
        assert_eq!(normalize_country_code("XX"), None);
        assert_eq!(normalize_country_code("xx"), None);
        assert_eq!(normalize_country_code("USA"), None);
        assert_eq!(normalize_country_code("1A"), None);
        assert_eq!(normalize_country_code(""), None);
    }

    #[test]
    fn test_header_precedence() {
        assert_eq!(country_from_headers(Some("de"), Some("FR")).as_deref(), Some("DE"));
        assert_eq!(country_from_headers(None, Some("FR")).as_deref(), Some("FR"));
        assert_eq!(country_from_headers(Some("XX"), Some("FR")), None);
        assert_eq!(country_from_headers(None, None), None);
    }

    #[test]
    fn test_blank_vercel_header_falls_back() {
        assert_eq!(country_from_headers(Some(""), Some("FR")).as_deref(), Some("FR"));
        assert_eq!(country_from_headers(Some("  "), Some("fr")).as_deref(), Some("FR"));
        assert_eq!(country_from_headers(Some(""), None), None);
    }

    #[test]
    fn test_country_allowed() {
        let allow: HashSet<String> = ["US".to_string(), "CA".to_string()].into_iter().collect();
        assert!(!country_allowed(Some(&allow), None));
        assert!(!country_allowed(Some(&allow), Some("FR")));
        assert!(country_allowed(Some(&allow), Some("US")));
        assert!(country_allowed(Some(&allow), Some("us")));
        assert!(country_allowed(Some(&HashSet::new()), None));
        assert!(country_allowed(None, Some("FR")));
    }
}
