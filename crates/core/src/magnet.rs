//! Info-hash normalization and magnet link parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static INFO_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("valid regex"));

static MAGNET_BTIH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"xt=urn:btih:([0-9a-fA-F]{40})").expect("valid regex"));

/// Whether `hash` is a canonical info-hash: 40 lowercase hex characters.
pub fn is_valid_info_hash(hash: &str) -> bool {
    INFO_HASH_RE.is_match(hash)
}

/// Normalize a raw identifier into a canonical lowercase info-hash.
///
/// Accepts either a bare hex hash (any case) or a full magnet URI with a
/// `btih` exact topic. Returns `None` for anything else.
pub fn normalize_info_hash(input: &str) -> Option<String> {
    let candidate = if input.starts_with("magnet:") {
        MAGNET_BTIH_RE.captures(input)?.get(1)?.as_str()
    } else {
        input.trim()
    };

    let lowered = candidate.to_lowercase();
    if is_valid_info_hash(&lowered) {
        Some(lowered)
    } else {
        None
    }
}

/// Build a minimal magnet URI for a canonical info-hash.
pub fn magnet_uri(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c";

    #[test]
    fn test_valid_info_hash() {
        assert!(is_valid_info_hash(HASH));
    }

    #[test]
    fn test_uppercase_is_not_canonical() {
        assert!(!is_valid_info_hash(&HASH.to_uppercase()));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!is_valid_info_hash("abc123"));
        assert!(!is_valid_info_hash(&format!("{}0", HASH)));
    }

    #[test]
    fn test_normalize_bare_hash() {
        assert_eq!(normalize_info_hash(HASH), Some(HASH.to_string()));
        assert_eq!(
            normalize_info_hash(&HASH.to_uppercase()),
            Some(HASH.to_string())
        );
        assert_eq!(normalize_info_hash(&format!("  {}  ", HASH)), Some(HASH.to_string()));
    }

    #[test]
    fn test_normalize_magnet_uri() {
        let uri = format!(
            "magnet:?xt=urn:btih:{}&dn=Some.Release&tr=udp%3A%2F%2Ftracker",
            HASH.to_uppercase()
        );
        assert_eq!(normalize_info_hash(&uri), Some(HASH.to_string()));
    }

    #[test]
    fn test_normalize_garbage() {
        assert_eq!(normalize_info_hash("not a hash"), None);
        assert_eq!(normalize_info_hash("magnet:?dn=no-hash-here"), None);
        assert_eq!(normalize_info_hash(""), None);
    }

    #[test]
    fn test_magnet_uri_round_trip() {
        let uri = magnet_uri(HASH);
        assert_eq!(normalize_info_hash(&uri), Some(HASH.to_string()));
    }
}
