/// Marker the exploit generator uses for raw hex literals (`#xdead` means `0xdead`).
pub const RESERVED_HEX_MARKER: &str = "#x";

/// Rewrite a `#x`-prefixed token into its `0x` form. `None` when the marker is absent.
pub fn reserved_hex_to_prefixed(token: &str) -> Option<String> {
    token
        .strip_prefix(RESERVED_HEX_MARKER)
        .map(|digits| format!("0x{digits}"))
}

/// Canonical decimal form of an integer token, or `None` when the token is not an integer.
///
/// Accepts surrounding whitespace, a leading sign and `_` digit separators.
pub fn canonical_decimal(token: &str) -> Option<String> {
    let trimmed = token.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if body.is_empty() || body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return None;
    }
    if !body.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return None;
    }
    let digits: String = body.chars().filter(|c| *c != '_').collect();
    let digits = digits.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    if negative && digits != "0" {
        Some(format!("-{digits}"))
    } else {
        Some(digits.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical_decimal, reserved_hex_to_prefixed};

    #[test]
    fn test_reserved_marker_rewrites_to_0x() {
        assert_eq!(reserved_hex_to_prefixed("#xdead").as_deref(), Some("0xdead"));
        assert_eq!(reserved_hex_to_prefixed("0xdead"), None);
        assert_eq!(reserved_hex_to_prefixed("dead"), None);
    }

    #[test]
    fn test_canonical_decimal_accepts_integer_literals_only() {
        assert_eq!(canonical_decimal(" 100 ").as_deref(), Some("100"));
        assert_eq!(canonical_decimal("+007").as_deref(), Some("7"));
        assert_eq!(canonical_decimal("-42").as_deref(), Some("-42"));
        assert_eq!(canonical_decimal("-0").as_deref(), Some("0"));
        assert_eq!(canonical_decimal("1_000").as_deref(), Some("1000"));
        assert_eq!(canonical_decimal("0x10"), None);
        assert_eq!(canonical_decimal("1__0"), None);
        assert_eq!(canonical_decimal(""), None);
        assert_eq!(canonical_decimal("-"), None);
    }
}
