//! Cookie-header pattern matching.
//!
//! The probe only sees the cookie header exposed to page script, so the
//! protected session cookie is never here. What is here: the CSRF-style
//! companion cookie and the account id cookie.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cookie carrying the signed-in account id.
pub const USER_ID_COOKIE: &str = "twid";
/// Script-visible session companion cookie.
pub const DEFAULT_CSRF_COOKIE: &str = "ct0";

// `u%3A123`, `u:123`, `u%3D123`, `u=123`, optionally quoted.
static USER_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^"?u(?:%3[AaDd]|[:=])(\d+)"?$"#).expect("user id regex")
});

/// Split a raw `Cookie:` header into `(name, value)` pairs.
///
/// Malformed segments (no `=`, empty name) are skipped.
pub fn parse_cookie_header(raw: &str) -> Vec<(&str, &str)> {
    raw.split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim()))
        })
        .collect()
}

/// Value of the first cookie named `name`, if non-empty.
pub fn cookie_value<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    parse_cookie_header(raw)
        .into_iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Account id from the id cookie, accepting both encodings of the same value.
pub fn extract_user_id(raw_cookies: &str) -> Option<String> {
    let value = cookie_value(raw_cookies, USER_ID_COOKIE)?;
    USER_ID_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_csrf_token(raw_cookies: &str, cookie_name: &str) -> Option<String> {
    cookie_value(raw_cookies, cookie_name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_both_encodings() {
        assert_eq!(
            extract_user_id("twid=u%3A123456789").as_deref(),
            Some("123456789")
        );
        assert_eq!(
            extract_user_id("twid=u:123456789").as_deref(),
            Some("123456789")
        );
        assert_eq!(
            extract_user_id("guest_id=v1; twid=\"u=42\"; lang=en").as_deref(),
            Some("42")
        );
        assert_eq!(extract_user_id("twid=u%3D77").as_deref(), Some("77"));
    }

    #[test]
    fn user_id_rejects_other_shapes() {
        assert_eq!(extract_user_id("twid=abc"), None);
        assert_eq!(extract_user_id("xtwid=u:1"), None);
        assert_eq!(extract_user_id(""), None);
    }

    #[test]
    fn csrf_token_is_exact_name_match() {
        let raw = "guest_id=v1%3A1; ct0=deadbeef; lang=en";
        assert_eq!(
            extract_csrf_token(raw, DEFAULT_CSRF_COOKIE).as_deref(),
            Some("deadbeef")
        );
        assert_eq!(extract_csrf_token("xct0=1", DEFAULT_CSRF_COOKIE), None);
        assert_eq!(extract_csrf_token("ct0=", DEFAULT_CSRF_COOKIE), None);
    }

    #[test]
    fn malformed_segments_are_skipped() {
        let pairs = parse_cookie_header("junk; =x; a=1;; b = 2 ");
        assert_eq!(pairs, vec![("a", "1"), ("b", "2")]);
    }
}
