use once_cell::sync::Lazy;
use regex::Regex;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("handle regex"));
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_@])@([A-Za-z0-9_]{1,15})\b").expect("mention regex"));

/// Top-level routes that look like handles but never are.
pub const RESERVED_ROUTES: &[&str] = &[
    "home",
    "explore",
    "search",
    "notifications",
    "settings",
    "login",
    "logout",
    "messages",
    "i",
    "compose",
    "bookmarks",
    "lists",
    "communities",
    "premium",
    "signup",
    "tos",
    "privacy",
    "account",
    "intent",
    "share",
    "hashtag",
];

pub fn is_reserved(candidate: &str) -> bool {
    RESERVED_ROUTES
        .iter()
        .any(|route| route.eq_ignore_ascii_case(candidate))
}

/// Shape check only; reserved routes are rejected separately.
pub fn is_handle_shaped(candidate: &str) -> bool {
    HANDLE_RE.is_match(candidate)
}

/// Strip decoration (`@`, `/`, whitespace) and validate.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('@').trim_matches('/');
    if is_handle_shaped(trimmed) && !is_reserved(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// First non-reserved `@mention` in `text`.
pub fn first_mention(text: &str) -> Option<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| !is_reserved(candidate))
        .map(str::to_string)
}

/// Handle from a relative (`/alice`) or absolute profile href.
pub fn handle_from_href(href: &str) -> Option<String> {
    let path = match href.find("://") {
        Some(idx) => {
            let rest = &href[idx + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => href,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|seg| !seg.is_empty());
    let first = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    normalize_handle(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_accepts_letters_digits_underscore() {
        assert!(is_handle_shaped("alice_01"));
        assert!(!is_handle_shaped("alice-01"));
        assert!(!is_handle_shaped("sixteen_chars_xx"));
        assert!(!is_handle_shaped(""));
    }

    #[test]
    fn mention_skips_reserved_routes() {
        assert_eq!(
            first_mention("Hello @exampleuser welcome").as_deref(),
            Some("exampleuser")
        );
        assert_eq!(first_mention("@home"), None);
        assert_eq!(
            first_mention("go @home then ping @bob").as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn mention_ignores_email_addresses() {
        assert_eq!(first_mention("mail me at someone@example.com"), None);
    }

    #[test]
    fn href_must_be_single_segment() {
        assert_eq!(handle_from_href("/alice").as_deref(), Some("alice"));
        assert_eq!(
            handle_from_href("https://x.com/alice?s=20").as_deref(),
            Some("alice")
        );
        assert_eq!(handle_from_href("/alice/status/1"), None);
        assert_eq!(handle_from_href("/explore"), None);
    }
}
