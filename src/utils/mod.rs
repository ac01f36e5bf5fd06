//! # Utilities
//!
//! Validators and the shortcode generator. Everything here is pure apart from
//! the random source used by [`RandomShortcodeGenerator`].

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

// =====================================
// Constants
// =====================================
/// Alphabet used for generated shortcodes (26 upper, 26 lower, 10 digits)
pub const SHORTCODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated shortcodes
pub const GENERATED_SHORTCODE_LENGTH: usize = 6;

pub const MIN_SHORTCODE_LENGTH: usize = 4;

pub const MAX_SHORTCODE_LENGTH: usize = 20;

/// Long URLs are cut to this many characters in log entries
pub const LOG_URL_PREVIEW_LENGTH: usize = 30;

/// Valid custom shortcode syntax.
pub static VALID_SHORTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{4,20}$").expect("Invalid regex pattern")
});

// =====================================
// Validation Functions
// =====================================
/// True iff `s` is a well-formed absolute URL with a scheme and a host.
///
/// Control characters are rejected outright: the URL parser would silently
/// strip or escape them, leaving a stored string that differs from what was
/// validated. No network check is performed.
///
/// ```rust
/// use link_ledger::utils::validate_url;
///
/// assert!(validate_url("https://example.com"));
/// assert!(!validate_url("not-a-url"));
/// assert!(!validate_url("https://example.com/a\u{1}b"));
/// ```
#[must_use]
pub fn validate_url(s: &str) -> bool {
    if s.chars().any(char::is_control) {
        return false;
    }

    match url::Url::parse(s) {
        Ok(url) => url.host_str().map_or(false, |host| !host.is_empty()),
        Err(_) => false,
    }
}

/// True iff `s` matches `^[A-Za-z0-9_-]{4,20}$`.
///
/// ```rust
/// use link_ledger::utils::validate_shortcode;
///
/// assert!(validate_shortcode("my-link_1"));
/// assert!(!validate_shortcode("abc"));
/// ```
#[must_use]
pub fn validate_shortcode(s: &str) -> bool {
    VALID_SHORTCODE.is_match(s)
}

/// True iff `minutes` is a positive integer.
#[must_use]
pub fn validate_ttl_minutes(minutes: i64) -> bool {
    minutes > 0
}

// =====================================
// Shortcode Generation
// =====================================
/// Source of candidate shortcodes.
///
/// Candidates are not guaranteed unique; the registry retries on collision.
pub trait ShortcodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws [`GENERATED_SHORTCODE_LENGTH`] characters uniformly, with replacement,
/// from [`SHORTCODE_ALPHABET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShortcodeGenerator;

impl ShortcodeGenerator for RandomShortcodeGenerator {
    fn generate(&self) -> String {
        generate_shortcode()
    }
}

/// Random 6-character alphanumeric shortcode.
///
/// ```rust
/// use link_ledger::utils::generate_shortcode;
///
/// let code = generate_shortcode();
/// assert_eq!(code.len(), 6);
/// ```
#[must_use]
pub fn generate_shortcode() -> String {
    let mut rng = rand::thread_rng();

    (0..GENERATED_SHORTCODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SHORTCODE_ALPHABET.len());
            SHORTCODE_ALPHABET[idx] as char
        })
        .collect()
}

// =====================================
// String Utilities
// =====================================
/// Shortens long URLs for log entries: first 30 characters followed by `...`.
#[must_use]
pub fn preview_url(url: &str) -> String {
    if url.chars().count() <= LOG_URL_PREVIEW_LENGTH {
        return url.to_string();
    }

    let head: String = url.chars().take(LOG_URL_PREVIEW_LENGTH).collect();
    format!("{}...", head)
}

/// Joins a base URL and a shortcode into a full short URL.
#[must_use]
pub fn short_url(base_url: &str, shortcode: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), shortcode)
}

// =====================================
// Tests
// =====================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shortcode() {
        let code = generate_shortcode();
        assert_eq!(code.len(), GENERATED_SHORTCODE_LENGTH);
        assert!(code.bytes().all(|b| SHORTCODE_ALPHABET.contains(&b)));
        assert!(validate_shortcode(&code));
    }

    #[test]
    fn test_random_generator_uses_alphabet() {
        let generator = RandomShortcodeGenerator;
        for _ in 0..100 {
            let code = generator.generate();
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_validate_shortcode() {
        assert!(validate_shortcode("abcd"));
        assert!(validate_shortcode("ABC-xyz_123"));
        assert!(validate_shortcode("a".repeat(20).as_str()));
        assert!(!validate_shortcode("abc"));
        assert!(!validate_shortcode("a".repeat(21).as_str()));
        assert!(!validate_shortcode("abc 123"));
        assert!(!validate_shortcode("abc@123"));
        assert!(!validate_shortcode(""));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com"));
        assert!(validate_url("http://example.com/path?q=1"));
        assert!(validate_url("ftp://files.example.com/readme"));
        assert!(!validate_url("not-a-url"));
        assert!(!validate_url("example.com"));
        assert!(!validate_url("mailto:someone@example.com"));
        assert!(!validate_url(""));
    }

    #[test]
    fn test_validate_url_rejects_control_characters() {
        assert!(!validate_url("https://example.com/a\u{1}b"));
        assert!(!validate_url("https://example.com/a\tb"));
        assert!(!validate_url("https://example.com/\r\nSet-Cookie: x=1"));
        assert!(!validate_url("https://example.com/\u{7f}"));
        assert!(validate_url("https://example.com/caf\u{e9}"));
    }

    #[test]
    fn test_validate_ttl_minutes() {
        assert!(validate_ttl_minutes(1));
        assert!(validate_ttl_minutes(30));
        assert!(!validate_ttl_minutes(0));
        assert!(!validate_ttl_minutes(-5));
    }

    #[test]
    fn test_preview_url() {
        assert_eq!(preview_url("https://a.io"), "https://a.io");
        let long = "https://example.com/a/very/long/path/indeed";
        assert_eq!(preview_url(long), "https://example.com/a/very/lon...");
    }

    #[test]
    fn test_short_url() {
        assert_eq!(short_url("http://localhost:3000/", "abc123"), "http://localhost:3000/abc123");
    }
}
