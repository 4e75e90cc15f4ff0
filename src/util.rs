use wildmatch::WildMatch;

/// Milliseconds since the UNIX epoch, for history timestamps.
pub fn time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A human-readable local timestamp, for the 003 and 391 replies.
pub fn time_str() -> String {
    chrono::Local::now().to_rfc2822()
}

/// Whether `s` matches the IRC mask `mask`.
///
/// Masks are `nick!user@host` strings where `*` matches any run of
/// characters and `?` matches exactly one.  Matching is ASCII
/// case-insensitive.
pub fn mask_matches(mask: &str, s: &str) -> bool {
    WildMatch::new(&mask.to_ascii_lowercase()).matches(&s.to_ascii_lowercase())
}

// mod tests
