//! Utility functions for path-safe naming and display formatting

/// Characters that are invalid in file and folder names on at least one
/// supported platform.
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a channel, forum, or thread name for use as a path segment
///
/// Replaces each of `< > : " / \ | ? *` with `_`, then strips leading and
/// trailing spaces and dots (Windows rejects names ending in either).
///
/// # Examples
///
/// ```
/// use discord_dl::utils::sanitize_name;
///
/// assert_eq!(sanitize_name("a/b:c*d"), "a_b_c_d");
/// assert_eq!(sanitize_name(" foo. "), "foo");
/// ```
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced
        .trim_matches(|c: char| c == ' ' || c == '.')
        .to_string()
}

/// Format a byte count as a human-readable size with two decimals
///
/// # Examples
///
/// ```
/// use discord_dl::utils::format_file_size;
///
/// assert_eq!(format_file_size(512), "512.00 B");
/// assert_eq!(format_file_size(1536), "1.50 KB");
/// ```
#[must_use]
pub fn format_file_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_each_invalid_character() {
        assert_eq!(sanitize_name("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_name(r#"<>:"/\|?*"#), "_________");
    }

    #[test]
    fn sanitize_strips_leading_and_trailing_spaces_and_dots() {
        assert_eq!(sanitize_name(" foo. "), "foo");
        assert_eq!(sanitize_name("...bar..."), "bar");
        assert_eq!(sanitize_name(" . x . "), "x");
    }

    #[test]
    fn sanitize_keeps_interior_dots_and_spaces() {
        assert_eq!(sanitize_name("release notes v1.2"), "release notes v1.2");
    }

    #[test]
    fn sanitize_handles_unicode_names() {
        // Non-ASCII channel names pass through untouched
        assert_eq!(sanitize_name("日本語チャンネル"), "日本語チャンネル");
        assert_eq!(sanitize_name("général/chat"), "général_chat");
    }

    #[test]
    fn sanitize_of_only_invalid_trim_chars_is_empty() {
        assert_eq!(sanitize_name(" .. "), "");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn format_file_size_units() {
        assert_eq!(format_file_size(0), "0.00 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_file_size(2 * 1024u64.pow(4)), "2.00 TB");
    }
}
