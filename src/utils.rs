use sha2::{Digest, Sha256};
use std::path::Path;
use time::OffsetDateTime;

pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Local wall clock, or UTC when the local offset can't be determined
/// (multi-threaded processes on some platforms).
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Renders `pattern` using the moment-style tokens `YYYY`, `MM`, `DD`, `HH`,
/// `mm` and `ss`. Anything else is copied through.
pub fn format_with_pattern(pattern: &str, at: OffsetDateTime) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    while !rest.is_empty() {
        let (token, value) = if rest.starts_with("YYYY") {
            ("YYYY", format!("{:04}", at.year()))
        } else if rest.starts_with("MM") {
            ("MM", format!("{:02}", u8::from(at.month())))
        } else if rest.starts_with("DD") {
            ("DD", format!("{:02}", at.day()))
        } else if rest.starts_with("HH") {
            ("HH", format!("{:02}", at.hour()))
        } else if rest.starts_with("mm") {
            ("mm", format!("{:02}", at.minute()))
        } else if rest.starts_with("ss") {
            ("ss", format!("{:02}", at.second()))
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        };
        out.push_str(&value);
        rest = &rest[token.len()..];
    }
    out
}

pub fn file_stem_title(rel_path: &str) -> String {
    Path::new(rel_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(rel_path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, PrimitiveDateTime, Time};

    #[test]
    fn formats_moment_style_tokens() {
        let at = PrimitiveDateTime::new(
            Date::from_calendar_date(2024, Month::September, 1).unwrap(),
            Time::from_hms(7, 5, 9).unwrap(),
        )
        .assume_utc();
        assert_eq!(format_with_pattern("YYYY-MM-DD/HH:mm", at), "2024-09-01/07:05");
        assert_eq!(format_with_pattern("DD-MM-YYYY", at), "01-09-2024");
        assert_eq!(format_with_pattern("YYYY-MM-DDTHH:mm:ss", at), "2024-09-01T07:05:09");
    }

    #[test]
    fn markdown_extension_check() {
        assert!(is_markdown_path(Path::new("a/b.md")));
        assert!(is_markdown_path(Path::new("a/b.MARKDOWN")));
        assert!(!is_markdown_path(Path::new("a/b.txt")));
    }

    #[test]
    fn stem_title() {
        assert_eq!(file_stem_title("Projects/Plan.md"), "Plan");
    }
}
