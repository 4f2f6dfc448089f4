//! Pure view rendering: remote data in, display markup out.

pub mod documents;
pub mod profile;
pub mod response;

pub use documents::{render_document_list, truncate_preview, DocumentEntry, PREVIEW_CHARS};
pub use profile::{render_profile, ProfileView};
pub use response::{render_error, render_response, EMPHASIS_MARKERS};

use chrono::{DateTime, Utc};

/// Date format used everywhere a timestamp is shown.
pub const DATE_FORMAT: &str = "%B %-d, %Y";

/// Shown when a timestamp is missing or out of range.
pub const UNKNOWN_DATE: &str = "Unknown date";

pub fn format_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>Tom & \"Jerry\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn formats_dates() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).single();
        assert_eq!(format_date(at), "March 5, 2024");
        assert_eq!(format_date(None), UNKNOWN_DATE);
    }
}
