//! Generated-text rendering for the response area.

use super::escape_html;

/// Marker tokens emphasized wherever they appear in generated text.
pub const EMPHASIS_MARKERS: [&str; 3] = ["IMPORTANT:", "NOTE:", "DISCLAIMER:"];

/// Render generated text: escape it, turn line breaks into `<br>` and wrap
/// each marker token in `<strong>`. Literal substring replacement only.
pub fn render_response(text: &str) -> String {
    let mut html = escape_html(text).replace('\n', "<br>");
    for marker in EMPHASIS_MARKERS {
        html = html.replace(marker, &format!("<strong>{}</strong>", marker));
    }
    html
}

/// Render a failure in the same area successful output goes to.
pub fn render_error(message: &str) -> String {
    format!("<p class=\"error\">Error: {}</p>", escape_html(message))
}
