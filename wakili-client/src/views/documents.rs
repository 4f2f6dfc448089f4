//! Document list rendering.

use super::{escape_html, format_date};
use wakili_core::DocumentSummary;

/// Characters of content shown in a list preview.
pub const PREVIEW_CHARS: usize = 100;

const ELLIPSIS: &str = "...";
const EMPTY_PLACEHOLDER: &str = "<p class=\"empty\">No documents yet</p>";

/// One row of the document list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: String,
    pub label: String,
    pub created: String,
    pub preview: String,
}

impl DocumentEntry {
    pub fn from_summary(summary: &DocumentSummary) -> Self {
        let (label, created) = match summary.parsed_id() {
            Some(id) => {
                let created = format_date(id.created_at());
                (id.label, created)
            }
            None => (summary.id.clone(), format_date(None)),
        };
        Self {
            id: summary.id.clone(),
            label,
            created,
            preview: truncate_preview(&summary.content),
        }
    }

    fn to_html(&self) -> String {
        format!(
            "<div class=\"document-item\" data-id=\"{}\"><h4>{}</h4><small>{}</small><p>{}</p></div>",
            escape_html(&self.id),
            escape_html(&self.label),
            escape_html(&self.created),
            escape_html(&self.preview)
        )
    }
}

/// First [`PREVIEW_CHARS`] characters followed by `...`, or the content
/// unchanged when it is short enough.
pub fn truncate_preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ELLIPSIS),
        None => content.to_string(),
    }
}

pub fn render_document_list(documents: &[DocumentSummary]) -> String {
    if documents.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }
    documents
        .iter()
        .map(|doc| DocumentEntry::from_summary(doc).to_html())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_from_three_part_id() {
        let entry = DocumentEntry::from_summary(&DocumentSummary::new(
            "advice_ContractReview_1700000000000000000",
            "short",
        ));
        assert_eq!(entry.label, "ContractReview");
        assert_eq!(entry.created, "November 14, 2023");
        assert_eq!(entry.preview, "short");
    }

    #[test]
    fn malformed_id_falls_back_to_raw() {
        let entry = DocumentEntry::from_summary(&DocumentSummary::new("loose-id", "x"));
        assert_eq!(entry.label, "loose-id");
        assert_eq!(entry.created, "Unknown date");
    }

    #[test]
    fn long_content_truncated() {
        let content = "a".repeat(150);
        let preview = truncate_preview(&content);
        assert_eq!(preview, format!("{}...", "a".repeat(100)));
    }

    #[test]
    fn short_content_unchanged() {
        let content = "b".repeat(50);
        assert_eq!(truncate_preview(&content), content);
        let exact = "c".repeat(100);
        assert_eq!(truncate_preview(&exact), exact);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let content = "é".repeat(120);
        let preview = truncate_preview(&content);
        assert_eq!(preview.chars().count(), 103);
    }

    #[test]
    fn empty_list_placeholder() {
        assert_eq!(render_document_list(&[]), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn list_renders_each_item() {
        let html = render_document_list(&[
            DocumentSummary::new("doc_NDA_1700000000000000000", "one"),
            DocumentSummary::new("doc_Lease_1700000000000000000", "two"),
        ]);
        assert_eq!(html.matches("class=\"document-item\"").count(), 2);
        assert!(html.contains("<h4>NDA</h4>"));
    }
}
