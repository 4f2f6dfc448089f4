//! Request and response payloads exchanged with the legal backend.

use crate::error::ValidationError;
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// The reply every fallible backend method returns: the Candid variant
/// `Ok : T` or `Err : text`.
pub type RemoteReply<T> = Result<T, String>;

/// A request for advice or for a generated document.
///
/// Built through [`LegalRequest::new`], so a request that reaches the wire
/// always carries a non-empty prompt.
#[derive(Debug, Clone, PartialEq, Eq, CandidType, Serialize, Deserialize)]
pub struct LegalRequest {
    prompt: String,
    document_type: Option<String>,
    context: Option<String>,
    /// `opt bool` in the backend interface; always sent.
    is_confidential: Option<bool>,
}

impl LegalRequest {
    /// Create a request. The prompt is trimmed and must not be empty.
    pub fn new(prompt: impl AsRef<str>) -> Result<Self, ValidationError> {
        let prompt = prompt.as_ref().trim();
        if prompt.is_empty() {
            return Err(ValidationError::missing("prompt"));
        }
        Ok(Self {
            prompt: prompt.to_string(),
            document_type: None,
            context: None,
            is_confidential: Some(false),
        })
    }

    /// Set the document type. Blank input clears it.
    pub fn with_document_type(mut self, document_type: Option<&str>) -> Self {
        self.document_type = non_blank(document_type);
        self
    }

    /// Set the free-form context. Blank input clears it.
    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.context = non_blank(context);
        self
    }

    pub fn confidential(mut self, is_confidential: bool) -> Self {
        self.is_confidential = Some(is_confidential);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn document_type(&self) -> Option<&str> {
        self.document_type.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_confidential(&self) -> bool {
        self.is_confidential.unwrap_or(false)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Successful reply of the advice and document methods.
#[derive(Debug, Clone, PartialEq, Eq, CandidType, Serialize, Deserialize)]
pub struct LegalResponse {
    pub response: String,
    pub document: Option<String>,
    pub status: String,
    pub request_id: Option<String>,
}

impl LegalResponse {
    /// The text to keep as the current document, if the reply carries one.
    ///
    /// Falls back to the response text when the backend flagged a document
    /// but left the body in `response`.
    pub fn document_text(&self) -> &str {
        self.document.as_deref().unwrap_or(&self.response)
    }

    pub fn is_document(&self) -> bool {
        self.document.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_rejected() {
        assert_eq!(
            LegalRequest::new("   \n"),
            Err(ValidationError::missing("prompt"))
        );
    }

    #[test]
    fn blank_context_becomes_none() {
        let request = LegalRequest::new("Can my landlord keep the deposit?")
            .unwrap()
            .with_context(Some("  "))
            .with_document_type(Some(""));
        assert_eq!(request.context(), None);
        assert_eq!(request.document_type(), None);
    }

    #[test]
    fn request_decodes_as_the_backend_record() {
        #[derive(CandidType, Deserialize)]
        struct BackendRequest {
            prompt: String,
            document_type: Option<String>,
            context: Option<String>,
            is_confidential: Option<bool>,
        }

        let request = LegalRequest::new("Draft an NDA")
            .unwrap()
            .with_document_type(Some("NDA"))
            .confidential(true);
        let bytes = candid::encode_one(&request).unwrap();
        let decoded: BackendRequest = candid::decode_one(&bytes).unwrap();
        assert_eq!(decoded.prompt, "Draft an NDA");
        assert_eq!(decoded.document_type.as_deref(), Some("NDA"));
        assert_eq!(decoded.context, None);
        assert_eq!(decoded.is_confidential, Some(true));
    }

    #[test]
    fn tagged_reply_decodes_both_arms() {
        let ok: RemoteReply<LegalResponse> = Ok(LegalResponse {
            response: "text".to_string(),
            document: None,
            status: "success".to_string(),
            request_id: Some("1".to_string()),
        });
        let bytes = candid::encode_one(&ok).unwrap();
        let decoded: RemoteReply<LegalResponse> = candid::decode_one(&bytes).unwrap();
        assert_eq!(decoded.unwrap().response, "text");

        let err: RemoteReply<LegalResponse> = Err("Profile not found".to_string());
        let bytes = candid::encode_one(&err).unwrap();
        let decoded: RemoteReply<LegalResponse> = candid::decode_one(&bytes).unwrap();
        assert_eq!(decoded, Err("Profile not found".to_string()));
    }

    #[test]
    fn confidentiality_defaults_to_false() {
        let request = LegalRequest::new("Is this binding?").unwrap();
        assert!(!request.is_confidential());
        assert!(request.confidential(true).is_confidential());
    }

    #[test]
    fn document_text_prefers_document() {
        let response = LegalResponse {
            response: "Document generated successfully".to_string(),
            document: Some("LEGAL DOCUMENT: NDA".to_string()),
            status: "success".to_string(),
            request_id: None,
        };
        assert!(response.is_document());
        assert_eq!(response.document_text(), "LEGAL DOCUMENT: NDA");
    }
}
