//! Document hierarchy: a parsed document and its heading-delimited sections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of content held by a [`Section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Table,
    ImageRef,
}

/// A complete parsed document.
///
/// Sections are stored as a flat ordered list; the hierarchy is carried by
/// each section's `level` and `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Knowledge base this document belongs to.
    pub kb_id: String,
    /// Unique document identifier (content hash when not supplied).
    pub doc_id: String,
    /// Document title (first H1, or a sentinel).
    pub title: String,
    /// The raw source text the document was parsed from.
    pub original_source: String,
    /// Ordered sections in document order.
    pub sections: Vec<Section>,
    /// Free-form document metadata.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A heading-delimited span of a document.
///
/// Invariant: `parent_id`, when set, references a section of strictly lower
/// level that appears earlier in document order. Level skipping in the source
/// (e.g. `#` followed by `###`) is tolerated and not normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    /// Heading text.
    pub title: String,
    /// Heading level, 1..=6.
    pub level: u8,
    /// Text accumulated under this heading, trimmed.
    pub content: String,
    /// Nearest earlier section with strictly lower level, if any.
    pub parent_id: Option<String>,
    pub content_type: ContentType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_serde_tags() {
        assert_eq!(serde_json::to_string(&ContentType::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&ContentType::ImageRef).unwrap(), "\"image_ref\"");
    }

    #[test]
    fn test_document_serde_roundtrip() {
        let doc = Document {
            kb_id: "kb-1".to_string(),
            doc_id: "doc-1".to_string(),
            title: "Contract".to_string(),
            original_source: "# Contract\n\nBody.".to_string(),
            sections: vec![Section {
                section_id: "doc-1-section-0".to_string(),
                title: "Contract".to_string(),
                level: 1,
                content: "Body.".to_string(),
                parent_id: None,
                content_type: ContentType::Text,
            }],
            metadata: BTreeMap::new(),
        };

        let json = serde_json::to_string(&doc).expect("serialize Document");
        let restored: Document = serde_json::from_str(&json).expect("deserialize Document");

        assert_eq!(restored.doc_id, doc.doc_id);
        assert_eq!(restored.sections.len(), 1);
        assert_eq!(restored.sections[0].level, 1);
        assert!(restored.sections[0].parent_id.is_none());
    }
}
