//! Markdown parser producing a hierarchical [`Document`].
//!
//! A single left-to-right scan over lines. Heading lines (`#` through
//! `######`) close the in-progress section and open a new one; the parent of
//! each section is resolved against a level-ordered stack of open ancestors.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::models::{ContentType, Document, Section};
use crate::utils::content_hash;

/// Title used when the source has no level-1 heading.
pub const DEFAULT_TITLE: &str = "Untitled Document";

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("static regex is valid"))
}

/// Parser for converting markdown text into a structured [`Document`].
pub struct MarkdownParser;

impl MarkdownParser {
    /// Parse markdown content into a document.
    ///
    /// * `doc_id` defaults to a hash of the content when not supplied.
    /// * `title` defaults to the first H1 heading, else [`DEFAULT_TITLE`].
    /// * Input with no headings yields exactly one level-1 "Root" section;
    ///   empty input yields zero sections.
    pub fn parse(
        content: &str,
        kb_id: &str,
        doc_id: Option<&str>,
        title: Option<&str>,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Document {
        let doc_id = match doc_id {
            Some(id) => id.to_string(),
            None => content_hash(content, "doc-"),
        };

        let title = match title {
            Some(t) => t.to_string(),
            None => Self::extract_title(content),
        };

        let sections = Self::parse_sections(content, &doc_id);

        let mut metadata = metadata.unwrap_or_default();
        metadata
            .entry("total_length".to_string())
            .or_insert_with(|| serde_json::json!(content.len()));
        metadata
            .entry("section_count".to_string())
            .or_insert_with(|| serde_json::json!(sections.len()));

        Document {
            kb_id: kb_id.to_string(),
            doc_id,
            title,
            original_source: content.to_string(),
            sections,
            metadata,
        }
    }

    /// Title = text of the first level-1 heading, else the sentinel.
    fn extract_title(content: &str) -> String {
        for line in content.lines() {
            if let Some(caps) = heading_re().captures(line) {
                if caps[1].len() == 1 {
                    return caps[2].trim().to_string();
                }
            }
        }
        DEFAULT_TITLE.to_string()
    }

    fn parse_sections(content: &str, doc_id: &str) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();

        // Stack of (level, section_id) for sections whose heading is still an
        // open ancestor; only strictly increasing levels remain on it.
        let mut stack: Vec<(u8, String)> = Vec::new();
        let mut counter = 0usize;
        let mut current_lines: Vec<&str> = Vec::new();
        let mut current_level = 0u8;
        let mut current_title = "Root".to_string();

        let mut close_current = |lines: &[&str],
                                 level: u8,
                                 title: &str,
                                 stack: &[(u8, String)],
                                 counter: &mut usize,
                                 sections: &mut Vec<Section>| {
            let text = lines.join("\n").trim().to_string();
            if text.is_empty() || level == 0 {
                return;
            }
            let section_id = format!("{doc_id}-section-{counter}");
            *counter += 1;

            // Parent is the nearest earlier section with strictly lower level.
            let parent_id = stack
                .iter()
                .rev()
                .find(|(l, _)| *l < level)
                .map(|(_, id)| id.clone());

            sections.push(Section {
                section_id,
                title: title.to_string(),
                level,
                content: text,
                parent_id,
                content_type: ContentType::Text,
            });
        };

        for line in content.lines() {
            if let Some(caps) = heading_re().captures(line) {
                close_current(
                    &current_lines,
                    current_level,
                    &current_title,
                    &stack,
                    &mut counter,
                    &mut sections,
                );

                let new_level = caps[1].len() as u8;
                let new_title = caps[2].trim().to_string();

                // Push the just-closed heading before resolving the new one,
                // then pop everything at the same or higher level.
                if current_level > 0 {
                    let closed_id = sections
                        .last()
                        .filter(|s| s.level == current_level && s.title == current_title)
                        .map(|s| s.section_id.clone());
                    // Headings without content emit no section and therefore
                    // never become parents.
                    if let Some(id) = closed_id {
                        stack.push((current_level, id));
                    }
                }
                while stack.last().is_some_and(|(l, _)| *l >= new_level) {
                    stack.pop();
                }

                current_level = new_level;
                current_title = new_title;
                current_lines.clear();
            } else {
                current_lines.push(line);
            }
        }

        close_current(
            &current_lines,
            current_level,
            &current_title,
            &stack,
            &mut counter,
            &mut sections,
        );

        // No headings at all: a single Root section holding everything.
        if sections.is_empty() && !content.trim().is_empty() {
            sections.push(Section {
                section_id: format!("{doc_id}-section-0"),
                title: "Root".to_string(),
                level: 1,
                content: content.trim().to_string(),
                parent_id: None,
                content_type: ContentType::Text,
            });
        }

        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Document {
        MarkdownParser::parse(content, "kb-test", Some("doc-test"), None, None)
    }

    #[test]
    fn test_no_headings_yields_single_root_section() {
        let doc = parse("  Plain text without any headings.\nSecond line.  ");
        assert_eq!(doc.sections.len(), 1);
        let s = &doc.sections[0];
        assert_eq!(s.title, "Root");
        assert_eq!(s.level, 1);
        assert_eq!(s.content, "Plain text without any headings.\nSecond line.");
        assert!(s.parent_id.is_none());
    }

    #[test]
    fn test_empty_input_yields_zero_sections() {
        let doc = parse("");
        assert!(doc.sections.is_empty());
        let doc = parse("   \n\t\n");
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn test_title_from_first_h1() {
        let doc = MarkdownParser::parse("# The Title\n\nBody.", "kb", None, None, None);
        assert_eq!(doc.title, "The Title");
    }

    #[test]
    fn test_title_sentinel_without_h1() {
        let doc = MarkdownParser::parse("## Only H2\n\nBody.", "kb", None, None, None);
        assert_eq!(doc.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_doc_id_defaults_to_content_hash() {
        let a = MarkdownParser::parse("same content", "kb", None, None, None);
        let b = MarkdownParser::parse("same content", "kb", None, None, None);
        assert_eq!(a.doc_id, b.doc_id);
        assert!(a.doc_id.starts_with("doc-"));
    }

    #[test]
    fn test_sibling_h2_parent_is_h1_not_h3() {
        let md = "# One\n\na\n\n## Two\n\nb\n\n### Three\n\nc\n\n## Four\n\nd\n";
        let doc = parse(md);
        assert_eq!(doc.sections.len(), 4);

        let one = &doc.sections[0];
        let two = &doc.sections[1];
        let three = &doc.sections[2];
        let four = &doc.sections[3];

        assert_eq!(one.level, 1);
        assert!(one.parent_id.is_none());
        assert_eq!(two.parent_id.as_deref(), Some(one.section_id.as_str()));
        assert_eq!(three.parent_id.as_deref(), Some(two.section_id.as_str()));
        // The second H2 is a sibling of the first, parented by the H1 — not
        // by the H3 that immediately precedes it.
        assert_eq!(four.parent_id.as_deref(), Some(one.section_id.as_str()));
    }

    #[test]
    fn test_level_skipping_is_tolerated() {
        let md = "# Top\n\na\n\n### Deep\n\nb\n";
        let doc = parse(md);
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[1].level, 3);
        assert_eq!(
            doc.sections[1].parent_id.as_deref(),
            Some(doc.sections[0].section_id.as_str())
        );
    }

    #[test]
    fn test_heading_without_content_emits_no_section() {
        let md = "# Empty\n\n## Filled\n\ncontent\n";
        let doc = parse(md);
        // "# Empty" accumulated no content lines before the next heading.
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Filled");
    }

    #[test]
    fn test_section_ids_are_sequential() {
        let md = "# A\n\n1\n\n# B\n\n2\n";
        let doc = parse(md);
        assert_eq!(doc.sections[0].section_id, "doc-test-section-0");
        assert_eq!(doc.sections[1].section_id, "doc-test-section-1");
    }

    #[test]
    fn test_metadata_defaults_are_set() {
        let doc = parse("# A\n\nbody\n");
        assert!(doc.metadata.contains_key("total_length"));
        assert_eq!(doc.metadata["section_count"], serde_json::json!(1));
    }

    #[test]
    fn test_seven_hashes_is_not_a_heading() {
        let md = "####### not a heading\n";
        let doc = parse(md);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Root");
    }
}
