//! Document splitters: strategies for cutting a [`Document`] into chunks.
//!
//! Two strategies are implemented:
//! - [`WindowSplitter`] — sliding character/token window with delimiter
//!   back-off so chunks avoid breaking mid-word.
//! - [`StructureAwareSplitter`] — accumulates whole sections and never cuts
//!   inside one, trading uniform chunk sizes for boundary fidelity.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{KbError, Result};
use crate::ingestion::tokenizer::Tokenizer;
use crate::models::{Chunk, ChunkStrategy, Document, Section};
use crate::utils::content_hash;

/// Delimiters tried when backing a window off a mid-word cut, most preferred
/// first. The empty string means "cut at the window edge".
const DELIMITERS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Shared contract for chunking strategies.
pub trait Splitter: Send + Sync {
    /// Split a document into ordered chunks.
    fn split(&self, document: &Document, kb_id: &str) -> Vec<Chunk>;
}

fn make_chunk(
    text: &str,
    doc_id: &str,
    kb_id: &str,
    section_id: Option<&str>,
    token_count: usize,
    strategy: ChunkStrategy,
) -> Chunk {
    Chunk {
        chunk_id: content_hash(text, "chunk-"),
        doc_id: doc_id.to_string(),
        kb_id: kb_id.to_string(),
        section_id: section_id.map(ToOwned::to_owned),
        content_text: text.to_string(),
        token_count,
        embedding: None,
        strategy,
        metadata: Default::default(),
    }
}

// ── Window splitter ───────────────────────────────────────────────────────────

/// Sliding-window splitter with delimiter back-off.
///
/// Walks each section's content with a window of `chunk_size`; when the
/// window would cut inside the text, the end backs off to the rightmost
/// occurrence of the most preferred delimiter present in the window. The next
/// window starts `chunk_overlap` before the previous end; the final remainder
/// is emitted without overlap.
///
/// Sizes are characters by default, or token indices when a tokenizer is
/// supplied.
pub struct WindowSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl WindowSplitter {
    /// Create a window splitter.
    ///
    /// # Errors
    /// Returns [`KbError::Config`] when `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size` (the window could never advance).
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(KbError::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(KbError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, tokenizer })
    }

    fn split_section(&self, section: &Section, doc_id: &str, kb_id: &str) -> Vec<Chunk> {
        match &self.tokenizer {
            Some(tok) => self.split_by_tokens(section, doc_id, kb_id, tok.as_ref()),
            None => self.split_by_characters(section, doc_id, kb_id),
        }
    }

    fn split_by_characters(&self, section: &Section, doc_id: &str, kb_id: &str) -> Vec<Chunk> {
        let text = section.content.as_str();

        // Byte offsets of char boundaries; positions below index this table,
        // so window arithmetic is in characters, never mid-UTF-8.
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        let total = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < total {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                let window = &text[bounds[start]..bounds[end]];
                for delim in DELIMITERS {
                    if let Some(pos) = window.rfind(delim) {
                        let cut = bounds[start] + pos + delim.len();
                        // Delimiters are ASCII, so `cut` is a char boundary.
                        end = bounds.partition_point(|&b| b < cut);
                        break;
                    }
                }
            }

            let piece = text[bounds[start]..bounds[end]].trim();
            if !piece.is_empty() {
                chunks.push(make_chunk(
                    piece,
                    doc_id,
                    kb_id,
                    Some(&section.section_id),
                    piece.chars().count(),
                    ChunkStrategy::Window,
                ));
            }

            start = if end < total {
                // A delimiter sitting at the window start can pull `end` back
                // within the overlap; force forward progress.
                end.saturating_sub(self.chunk_overlap).max(start + 1)
            } else {
                end
            };
        }

        chunks
    }

    fn split_by_tokens(
        &self,
        section: &Section,
        doc_id: &str,
        kb_id: &str,
        tokenizer: &dyn Tokenizer,
    ) -> Vec<Chunk> {
        let tokens = tokenizer.encode(&section.content);
        let total = tokens.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < total {
            let end = (start + self.chunk_size).min(total);
            let piece = tokenizer.decode(&tokens[start..end]);
            let piece = piece.trim();

            if !piece.is_empty() {
                chunks.push(make_chunk(
                    piece,
                    doc_id,
                    kb_id,
                    Some(&section.section_id),
                    end - start,
                    ChunkStrategy::Window,
                ));
            }

            start = if end < total { end - self.chunk_overlap } else { end };
        }

        chunks
    }
}

impl Splitter for WindowSplitter {
    fn split(&self, document: &Document, kb_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for section in &document.sections {
            chunks.extend(self.split_section(section, &document.doc_id, kb_id));
        }
        debug!(doc_id = %document.doc_id, chunks = chunks.len(), "window split complete");
        chunks
    }
}

// ── Structure-aware splitter ──────────────────────────────────────────────────

/// Splitter that accumulates whole sections and flushes at size boundaries.
///
/// A chunk is flushed whenever adding the next section would exceed
/// `max_chunk_size`. A single section larger than `max_chunk_size` is kept
/// intact as its own chunk — sections are never cut, which is the point of
/// this strategy.
pub struct StructureAwareSplitter {
    max_chunk_size: usize,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl StructureAwareSplitter {
    /// Create a structure-aware splitter.
    ///
    /// # Errors
    /// Returns [`KbError::Config`] when `max_chunk_size` is zero.
    pub fn new(max_chunk_size: usize, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(KbError::Config("max_chunk_size must be > 0".to_string()));
        }
        Ok(Self { max_chunk_size, tokenizer })
    }

    fn section_size(&self, section: &Section) -> usize {
        match &self.tokenizer {
            Some(tok) => tok.count(&section.content),
            None => section.content.chars().count(),
        }
    }

    fn flush(
        &self,
        pending: &mut Vec<String>,
        pending_size: &mut usize,
        section_id: &mut Option<String>,
        document: &Document,
        kb_id: &str,
        chunks: &mut Vec<Chunk>,
    ) {
        if pending.is_empty() {
            return;
        }
        let text = pending.join("\n\n");
        let token_count = if self.tokenizer.is_some() {
            *pending_size
        } else {
            text.chars().count()
        };
        chunks.push(make_chunk(
            &text,
            &document.doc_id,
            kb_id,
            section_id.as_deref(),
            token_count,
            ChunkStrategy::StructureAware,
        ));
        pending.clear();
        *pending_size = 0;
        *section_id = None;
    }
}

impl Splitter for StructureAwareSplitter {
    fn split(&self, document: &Document, kb_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut pending_size = 0usize;
        // Chunk attribution: the first section in the pending buffer.
        let mut pending_section_id: Option<String> = None;

        for section in &document.sections {
            let size = self.section_size(section);
            if size == 0 {
                continue;
            }

            if !pending.is_empty() && pending_size + size > self.max_chunk_size {
                self.flush(
                    &mut pending,
                    &mut pending_size,
                    &mut pending_section_id,
                    document,
                    kb_id,
                    &mut chunks,
                );
            }

            if pending.is_empty() {
                pending_section_id = Some(section.section_id.clone());
            }
            pending.push(format!("## {}\n\n{}", section.title, section.content));
            pending_size += size;
        }

        self.flush(
            &mut pending,
            &mut pending_size,
            &mut pending_section_id,
            document,
            kb_id,
            &mut chunks,
        );

        debug!(doc_id = %document.doc_id, chunks = chunks.len(), "structure-aware split complete");
        chunks
    }
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Constructor options forwarded by the factory.
#[derive(Clone, Default)]
pub struct SplitterOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Structure-aware flush boundary. Falls back to `chunk_size` when zero.
    pub max_chunk_size: usize,
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
}

/// Factory selecting a splitter by [`ChunkStrategy`].
pub struct SplitterFactory;

impl SplitterFactory {
    /// Create a splitter for `strategy`.
    ///
    /// # Errors
    /// Returns [`KbError::Config`] for strategies without an implementation
    /// ([`ChunkStrategy::Semantic`]) and for invalid size options. These are
    /// fatal configuration errors, never retried.
    pub fn create(strategy: ChunkStrategy, options: SplitterOptions) -> Result<Box<dyn Splitter>> {
        match strategy {
            ChunkStrategy::Window => Ok(Box::new(WindowSplitter::new(
                options.chunk_size,
                options.chunk_overlap,
                options.tokenizer,
            )?)),
            ChunkStrategy::StructureAware => {
                let max = if options.max_chunk_size > 0 {
                    options.max_chunk_size
                } else {
                    options.chunk_size
                };
                Ok(Box::new(StructureAwareSplitter::new(max, options.tokenizer)?))
            }
            ChunkStrategy::Semantic => Err(KbError::Config(format!(
                "unsupported chunk strategy: {}",
                strategy.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use std::collections::BTreeMap;

    fn doc_with_sections(sections: Vec<(&str, &str)>) -> Document {
        let sections = sections
            .into_iter()
            .enumerate()
            .map(|(i, (title, content))| Section {
                section_id: format!("doc-t-section-{i}"),
                title: title.to_string(),
                level: 1,
                content: content.to_string(),
                parent_id: None,
                content_type: ContentType::Text,
            })
            .collect();
        Document {
            kb_id: "kb-t".to_string(),
            doc_id: "doc-t".to_string(),
            title: "T".to_string(),
            original_source: String::new(),
            sections,
            metadata: BTreeMap::new(),
        }
    }

    // ── WindowSplitter ────────────────────────────────────────────────────────

    #[test]
    fn test_window_covers_input_with_exact_overlap() {
        // 250 chars with no delimiters at all.
        let text = "x".repeat(250);
        let doc = doc_with_sections(vec![("S", &text)]);
        let splitter = WindowSplitter::new(100, 20, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        // Windows: [0,100), [80,180), [160,250)
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content_text.len(), 100);
        assert_eq!(chunks[1].content_text.len(), 100);
        assert_eq!(chunks[2].content_text.len(), 90);

        // Consecutive chunks overlap by exactly 20 characters.
        for pair in chunks.windows(2) {
            let prev = &pair[0].content_text;
            let next = &pair[1].content_text;
            assert_eq!(&prev[prev.len() - 20..], &next[..20]);
        }
    }

    #[test]
    fn test_window_backs_off_to_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let doc = doc_with_sections(vec![("S", &text)]);
        let splitter = WindowSplitter::new(100, 10, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        // First window [0,100) contains the "\n\n" at 60; the cut lands there.
        assert_eq!(chunks[0].content_text, "a".repeat(60));
        assert!(chunks[1].content_text.ends_with(&"b".repeat(60)));
    }

    #[test]
    fn test_window_prefers_sentence_end_over_space() {
        let text = format!("{}. {}", "a".repeat(50), "b c d e f g h i j k l m n o p q r s t u v w");
        let doc = doc_with_sections(vec![("S", &text)]);
        let splitter = WindowSplitter::new(70, 5, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        // No "\n\n" or "\n" in the window, so ". " wins over " ".
        assert_eq!(chunks[0].content_text, format!("{}.", "a".repeat(50)));
    }

    #[test]
    fn test_window_short_input_single_chunk() {
        let doc = doc_with_sections(vec![("S", "short")]);
        let splitter = WindowSplitter::new(100, 20, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content_text, "short");
        assert_eq!(chunks[0].section_id.as_deref(), Some("doc-t-section-0"));
    }

    #[test]
    fn test_window_multibyte_never_panics() {
        let text = "你好世界。".repeat(30);
        let doc = doc_with_sections(vec![("S", &text)]);
        let splitter = WindowSplitter::new(40, 10, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");
        assert!(!chunks.is_empty());
        let rebuilt: usize = chunks.iter().map(|c| c.content_text.chars().count()).sum();
        assert!(rebuilt >= text.chars().count());
    }

    /// One token per character, so token windows are easy to assert on.
    struct CharTokenizer;

    impl Tokenizer for CharTokenizer {
        fn encode(&self, text: &str) -> Vec<u32> {
            text.chars().map(|c| c as u32).collect()
        }

        fn decode(&self, tokens: &[u32]) -> String {
            tokens.iter().filter_map(|&t| char::from_u32(t)).collect()
        }
    }

    #[test]
    fn test_window_token_mode_advances_by_end_minus_overlap() {
        // 25 tokens, window 10, overlap 2: [0,10), [8,18), [16,25).
        let text = "abcdefghijklmnopqrstuvwxy";
        let doc = doc_with_sections(vec![("S", text)]);
        let splitter = WindowSplitter::new(10, 2, Some(Arc::new(CharTokenizer))).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content_text, "abcdefghij");
        assert_eq!(chunks[1].content_text, "ijklmnopqr");
        assert_eq!(chunks[2].content_text, "qrstuvwxy");

        // token_count comes from the token slice, not character length.
        assert_eq!(chunks[0].token_count, 10);
        assert_eq!(chunks[1].token_count, 10);
        assert_eq!(chunks[2].token_count, 9);

        // Consecutive windows share exactly `chunk_overlap` tokens.
        for pair in chunks.windows(2) {
            let prev = &pair[0].content_text;
            let next = &pair[1].content_text;
            assert_eq!(&prev[prev.len() - 2..], &next[..2]);
        }
    }

    #[test]
    fn test_window_token_mode_short_input_single_chunk() {
        let doc = doc_with_sections(vec![("S", "abc")]);
        let splitter = WindowSplitter::new(10, 2, Some(Arc::new(CharTokenizer))).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content_text, "abc");
        assert_eq!(chunks[0].token_count, 3);
    }

    #[test]
    fn test_window_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            WindowSplitter::new(100, 100, None),
            Err(KbError::Config(_))
        ));
    }

    #[test]
    fn test_window_chunk_ids_are_content_hashes() {
        let doc = doc_with_sections(vec![("S", "identical content")]);
        let splitter = WindowSplitter::new(100, 20, None).unwrap();
        let a = splitter.split(&doc, "kb-t");
        let b = splitter.split(&doc, "kb-t");
        assert_eq!(a[0].chunk_id, b[0].chunk_id);
        assert!(a[0].chunk_id.starts_with("chunk-"));
    }

    // ── StructureAwareSplitter ────────────────────────────────────────────────

    #[test]
    fn test_structure_groups_sections_until_boundary() {
        let doc = doc_with_sections(vec![
            ("A", &"a".repeat(40)),
            ("B", &"b".repeat(40)),
            ("C", &"c".repeat(40)),
        ]);
        let splitter = StructureAwareSplitter::new(100, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        // A+B fit (80 <= 100); C would push to 120, so it flushes separately.
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content_text.contains("## A"));
        assert!(chunks[0].content_text.contains("## B"));
        assert!(chunks[1].content_text.contains("## C"));
        // Chunk is attributed to the first section it contains.
        assert_eq!(chunks[0].section_id.as_deref(), Some("doc-t-section-0"));
        assert_eq!(chunks[1].section_id.as_deref(), Some("doc-t-section-2"));
    }

    #[test]
    fn test_structure_keeps_oversized_section_intact() {
        let big = "x".repeat(500);
        let doc = doc_with_sections(vec![("Small", "tiny"), ("Big", &big), ("After", "tail")]);
        let splitter = StructureAwareSplitter::new(100, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");

        assert_eq!(chunks.len(), 3);
        // The oversized section is its own chunk, never cut.
        assert!(chunks[1].content_text.contains(&big));
    }

    #[test]
    fn test_structure_skips_empty_sections() {
        let doc = doc_with_sections(vec![("Empty", ""), ("Full", "content")]);
        let splitter = StructureAwareSplitter::new(100, None).unwrap();
        let chunks = splitter.split(&doc, "kb-t");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content_text.contains("## Full"));
    }

    // ── SplitterFactory ───────────────────────────────────────────────────────

    #[test]
    fn test_factory_selects_window() {
        let splitter = SplitterFactory::create(
            ChunkStrategy::Window,
            SplitterOptions { chunk_size: 100, chunk_overlap: 10, ..Default::default() },
        )
        .unwrap();
        let doc = doc_with_sections(vec![("S", "hello world")]);
        assert_eq!(splitter.split(&doc, "kb-t")[0].strategy, ChunkStrategy::Window);
    }

    #[test]
    fn test_factory_rejects_semantic() {
        let result = SplitterFactory::create(
            ChunkStrategy::Semantic,
            SplitterOptions { chunk_size: 100, ..Default::default() },
        );
        assert!(matches!(result, Err(KbError::Config(_))));
    }
}
