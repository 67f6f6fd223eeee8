//! Tokenizer abstraction for token-based chunk sizing.
//!
//! The window splitter can operate over token indices instead of characters
//! when a tokenizer is supplied; chunk sizes then mean tokens, which is what
//! embedding and extraction backends actually bill and truncate on.

use std::sync::Arc;

use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::errors::{KbError, Result};

/// Encode/decode contract used by splitters.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    ///
    /// Decoding a slice that starts or ends mid-character may produce
    /// replacement characters; splitters only decode contiguous runs of ids
    /// they previously encoded.
    fn decode(&self, tokens: &[u32]) -> String;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE tokenizer backed by tiktoken's `cl100k_base` vocabulary.
#[derive(Clone)]
pub struct TiktokenTokenizer {
    bpe: Arc<CoreBPE>,
}

impl TiktokenTokenizer {
    /// Build a `cl100k_base` tokenizer (the vocabulary used by the OpenAI
    /// embedding models this crate targets).
    pub fn cl100k() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| KbError::Config(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        // Contiguous runs of previously encoded ids always decode cleanly;
        // a mid-character cut degrades to empty rather than failing the split.
        self.bpe.decode(tokens.to_vec()).unwrap_or_default()
    }
}
