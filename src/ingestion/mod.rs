//! Ingestion: parsing raw markdown and cutting documents into chunks.

pub mod parser;
pub mod splitter;
pub mod tokenizer;

pub use parser::MarkdownParser;
pub use splitter::{Splitter, SplitterFactory, SplitterOptions, StructureAwareSplitter, WindowSplitter};
pub use tokenizer::{TiktokenTokenizer, Tokenizer};
