//! Splitting documents into chunks before they are embedded.
//!
//! Character splitters measure length in chars. Token splitters count
//! tokens of a Hugging Face tokenizer fetched from the hub on first use.

use std::ops::Range;

use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::rchain::documents::Document;

#[derive(Debug, Error)]
pub enum SplitterError {
    #[error("Got a larger chunk overlap ({chunk_overlap}) than chunk size ({chunk_size}), should be smaller.")]
    InvalidOverlap {
        chunk_size: usize,
        chunk_overlap: usize,
    },
    #[error("failed to load tokenizer '{model}': {reason}")]
    TokenizerLoad { model: String, reason: String },
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

pub trait TextSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError>;

    /// Splits each document, copying its metadata onto every chunk.
    fn split_documents(&self, documents: &[Document]) -> Result<Vec<Document>, SplitterError> {
        let mut chunks = Vec::new();
        for document in documents {
            for text in self.split_text(&document.page_content)? {
                chunks.push(Document {
                    page_content: text,
                    metadata: document.metadata.clone(),
                });
            }
        }
        debug!(documents = documents.len(), chunks = chunks.len(), "split documents");
        Ok(chunks)
    }
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<(), SplitterError> {
    if chunk_overlap >= chunk_size {
        return Err(SplitterError::InvalidOverlap {
            chunk_size,
            chunk_overlap,
        });
    }
    Ok(())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_pieces(pieces: &[&str], separator: &str) -> Option<String> {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Greedily packs `splits` into chunks of at most `chunk_size` chars,
/// carrying up to `chunk_overlap` chars of trailing pieces into the next chunk.
pub fn merge_splits(
    splits: &[&str],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut total = 0;

    for &split in splits {
        let len = char_len(split);
        let joiner = if current.is_empty() { 0 } else { separator_len };
        if total + len + joiner > chunk_size {
            if total > chunk_size {
                warn!(
                    size = total,
                    chunk_size, "Created a chunk which is longer than the specified size"
                );
            }
            if !current.is_empty() {
                if let Some(chunk) = join_pieces(&current, separator) {
                    chunks.push(chunk);
                }
                while total > chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len }
                            > chunk_size)
                {
                    let dropped = char_len(current[0])
                        + if current.len() > 1 { separator_len } else { 0 };
                    total -= dropped;
                    current.remove(0);
                }
            }
        }
        current.push(split);
        total += len + if current.len() > 1 { separator_len } else { 0 };
    }

    if let Some(chunk) = join_pieces(&current, separator) {
        chunks.push(chunk);
    }
    chunks
}

/// Splits on one separator, then merges pieces back up to the chunk size.
#[derive(Debug, Clone)]
pub struct CharacterTextSplitter {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self {
            separator: "\n\n".to_string(),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl TextSplitter for CharacterTextSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
        let splits: Vec<&str> = if self.separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(self.separator.as_str())
                .filter(|piece| !piece.is_empty())
                .collect()
        };
        Ok(merge_splits(
            &splits,
            &self.separator,
            self.chunk_size,
            self.chunk_overlap,
        ))
    }
}

/// Tries each separator in turn, recursing into pieces that are still too long.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self {
            separators: ["\n\n", "\n", " ", ""].map(String::from).to_vec(),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn separators<S: Into<String>>(mut self, separators: impl IntoIterator<Item = S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (index, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[index + 1..];
                break;
            }
        }

        let splits = split_keeping_separator(text, separator);
        let mut good: Vec<&str> = Vec::new();
        for split in splits {
            if char_len(split) < self.chunk_size {
                good.push(split);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(merge_splits(&good, "", self.chunk_size, self.chunk_overlap));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(split.to_string());
            } else {
                chunks.extend(self.split_recursive(split, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(merge_splits(&good, "", self.chunk_size, self.chunk_overlap));
        }
        chunks
    }
}

/// Splits before every occurrence of `separator`, keeping it at the start of
/// the following piece. An empty separator yields single chars.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut starts = text
        .match_indices(separator)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    starts.insert(0, 0);
    starts.push(text.len());
    starts
        .windows(2)
        .map(|bounds| &text[bounds[0]..bounds[1]])
        .filter(|piece| !piece.is_empty())
        .collect()
}

impl TextSplitter for RecursiveCharacterTextSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
        Ok(self.split_recursive(text, &self.separators))
    }
}

/// Token ranges of `chunk_size` tokens advancing by `chunk_size - chunk_overlap`.
pub fn token_windows(len: usize, chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + chunk_size).min(len);
        windows.push(start..end);
        if end == len {
            break;
        }
        start += step;
    }
    windows
}

fn load_tokenizer(model: &str) -> Result<Tokenizer, SplitterError> {
    debug!(model, "loading tokenizer");
    Tokenizer::from_pretrained(model, None).map_err(|err| SplitterError::TokenizerLoad {
        model: model.to_string(),
        reason: err.to_string(),
    })
}

fn split_on_tokens(
    tokenizer: &Tokenizer,
    ids: &[u32],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, SplitterError> {
    token_windows(ids.len(), chunk_size, chunk_overlap)
        .into_iter()
        .map(|window| {
            tokenizer
                .decode(&ids[window], true)
                .map_err(|err| SplitterError::Tokenizer(err.to_string()))
        })
        .collect()
}

/// Splits on token counts of a Hugging Face tokenizer (`gpt2` unless set).
#[derive(Debug, Clone)]
pub struct TokenTextSplitter {
    tokenizer: Tokenizer,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenTextSplitter {
    pub const DEFAULT_MODEL: &'static str = "gpt2";

    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        Self::with_model(Self::DEFAULT_MODEL, chunk_size, chunk_overlap)
    }

    pub fn with_model(
        model: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, SplitterError> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self {
            tokenizer: load_tokenizer(model)?,
            chunk_size,
            chunk_overlap,
        })
    }
}

impl TextSplitter for TokenTextSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|err| SplitterError::Tokenizer(err.to_string()))?;
        split_on_tokens(
            &self.tokenizer,
            encoding.get_ids(),
            self.chunk_size,
            self.chunk_overlap,
        )
    }
}

/// Token windows sized for a sentence-transformers embedding model.
#[derive(Debug, Clone)]
pub struct SentenceTransformersTokenTextSplitter {
    tokenizer: Tokenizer,
    tokens_per_chunk: usize,
    chunk_overlap: usize,
}

impl SentenceTransformersTokenTextSplitter {
    pub const DEFAULT_MODEL: &'static str = "sentence-transformers/all-mpnet-base-v2";
    /// Maximum sequence length of the default model.
    pub const DEFAULT_TOKENS_PER_CHUNK: usize = 384;
    pub const DEFAULT_OVERLAP: usize = 50;

    pub fn new() -> Result<Self, SplitterError> {
        Self::with_model(
            Self::DEFAULT_MODEL,
            Self::DEFAULT_TOKENS_PER_CHUNK,
            Self::DEFAULT_OVERLAP,
        )
    }

    pub fn with_model(
        model: &str,
        tokens_per_chunk: usize,
        chunk_overlap: usize,
    ) -> Result<Self, SplitterError> {
        check_sizes(tokens_per_chunk, chunk_overlap)?;
        Ok(Self {
            tokenizer: load_tokenizer(model)?,
            tokens_per_chunk,
            chunk_overlap,
        })
    }
}

impl TextSplitter for SentenceTransformersTokenTextSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|err| SplitterError::Tokenizer(err.to_string()))?;
        // Drop the start and end markers added by the tokenizer.
        let ids = encoding.get_ids();
        let inner = if ids.len() >= 2 { &ids[1..ids.len() - 1] } else { &[][..] };
        split_on_tokens(
            &self.tokenizer,
            inner,
            self.tokens_per_chunk,
            self.chunk_overlap,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = CharacterTextSplitter::new(100, 100).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Got a larger chunk overlap (100) than chunk size (100), should be smaller."
        );
        assert!(RecursiveCharacterTextSplitter::new(10, 20).is_err());
    }

    #[test]
    fn character_splitter_packs_paragraphs() {
        let splitter = CharacterTextSplitter::new(12, 0).unwrap();
        let chunks = splitter.split_text("one two\n\nthree\n\nfour five six").unwrap();
        assert_eq!(chunks, vec!["one two", "three", "four five six"]);
    }

    #[test]
    fn character_splitter_merges_small_pieces() {
        let splitter = CharacterTextSplitter::new(7, 0).unwrap().separator(" ");
        let chunks = splitter.split_text("a b c d e f g").unwrap();
        assert_eq!(chunks, vec!["a b c d", "e f g"]);
    }

    #[test]
    fn merge_carries_overlap() {
        let chunks = merge_splits(&["aaa", "bbb", "ccc", "ddd"], " ", 7, 3);
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn merge_keeps_oversized_piece_whole() {
        let chunks = merge_splits(&["tiny", "enormous-piece", "end"], " ", 8, 0);
        assert_eq!(chunks, vec!["tiny", "enormous-piece", "end"]);
    }

    #[test]
    fn recursive_splitter_falls_back_to_finer_separators() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 0).unwrap();
        let chunks = splitter
            .split_text("Romeo loves Juliet\n\nThe end")
            .unwrap();
        assert_eq!(chunks, vec!["Romeo", "loves", "Juliet", "The end"]);
    }

    #[test]
    fn separator_stays_with_following_piece() {
        assert_eq!(
            split_keeping_separator("a b c", " "),
            vec!["a", " b", " c"]
        );
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }

    #[test]
    fn token_windows_step_by_size_minus_overlap() {
        assert_eq!(token_windows(10, 4, 1), vec![0..4, 3..7, 6..10]);
        assert_eq!(token_windows(3, 512, 0), vec![0..3]);
        assert!(token_windows(0, 4, 0).is_empty());
    }

    struct ParagraphSplitter;

    impl TextSplitter for ParagraphSplitter {
        fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
            Ok(text.split("\n\n").map(str::to_string).collect())
        }
    }

    #[test]
    fn split_documents_copies_metadata() {
        let document = Document::new("Act I\n\nAct II").with_metadata("source", "romeo_and_juliet.txt");
        let chunks = ParagraphSplitter.split_documents(&[document]).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.source() == Some("romeo_and_juliet.txt")));
        assert_eq!(chunks[1].page_content, "Act II");
    }
}
