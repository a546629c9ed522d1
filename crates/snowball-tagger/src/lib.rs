//! Snowball Tagger - Turning raw documents into entity-tagged sentences
//!
//! Provides the tagging side of the pipeline:
//! - Scanning extracted dump files page by page
//! - Tokenizing text into sentences
//! - Labelling entities with a gazetteer and regex rules
//! - Collapsing labelled tokens into `<TAG>word_word</TAG>` markup
//!
//! Taggers implement the `EntityTagger` trait and produce `TaggedSentence`s
//! that become store records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use snowball_core::{Sentence, SnowballError};
use thiserror::Error;

pub mod collapse;
pub mod dump;
pub mod gazetteer;
pub mod tokenize;

pub use collapse::{collapse, OUTSIDE};
pub use dump::{Page, PageReader};
pub use gazetteer::GazetteerTagger;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while tagging documents
#[derive(Error, Debug)]
pub enum TaggerError {
    /// IO error while reading an input file
    #[error("IO error reading file: {path}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Gazetteer line could not be parsed
    #[error("Invalid gazetteer entry at line {line}: {reason}")]
    InvalidGazetteer { line: usize, reason: String },

    /// Regex rule failed to compile
    #[error("Invalid tagging rule: {0}")]
    InvalidRule(String),

    /// Dump page header could not be parsed
    #[error("Malformed dump page: {0}")]
    MalformedDump(String),

    /// Token and label sequences differ in length
    #[error("Label count {labels} does not match token count {tokens}")]
    LengthMismatch { tokens: usize, labels: usize },
}

pub type Result<T> = std::result::Result<T, TaggerError>;

impl From<TaggerError> for SnowballError {
    fn from(e: TaggerError) -> Self {
        SnowballError::TaggingError(e.to_string())
    }
}

// ============================================================================
// Tagged Sentence
// ============================================================================

/// Aligned surface and tagged tokens of one sentence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSentence {
    pub tokens: Vec<String>,
    pub tagged_tokens: Vec<String>,
}

impl TaggedSentence {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Store record for this sentence
    pub fn into_sentence(self, document_id: u64, index: usize) -> Sentence {
        Sentence::new(document_id, index, self.tokens, self.tagged_tokens)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for entity taggers
pub trait EntityTagger: Send + Sync {
    /// Split `text` into sentences and tag their entities
    fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>>;

    /// Get tagger name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_sentence_derives_entities() {
        let tagged = collapse(
            &["Barack", "Obama", "visited", "Kenya"],
            &["PERSON", "PERSON", "O", "LOCATION"],
        )
        .unwrap();
        let sentence = tagged.into_sentence(12, 3);

        assert_eq!(sentence.document_id, 12);
        assert_eq!(sentence.index, 3);
        assert_eq!(sentence.tokens, vec!["Barack_Obama", "visited", "Kenya"]);
        assert_eq!(sentence.entities, vec!["LOCATION", "PERSON"]);
    }

    #[test]
    fn test_tagger_error_converts() {
        let err: SnowballError = TaggerError::InvalidRule("(".to_string()).into();
        assert!(matches!(err, SnowballError::TaggingError(_)));
    }
}
