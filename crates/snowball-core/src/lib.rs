//! Snowball Core - Domain records, traits, and shared types
//!
//! This crate defines the abstractions shared by the Snowball workspace:
//! - Tagged sentences as produced by the tagging collaborator
//! - Relation tuples (the identity of a relation instance)
//! - The read-only sentence store interface consumed by the bootstrapping loop
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, IndexerConfig, LoggingConfig, OutputConfig, SnowballConfig,
    StoreBackend, StoreConfig,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Snowball operations
#[derive(Error, Debug)]
pub enum SnowballError {
    #[error("Sentence store error: {0}")]
    StoreError(String),

    #[error("Invalid seed file {path} (line {line}): {reason}")]
    InvalidSeedFile {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("IO error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Tagging error: {0}")]
    TaggingError(String),

    #[error("Invalid tag pattern: {0}")]
    PatternError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SnowballError {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SnowballError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnowballError>;

// ============================================================================
// Tagged token markup
// ============================================================================

/// Wrap an entity string in its tag markup: `<TAG>text</TAG>`
pub fn tag_token(tag: &str, text: &str) -> String {
    format!("<{tag}>{text}</{tag}>")
}

/// Split a tagged token into `(tag, text)`.
///
/// Returns `None` for plain tokens and for markup whose closing tag does not
/// match the opening one.
pub fn split_tagged(token: &str) -> Option<(&str, &str)> {
    let rest = token.strip_prefix('<')?;
    let close = rest.find('>')?;
    let tag = &rest[..close];
    if tag.is_empty() || tag.starts_with('/') {
        return None;
    }

    let text = rest[close + 1..].strip_suffix(&format!("</{tag}>"))?;
    Some((tag, text))
}

// ============================================================================
// Sentence
// ============================================================================

/// A tokenized, entity-tagged sentence.
///
/// `tagged_tokens` is aligned with `tokens`: contiguous named-entity spans are
/// collapsed into one entry in both sequences, joined by `_` in `tokens` and
/// wrapped as `<TAG>word_word</TAG>` in `tagged_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Source document (page) identifier
    #[serde(rename = "id")]
    pub document_id: u64,

    /// Position of the sentence within its document
    pub index: usize,

    /// Surface tokens
    pub tokens: Vec<String>,

    /// Tokens with entity markup
    pub tagged_tokens: Vec<String>,

    /// Distinct entity tags present in the sentence
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Sentence {
    /// Create a sentence, deriving its entity tag set from the tagged tokens
    pub fn new(
        document_id: u64,
        index: usize,
        tokens: Vec<String>,
        tagged_tokens: Vec<String>,
    ) -> Self {
        let mut entities: Vec<String> = tagged_tokens
            .iter()
            .filter_map(|t| split_tagged(t).map(|(tag, _)| tag.to_string()))
            .collect();
        entities.sort();
        entities.dedup();

        Self {
            document_id,
            index,
            tokens,
            tagged_tokens,
            entities,
        }
    }

    /// Store-wide identifier, `<document>_<index>`
    pub fn key(&self) -> String {
        format!("{}_{}", self.document_id, self.index)
    }

    /// Whether any tagged token equals `tagged` exactly
    pub fn contains_tagged(&self, tagged: &str) -> bool {
        self.tagged_tokens.iter().any(|t| t == tagged)
    }

    /// Whether the sentence has at least one entity tagged `tag`
    pub fn has_entity(&self, tag: &str) -> bool {
        self.tagged_tokens
            .iter()
            .any(|t| matches!(split_tagged(t), Some((found, _)) if found == tag))
    }

    /// Whether the sentence contains both anchors of `tuple`
    pub fn contains_tuple(&self, tuple: &RelationTuple) -> bool {
        self.contains_tagged(&tuple.subject_anchor()) && self.contains_tagged(&tuple.object_anchor())
    }
}

// ============================================================================
// Relation Tuple
// ============================================================================

/// Identity of a relation instance.
///
/// Equality and hashing cover all five fields, so a tuple can be used as a
/// deduplication key across a bootstrapping run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationTuple {
    /// Relation name (e.g., "capital_of")
    pub relation: String,

    /// Subject surface string, multi-word entities joined by `_`
    pub subject: String,

    /// Object surface string
    pub object: String,

    /// Entity tag of the subject
    pub subject_tag: String,

    /// Entity tag of the object
    pub object_tag: String,
}

impl RelationTuple {
    /// Create a new relation tuple
    pub fn new(
        relation: impl Into<String>,
        subject: impl Into<String>,
        object: impl Into<String>,
        subject_tag: impl Into<String>,
        object_tag: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            subject: subject.into(),
            object: object.into(),
            subject_tag: subject_tag.into(),
            object_tag: object_tag.into(),
        }
    }

    /// Tagged form of the subject, as it appears in `Sentence::tagged_tokens`
    pub fn subject_anchor(&self) -> String {
        tag_token(&self.subject_tag, &self.subject)
    }

    /// Tagged form of the object
    pub fn object_anchor(&self) -> String {
        tag_token(&self.object_tag, &self.object)
    }

    /// The bare `(subject, object)` pair
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.subject, &self.object)
    }
}

impl std::fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}:{}, {}:{})",
            self.relation, self.subject_tag, self.subject, self.object_tag, self.object
        )
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Read-only sentence index consumed by the bootstrapping loop.
///
/// Paginated queries must return records in a stable order so that offsets
/// address the same sentence across calls.
#[async_trait::async_trait]
pub trait SentenceStore: Send + Sync {
    /// Count sentences containing both tagged anchors of `tuple`
    async fn count_containing(&self, tuple: &RelationTuple) -> Result<usize>;

    /// Page through sentences containing both tagged anchors of `tuple`
    async fn sentences_containing(
        &self,
        tuple: &RelationTuple,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>>;

    /// Count sentences carrying both entity tags
    async fn count_with_tags(&self, subject_tag: &str, object_tag: &str) -> Result<usize>;

    /// Page through sentences carrying both entity tags
    async fn sentences_with_tags(
        &self,
        subject_tag: &str,
        object_tag: &str,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>>;

    /// Fetch the single tag-filtered sentence at `offset`, if any
    async fn sentence_with_tags_at(
        &self,
        subject_tag: &str,
        object_tag: &str,
        offset: usize,
    ) -> Result<Option<Sentence>> {
        let mut page = self
            .sentences_with_tags(subject_tag, object_tag, offset, 1)
            .await?;
        Ok(page.pop())
    }

    /// Get store name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
