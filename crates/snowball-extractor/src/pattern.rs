//! Extraction patterns
//!
//! A pattern describes how a relation instance appears around its two
//! typed anchors: three context zones and the two anchor tags in sentence
//! order. Scored patterns carry the evidence collected while bootstrapping.

use std::ops::{Add, Div};

use serde::{Deserialize, Serialize};
use snowball_core::RelationTuple;

use crate::confidence::ewma;
use crate::context::ContextVector;

// ============================================================================
// Pattern
// ============================================================================

/// `(left, tag_one, middle, tag_two, right)` pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub left: ContextVector,
    pub tag_one: String,
    pub middle: ContextVector,
    pub tag_two: String,
    pub right: ContextVector,
}

impl Pattern {
    pub fn new(
        left: ContextVector,
        tag_one: impl Into<String>,
        middle: ContextVector,
        tag_two: impl Into<String>,
        right: ContextVector,
    ) -> Self {
        Self {
            left,
            tag_one: tag_one.into(),
            middle,
            tag_two: tag_two.into(),
            right,
        }
    }

    /// Both anchor tags match, in order
    pub fn matching_tags(&self, other: &Pattern) -> bool {
        self.tag_one == other.tag_one && self.tag_two == other.tag_two
    }

    /// Degree of match: sum of zone dot products, `0.0` for incompatible tags
    pub fn similarity(&self, other: &Pattern) -> f64 {
        if !self.matching_tags(other) {
            return 0.0;
        }

        self.left.dot(&other.left) + self.middle.dot(&other.middle) + self.right.dot(&other.right)
    }

    /// Element-wise average of tag-compatible patterns, `None` when empty
    pub fn average<'a, I>(patterns: I) -> Option<Pattern>
    where
        I: IntoIterator<Item = &'a Pattern>,
    {
        let mut iter = patterns.into_iter();
        let first = iter.next()?.clone();

        let (sum, count) = iter.fold((first, 1usize), |(acc, n), p| (&acc + p, n + 1));
        Some(&sum / count as f64)
    }
}

impl Add for &Pattern {
    type Output = Pattern;

    fn add(self, rhs: Self) -> Pattern {
        debug_assert!(
            self.matching_tags(rhs),
            "adding patterns with different tags: ({}, {}) + ({}, {})",
            self.tag_one,
            self.tag_two,
            rhs.tag_one,
            rhs.tag_two
        );

        Pattern {
            left: &self.left + &rhs.left,
            tag_one: self.tag_one.clone(),
            middle: &self.middle + &rhs.middle,
            tag_two: self.tag_two.clone(),
            right: &self.right + &rhs.right,
        }
    }
}

impl Div<f64> for &Pattern {
    type Output = Pattern;

    fn div(self, factor: f64) -> Pattern {
        Pattern {
            left: &self.left / factor,
            tag_one: self.tag_one.clone(),
            middle: &self.middle / factor,
            tag_two: self.tag_two.clone(),
            right: &self.right / factor,
        }
    }
}

// ============================================================================
// Raw Pattern
// ============================================================================

/// A pattern extracted from one sentence, with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPattern {
    #[serde(flatten)]
    pub pattern: Pattern,

    /// Source document
    pub document_id: u64,

    /// Sentence index within the document
    pub sentence_index: usize,
}

impl RawPattern {
    pub fn new(pattern: Pattern, document_id: u64, sentence_index: usize) -> Self {
        Self {
            pattern,
            document_id,
            sentence_index,
        }
    }
}

impl AsRef<Pattern> for RawPattern {
    fn as_ref(&self) -> &Pattern {
        &self.pattern
    }
}

// ============================================================================
// Scored Pattern
// ============================================================================

/// The average of a cluster of raw patterns plus its confidence evidence.
///
/// The support set is fixed at creation; only the evidence counters and the
/// smoothed confidence change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPattern {
    #[serde(flatten)]
    pattern: Pattern,

    support: Vec<RawPattern>,

    /// Positive evidence count
    pos: usize,

    /// Negative evidence count
    neg: usize,

    /// EWMA factor
    update_factor: f64,

    /// Smoothed confidence before the latest evidence update
    old_conf: f64,
}

impl ScoredPattern {
    /// Create from a cluster's members with `pos = |support|`, `neg = 0`.
    ///
    /// Returns `None` for an empty support set.
    pub fn new(support: Vec<RawPattern>, update_factor: f64) -> Option<Self> {
        let pos = support.len();
        Self::with_evidence(support, pos, 0, update_factor, 1.0)
    }

    /// Create with explicit evidence counters
    pub fn with_evidence(
        support: Vec<RawPattern>,
        pos: usize,
        neg: usize,
        update_factor: f64,
        old_conf: f64,
    ) -> Option<Self> {
        let pattern = Pattern::average(support.iter().map(|p| &p.pattern))?;

        Some(Self {
            pattern,
            support,
            pos,
            neg,
            update_factor,
            old_conf,
        })
    }

    /// The averaged pattern
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Cluster members this pattern was built from
    pub fn support(&self) -> &[RawPattern] {
        &self.support
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn neg(&self) -> usize {
        self.neg
    }

    pub fn update_factor(&self) -> f64 {
        self.update_factor
    }

    pub fn old_conf(&self) -> f64 {
        self.old_conf
    }

    /// Degree of match against another pattern
    pub fn similarity(&self, other: &Pattern) -> f64 {
        self.pattern.similarity(other)
    }

    /// `pos / (pos + neg)`
    pub fn raw_confidence(&self) -> f64 {
        let total = self.pos + self.neg;
        if total == 0 {
            return 0.0;
        }
        self.pos as f64 / total as f64
    }

    /// `raw_confidence * log2(pos)`; not bounded to `[0, 1]`
    pub fn adjusted_confidence(&self) -> f64 {
        if self.pos == 0 {
            return 0.0;
        }
        self.raw_confidence() * (self.pos as f64).log2()
    }

    /// Smoothed confidence blending the current evidence with `old_conf`
    pub fn confidence(&self) -> f64 {
        ewma(self.update_factor, self.adjusted_confidence(), self.old_conf)
    }

    /// Record evidence from a matched candidate.
    ///
    /// Every seed sharing the candidate's subject counts as positive evidence
    /// when it also shares the object and negative evidence otherwise. The
    /// confidence before this update becomes the new `old_conf`.
    pub fn update_confidence<'a, I>(&mut self, candidate: &RelationTuple, seeds: I)
    where
        I: IntoIterator<Item = &'a RelationTuple>,
    {
        self.old_conf = self.confidence();

        for seed in seeds {
            if seed.subject != candidate.subject {
                continue;
            }
            if seed.object == candidate.object {
                self.pos += 1;
            } else {
                self.neg += 1;
            }
        }
    }
}

impl AsRef<Pattern> for ScoredPattern {
    fn as_ref(&self) -> &Pattern {
        &self.pattern
    }
}

// ============================================================================
// Tests
// ============================================================================
