//! Candidate tuples
//!
//! A candidate is a relation tuple plus the confidence it earned from the
//! patterns that extracted it.

use serde::{Deserialize, Serialize};
use snowball_core::RelationTuple;

use crate::confidence::{ewma, noisy_or};
use crate::pattern::{RawPattern, ScoredPattern};

/// Relation tuple with a confidence score and its supporting raw patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTuple {
    #[serde(flatten)]
    pub tuple: RelationTuple,

    /// Current confidence
    conf: f64,

    /// EWMA factor for confidence propagation
    update_factor: f64,

    /// Raw patterns that extracted this tuple, in extraction order
    #[serde(default)]
    patterns: Vec<RawPattern>,
}

impl CandidateTuple {
    /// New candidate with confidence `1.0`
    pub fn new(tuple: RelationTuple, update_factor: f64) -> Self {
        Self::with_confidence(tuple, 1.0, update_factor)
    }

    pub fn with_confidence(tuple: RelationTuple, conf: f64, update_factor: f64) -> Self {
        Self {
            tuple,
            conf,
            update_factor,
            patterns: Vec::new(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.conf
    }

    pub fn update_factor(&self) -> f64 {
        self.update_factor
    }

    /// Supporting raw patterns
    pub fn patterns(&self) -> &[RawPattern] {
        &self.patterns
    }

    pub fn add_pattern(&mut self, pattern: RawPattern) {
        self.patterns.push(pattern);
    }

    pub fn add_patterns(&mut self, patterns: impl IntoIterator<Item = RawPattern>) {
        self.patterns.extend(patterns);
    }

    /// Propagate confidence from the matches collected in one extraction phase.
    ///
    /// Each `(similarity, pattern)` match contributes
    /// `similarity * pattern.confidence() / max_conf`; contributions are
    /// combined with noisy-OR and blended into the current confidence.
    /// Without matches the confidence is left untouched.
    pub fn update_confidence(&mut self, matches: &[(f64, &ScoredPattern)], max_conf: f64) {
        if matches.is_empty() {
            return;
        }

        let new_conf = noisy_or(matches.iter().map(|(similarity, pattern)| {
            if max_conf > 0.0 {
                similarity * (pattern.confidence() / max_conf)
            } else {
                0.0
            }
        }));

        self.conf = ewma(self.update_factor, new_conf, self.conf);
    }
}
