//! Quality Metrics module
//!
//! Scores extracted `(subject, object)` pairs against a gold pair list with
//! precision, recall and F1, optionally across confidence thresholds.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use snowball_core::{Result, SnowballError};

use crate::output::TupleRecord;

/// A bare `(subject, object)` pair
pub type Pair = (String, String);

// ============================================================================
// Pair Metrics
// ============================================================================

/// Confusion counts for pair extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMetrics {
    /// Extracted pairs found in the gold list
    pub true_positives: usize,
    /// Extracted pairs missing from the gold list
    pub false_positives: usize,
    /// Gold pairs that were not extracted
    pub false_negatives: usize,
}

impl PairMetrics {
    /// Calculate precision (TP / (TP + FP))
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Calculate recall (TP / (TP + FN))
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn predicted_total(&self) -> usize {
        self.true_positives + self.false_positives
    }

    pub fn gold_total(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    /// One-line summary
    pub fn report(&self) -> String {
        format!(
            "Precision: {:.1}% | Recall: {:.1}% | F1: {:.1}% | Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}",
            self.precision() * 100.0,
            self.recall() * 100.0,
            self.f1_score() * 100.0,
            self.gold_total(),
            self.predicted_total(),
            self.true_positives,
            self.false_positives,
            self.false_negatives,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Compare distinct extracted pairs against the gold set
pub fn evaluate_pairs<'a, I>(predicted: I, gold: &HashSet<Pair>) -> PairMetrics
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let predicted: HashSet<(&str, &str)> = predicted.into_iter().collect();
    let true_positives = predicted
        .iter()
        .filter(|(s, o)| gold.contains(&(s.to_string(), o.to_string())))
        .count();

    PairMetrics {
        true_positives,
        false_positives: predicted.len() - true_positives,
        false_negatives: gold.len() - true_positives,
    }
}

/// Metrics at one confidence threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub threshold: f64,
    pub metrics: PairMetrics,
}

/// Evaluate the tuples whose confidence is at least each threshold
pub fn threshold_sweep(
    records: &[TupleRecord],
    gold: &HashSet<Pair>,
    thresholds: &[f64],
) -> Vec<SweepPoint> {
    thresholds
        .iter()
        .map(|&threshold| {
            let kept = records
                .iter()
                .filter(|r| r.tuple.confidence() >= threshold)
                .map(|r| r.tuple.tuple.as_pair());
            SweepPoint {
                threshold,
                metrics: evaluate_pairs(kept, gold),
            }
        })
        .collect()
}

/// Read a gold file of `subject<TAB>object` lines
pub fn read_gold_pairs(path: impl AsRef<Path>) -> Result<HashSet<Pair>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SnowballError::io(path, e))?;
    parse_gold_pairs(&content, &path.display().to_string())
}

fn parse_gold_pairs(content: &str, source: &str) -> Result<HashSet<Pair>> {
    let mut pairs = HashSet::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once('\t') {
            Some((s, o)) if !s.trim().is_empty() && !o.trim().is_empty() => {
                pairs.insert((s.trim().to_string(), o.trim().to_string()));
            }
            _ => {
                return Err(SnowballError::SerializationError(format!(
                    "{source}:{}: expected `subject<TAB>object`",
                    n + 1
                )))
            }
        }
    }
    Ok(pairs)
}

// ============================================================================
// Tests
// ============================================================================
