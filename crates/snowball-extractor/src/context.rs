//! Context vectors
//!
//! A context vector is a weighted, L2-normalized bag of tokens describing
//! one zone (left, middle or right) of a pattern. Entries are kept in an
//! ordered map so that dot products always sum in the same order.

use std::collections::BTreeMap;
use std::ops::{Add, Div};

use serde::{Deserialize, Serialize};

/// Sparse token-weight vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextVector {
    /// Zone weight used at construction; `None` for derived vectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,

    /// Token -> weighted value
    values: BTreeMap<String, f64>,
}

impl ContextVector {
    /// Build a vector from a token sequence.
    ///
    /// Frequencies are normalized to unit L2 norm and then scaled by
    /// `weight`. An empty sequence yields the zero vector.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S], weight: f64) -> Self {
        let mut values: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokens {
            *values.entry(token.as_ref().to_string()).or_insert(0.0) += 1.0;
        }

        let norm = values.values().map(|c| c * c).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in values.values_mut() {
                *value = weight * (*value / norm);
            }
        }

        Self {
            weight: Some(weight),
            values,
        }
    }

    /// Wrap an already computed mapping without normalizing it
    pub fn from_map(values: BTreeMap<String, f64>) -> Self {
        Self {
            weight: None,
            values,
        }
    }

    /// Value for `token`, `0.0` when absent
    pub fn get(&self, token: &str) -> f64 {
        self.values.get(token).copied().unwrap_or(0.0)
    }

    /// Zone weight, if this vector was built from tokens
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Number of distinct tokens
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate entries in token order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Dot product over the shared tokens
    pub fn dot(&self, other: &ContextVector) -> f64 {
        self.values
            .iter()
            .filter_map(|(token, v)| other.values.get(token).map(|o| v * o))
            .sum()
    }

    /// L2 norm of the stored values
    pub fn norm(&self) -> f64 {
        self.values.values().map(|v| v * v).sum::<f64>().sqrt()
    }
}

impl Add for &ContextVector {
    type Output = ContextVector;

    fn add(self, rhs: Self) -> ContextVector {
        let mut values = self.values.clone();
        for (token, v) in &rhs.values {
            *values.entry(token.clone()).or_insert(0.0) += v;
        }
        ContextVector::from_map(values)
    }
}

impl Div<f64> for &ContextVector {
    type Output = ContextVector;

    fn div(self, factor: f64) -> ContextVector {
        let values = self
            .values
            .iter()
            .map(|(token, v)| (token.clone(), v / factor))
            .collect();
        ContextVector::from_map(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_from_tokens_counts_and_normalizes() {
        let ctx = ContextVector::from_tokens(&["a", "b", "a"], 1.0);
        let norm = 5f64.sqrt();

        assert!((ctx.get("a") - 2.0 / norm).abs() < EPS);
        assert!((ctx.get("b") - 1.0 / norm).abs() < EPS);
        assert_eq!(ctx.get("c"), 0.0);
        assert_eq!(ctx.weight(), Some(1.0));
    }

    #[test]
    fn test_weight_scales_entries() {
        let ctx = ContextVector::from_tokens(&["is", "located", "in"], 0.8);
        assert!((ctx.norm() - 0.8).abs() < EPS);
    }

    #[test]
    fn test_empty_tokens_give_zero_vector() {
        let ctx = ContextVector::from_tokens::<&str>(&[], 0.1);
        assert!(ctx.is_empty());
        assert_eq!(ctx.get("anything"), 0.0);
        assert_eq!(ctx.norm(), 0.0);
        assert_eq!(ctx.dot(&ContextVector::from_tokens(&["x"], 1.0)), 0.0);
    }

    #[test]
    fn test_add_is_abstract_and_pointwise() {
        let a = ContextVector::from_tokens(&["x"], 0.5);
        let b = ContextVector::from_tokens(&["x", "y"], 1.0);
        let sum = &a + &b;

        assert_eq!(sum.weight(), None);
        assert!((sum.get("x") - (0.5 + 1.0 / 2f64.sqrt())).abs() < EPS);
        assert!((sum.get("y") - 1.0 / 2f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_div_scales_raw_values() {
        let a = ContextVector::from_tokens(&["x"], 0.8);
        let half = &a / 2.0;
        assert!((half.get("x") - 0.4).abs() < EPS);
        assert_eq!(half.weight(), None);
    }

    #[test]
    fn test_dot_uses_shared_tokens() {
        let a = ContextVector::from_map(BTreeMap::from([("x".into(), 2.0), ("y".into(), 3.0)]));
        let b = ContextVector::from_map(BTreeMap::from([("y".into(), 4.0), ("z".into(), 5.0)]));
        assert_eq!(a.dot(&b), 12.0);
    }

    proptest! {
        #[test]
        fn prop_pre_weight_norm_is_one(tokens in proptest::collection::vec("[a-e]{1,3}", 1..20)) {
            let ctx = ContextVector::from_tokens(&tokens[..], 1.0);
            prop_assert!((ctx.norm() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_dot_is_symmetric(
            a in proptest::collection::vec("[a-d]", 0..10),
            b in proptest::collection::vec("[a-d]", 0..10),
            wa in 0.0f64..1.0,
            wb in 0.0f64..1.0,
        ) {
            let va = ContextVector::from_tokens(&a[..], wa);
            let vb = ContextVector::from_tokens(&b[..], wb);
            prop_assert_eq!(va.dot(&vb), vb.dot(&va));
        }
    }
}
