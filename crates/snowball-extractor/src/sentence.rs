//! Sentence Extractor
//!
//! Turns tagged sentences into raw patterns (for a known tuple) or into
//! `(candidate, raw pattern)` pairs (for a relation's tag pair).

use regex::Regex;
use snowball_core::{RelationTuple, Result, Sentence, SnowballConfig, SnowballError};

use crate::context::ContextVector;
use crate::pattern::{Pattern, RawPattern};
use crate::tuple::CandidateTuple;

// ============================================================================
// Context Weights
// ============================================================================

/// Window size and zone weights used to build context vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextWeights {
    /// Maximum number of tokens in the left and right zones
    pub max_window: usize,
    pub left: f64,
    pub middle: f64,
    pub right: f64,
}

impl Default for ContextWeights {
    fn default() -> Self {
        Self::from(&SnowballConfig::default())
    }
}

impl From<&SnowballConfig> for ContextWeights {
    fn from(config: &SnowballConfig) -> Self {
        Self {
            max_window: config.max_window,
            left: config.left_weight,
            middle: config.middle_weight,
            right: config.right_weight,
        }
    }
}

// ============================================================================
// Tag Pair
// ============================================================================

/// Matchers for the `<TAG>...</TAG>` markup of a relation's two entity types
#[derive(Debug, Clone)]
pub struct TagPair {
    subject_tag: String,
    object_tag: String,
    subject_rgx: Regex,
    object_rgx: Regex,
}

impl TagPair {
    pub fn new(subject_tag: impl Into<String>, object_tag: impl Into<String>) -> Result<Self> {
        let subject_tag = subject_tag.into();
        let object_tag = object_tag.into();
        let subject_rgx = tag_regex(&subject_tag)?;
        let object_rgx = tag_regex(&object_tag)?;

        Ok(Self {
            subject_tag,
            object_tag,
            subject_rgx,
            object_rgx,
        })
    }

    pub fn subject_tag(&self) -> &str {
        &self.subject_tag
    }

    pub fn object_tag(&self) -> &str {
        &self.object_tag
    }

    pub fn matches_subject(&self, tagged: &str) -> bool {
        self.subject_rgx.is_match(tagged)
    }

    pub fn matches_object(&self, tagged: &str) -> bool {
        self.object_rgx.is_match(tagged)
    }
}

fn tag_regex(tag: &str) -> Result<Regex> {
    if tag.is_empty() {
        return Err(SnowballError::PatternError("empty entity tag".to_string()));
    }
    let tag = regex::escape(tag);
    Regex::new(&format!("^<{tag}>.*</{tag}>$"))
        .map_err(|e| SnowballError::PatternError(e.to_string()))
}

// ============================================================================
// Sentence Extractor
// ============================================================================

/// Builds patterns from the anchor positions of a sentence
#[derive(Debug, Clone, Default)]
pub struct SentenceExtractor {
    weights: ContextWeights,
}

impl SentenceExtractor {
    pub fn new(weights: ContextWeights) -> Self {
        Self { weights }
    }

    pub fn from_config(config: &SnowballConfig) -> Self {
        Self::new(ContextWeights::from(config))
    }

    pub fn weights(&self) -> &ContextWeights {
        &self.weights
    }

    /// Ordered position pairs `(i1, i2)`, `i1 != i2`, where `i1` holds the
    /// tuple's tagged subject and `i2` its tagged object
    pub fn anchor_pairs_by_tuple(
        &self,
        sentence: &Sentence,
        tuple: &RelationTuple,
    ) -> Vec<(usize, usize)> {
        let subject = tuple.subject_anchor();
        let object = tuple.object_anchor();

        anchor_pairs(sentence, |t| t == subject.as_str(), |t| t == object.as_str())
    }

    /// Ordered position pairs whose tagged tokens carry the subject and
    /// object entity types
    pub fn anchor_pairs_by_tags(&self, sentence: &Sentence, tags: &TagPair) -> Vec<(usize, usize)> {
        anchor_pairs(
            sentence,
            |t| tags.matches_subject(t),
            |t| tags.matches_object(t),
        )
    }

    /// One raw pattern per occurrence pair of the tuple's anchors
    pub fn raw_patterns(&self, sentence: &Sentence, tuple: &RelationTuple) -> Vec<RawPattern> {
        self.anchor_pairs_by_tuple(sentence, tuple)
            .into_iter()
            .map(|(i1, i2)| {
                self.raw_pattern(sentence, i1, i2, &tuple.subject_tag, &tuple.object_tag)
            })
            .collect()
    }

    /// One `(candidate, raw pattern)` per anchor pair matching the tag types.
    ///
    /// Candidates start with confidence `1.0`; subject and object are the
    /// surface tokens at the subject and object positions.
    pub fn candidates(
        &self,
        sentence: &Sentence,
        relation: &str,
        tags: &TagPair,
        update_factor: f64,
    ) -> Vec<(CandidateTuple, RawPattern)> {
        self.anchor_pairs_by_tags(sentence, tags)
            .into_iter()
            .map(|(i1, i2)| {
                let pattern =
                    self.raw_pattern(sentence, i1, i2, tags.subject_tag(), tags.object_tag());
                let tuple = RelationTuple::new(
                    relation,
                    sentence.tokens[i1].as_str(),
                    sentence.tokens[i2].as_str(),
                    tags.subject_tag(),
                    tags.object_tag(),
                );
                (CandidateTuple::new(tuple, update_factor), pattern)
            })
            .collect()
    }

    fn raw_pattern(
        &self,
        sentence: &Sentence,
        i1: usize,
        i2: usize,
        subject_tag: &str,
        object_tag: &str,
    ) -> RawPattern {
        let (i, j, tag_one, tag_two) = if i1 < i2 {
            (i1, i2, subject_tag, object_tag)
        } else {
            (i2, i1, object_tag, subject_tag)
        };

        let tokens = &sentence.tokens;
        let left = split_entities(&tokens[..i]);
        let middle = split_entities(&tokens[i + 1..j]);
        let right = split_entities(&tokens[j + 1..]);

        let window = self.weights.max_window;
        let left = &left[left.len().saturating_sub(window)..];
        let right = &right[..right.len().min(window)];

        let pattern = Pattern::new(
            ContextVector::from_tokens(left, self.weights.left),
            tag_one,
            ContextVector::from_tokens(&middle[..], self.weights.middle),
            tag_two,
            ContextVector::from_tokens(right, self.weights.right),
        );

        RawPattern::new(pattern, sentence.document_id, sentence.index)
    }
}

fn anchor_pairs<F, G>(sentence: &Sentence, is_subject: F, is_object: G) -> Vec<(usize, usize)>
where
    F: Fn(&str) -> bool,
    G: Fn(&str) -> bool,
{
    // positions past either sequence are ignored on misaligned records
    let tagged = &sentence.tagged_tokens;
    let len = tagged.len().min(sentence.tokens.len());
    let subjects: Vec<usize> = (0..len)
        .filter(|&i| is_subject(tagged[i].as_str()))
        .collect();
    let objects: Vec<usize> = (0..len)
        .filter(|&i| is_object(tagged[i].as_str()))
        .collect();

    let mut pairs = Vec::new();
    for &i1 in &subjects {
        for &i2 in &objects {
            if i1 != i2 {
                pairs.push((i1, i2));
            }
        }
    }
    pairs
}

/// Split underscore-joined entity tokens back into words
fn split_entities(tokens: &[String]) -> Vec<&str> {
    tokens
        .iter()
        .flat_map(|t| t.split('_'))
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn sentence(tokens: &[&str], tagged: &[&str]) -> Sentence {
        Sentence::new(
            3,
            1,
            tokens.iter().map(|s| s.to_string()).collect(),
            tagged.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn weights(max_window: usize) -> ContextWeights {
        ContextWeights {
            max_window,
            left: 0.1,
            middle: 0.8,
            right: 0.1,
        }
    }

    fn seed() -> RelationTuple {
        RelationTuple::new("located_in", "Paris", "France", "LOCATION", "COUNTRY")
    }

    #[test]
    fn test_tag_pair_matches_markup_only() {
        let tags = TagPair::new("LOCATION", "COUNTRY").unwrap();
        assert!(tags.matches_subject("<LOCATION>New_York</LOCATION>"));
        assert!(!tags.matches_subject("<COUNTRY>France</COUNTRY>"));
        assert!(!tags.matches_subject("LOCATION"));
        assert!(tags.matches_object("<COUNTRY>France</COUNTRY>"));
    }

    #[test]
    fn test_tag_pair_escapes_metacharacters() {
        let tags = TagPair::new("A.B", "C").unwrap();
        assert!(tags.matches_subject("<A.B>x</A.B>"));
        assert!(!tags.matches_subject("<AxB>x</AxB>"));
        assert!(TagPair::new("", "C").is_err());
    }

    #[test]
    fn test_raw_pattern_middle_only() {
        let s = sentence(
            &["Paris", "is", "located", "in", "France"],
            &[
                "<LOCATION>Paris</LOCATION>",
                "is",
                "located",
                "in",
                "<COUNTRY>France</COUNTRY>",
            ],
        );
        let extractor = SentenceExtractor::new(weights(2));
        let patterns = extractor.raw_patterns(&s, &seed());

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern.tag_one, "LOCATION");
        assert_eq!(p.pattern.tag_two, "COUNTRY");
        assert!(p.pattern.left.is_empty());
        assert!(p.pattern.right.is_empty());
        assert_eq!((p.document_id, p.sentence_index), (3, 1));
        assert!((p.pattern.similarity(&p.pattern) - 0.64).abs() < EPS);
    }

    #[test]
    fn test_reversed_anchor_order_swaps_tags() {
        let s = sentence(
            &["In", "France", ",", "Paris", "shines"],
            &[
                "In",
                "<COUNTRY>France</COUNTRY>",
                ",",
                "<LOCATION>Paris</LOCATION>",
                "shines",
            ],
        );
        let extractor = SentenceExtractor::new(weights(2));
        let patterns = extractor.raw_patterns(&s, &seed());

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0].pattern;
        assert_eq!(p.tag_one, "COUNTRY");
        assert_eq!(p.tag_two, "LOCATION");
        assert!(p.left.get("In") > 0.0);
        assert!(p.middle.get(",") > 0.0);
        assert!(p.right.get("shines") > 0.0);
    }

    #[test]
    fn test_windows_apply_after_splitting_entities() {
        let s = sentence(
            &["a", "b", "New_York_City", "Paris", "is", "in", "France", "the", "Big_Apple"],
            &[
                "a",
                "b",
                "<LOCATION>New_York_City</LOCATION>",
                "<LOCATION>Paris</LOCATION>",
                "is",
                "in",
                "<COUNTRY>France</COUNTRY>",
                "the",
                "<LOCATION>Big_Apple</LOCATION>",
            ],
        );
        let extractor = SentenceExtractor::new(weights(2));
        let p = &extractor.raw_patterns(&s, &seed())[0].pattern;

        // last two words of the left zone
        assert_eq!(p.left.len(), 2);
        assert!(p.left.get("York") > 0.0);
        assert!(p.left.get("City") > 0.0);
        assert_eq!(p.left.get("b"), 0.0);

        // first two words of the right zone
        assert_eq!(p.right.len(), 2);
        assert!(p.right.get("the") > 0.0);
        assert!(p.right.get("Big") > 0.0);
        assert_eq!(p.right.get("Apple"), 0.0);
    }

    #[test]
    fn test_repeated_anchors_yield_every_pair() {
        let s = sentence(
            &["Paris", "France", "Paris"],
            &[
                "<LOCATION>Paris</LOCATION>",
                "<COUNTRY>France</COUNTRY>",
                "<LOCATION>Paris</LOCATION>",
            ],
        );
        let extractor = SentenceExtractor::default();

        assert_eq!(extractor.anchor_pairs_by_tuple(&s, &seed()), vec![(0, 1), (2, 1)]);
        assert_eq!(extractor.raw_patterns(&s, &seed()).len(), 2);
    }

    #[test]
    fn test_same_tag_never_pairs_a_position_with_itself() {
        let s = sentence(
            &["Alice", "met", "Bob"],
            &["<PERSON>Alice</PERSON>", "met", "<PERSON>Bob</PERSON>"],
        );
        let tags = TagPair::new("PERSON", "PERSON").unwrap();
        let extractor = SentenceExtractor::default();

        assert_eq!(extractor.anchor_pairs_by_tags(&s, &tags), vec![(0, 2), (2, 0)]);
    }

    #[test]
    fn test_candidates_use_surface_tokens_in_original_order() {
        let s = sentence(
            &["Spain", "'s", "capital", "Madrid"],
            &[
                "<COUNTRY>Spain</COUNTRY>",
                "'s",
                "capital",
                "<LOCATION>Madrid</LOCATION>",
            ],
        );
        let tags = TagPair::new("LOCATION", "COUNTRY").unwrap();
        let extractor = SentenceExtractor::default();
        let found = extractor.candidates(&s, "capital_of", &tags, 0.5);

        assert_eq!(found.len(), 1);
        let (candidate, raw) = &found[0];
        assert_eq!(candidate.tuple.subject, "Madrid");
        assert_eq!(candidate.tuple.object, "Spain");
        assert_eq!(candidate.tuple.subject_tag, "LOCATION");
        assert_eq!(candidate.confidence(), 1.0);
        assert_eq!(raw.pattern.tag_one, "COUNTRY");
        assert_eq!(raw.pattern.tag_two, "LOCATION");
    }

    #[test]
    fn test_no_anchors_no_output() {
        let s = sentence(&["nothing", "here"], &["nothing", "here"]);
        let tags = TagPair::new("LOCATION", "COUNTRY").unwrap();
        let extractor = SentenceExtractor::default();

        assert!(extractor.raw_patterns(&s, &seed()).is_empty());
        assert!(extractor.candidates(&s, "r", &tags, 0.5).is_empty());
    }
}
