//! Bootstrapping Loop
//!
//! Alternates pattern extraction (seeds -> clustered patterns) and tuple
//! extraction (patterns -> new seeds) for a fixed number of iterations,
//! stopping early when either phase comes back empty.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snowball_core::{RelationTuple, Result, SentenceStore, SnowballConfig};
use tracing::{debug, error, info, warn};

use crate::cluster::{scored_patterns, SinglePassClusterer};
use crate::output::{OutputSink, PatternStage, TupleRecord};
use crate::pattern::{RawPattern, ScoredPattern};
use crate::seed::SeedSet;
use crate::sentence::{SentenceExtractor, TagPair};
use crate::tuple::CandidateTuple;

// ============================================================================
// Outcome
// ============================================================================

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// Ran every configured iteration
    Completed,
    /// Pattern extraction produced no scored pattern
    NoNewPatterns { iteration: usize },
    /// No candidate reached the tuple confidence threshold
    NoNewSeeds { iteration: usize },
}

/// Everything a run accumulated
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub termination: Termination,
    /// Scored patterns from every iteration, with their final counters
    pub patterns: Vec<ScoredPattern>,
    /// Initial seeds plus every promoted tuple, one record per identity
    pub tuples: Vec<TupleRecord>,
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Default)]
struct RunState {
    seeds: Vec<CandidateTuple>,
    patterns: Vec<ScoredPattern>,
    /// Iteration that created each entry of `patterns`
    pattern_iterations: Vec<usize>,
    tuples: Vec<TupleRecord>,
    tuple_index: HashMap<RelationTuple, usize>,
}

impl RunState {
    fn record_tuples(&mut self, iteration: usize, tuples: &[CandidateTuple]) {
        for tuple in tuples {
            let record = TupleRecord {
                iteration,
                tuple: tuple.clone(),
            };
            match self.tuple_index.entry(tuple.tuple.clone()) {
                Entry::Occupied(slot) => self.tuples[*slot.get()] = record,
                Entry::Vacant(slot) => {
                    slot.insert(self.tuples.len());
                    self.tuples.push(record);
                }
            }
        }
    }

    fn persist(&self, sink: &mut dyn OutputSink) -> Result<()> {
        let mut start = 0;
        while start < self.patterns.len() {
            let iteration = self.pattern_iterations[start];
            let end = self.pattern_iterations[start..]
                .iter()
                .position(|&it| it != iteration)
                .map_or(self.patterns.len(), |n| start + n);
            sink.write_patterns(iteration, PatternStage::Final, &self.patterns[start..end])?;
            start = end;
        }

        sink.write_tuples(&self.tuples)
    }
}

/// Matches and raw patterns gathered for one candidate during a phase
struct Accumulated {
    candidate: CandidateTuple,
    matches: Vec<(f64, usize)>,
    raw_patterns: Vec<RawPattern>,
}

// ============================================================================
// Bootstrapper
// ============================================================================

/// Drives the Snowball loop over a sentence store
pub struct Bootstrapper {
    store: Arc<dyn SentenceStore>,
    config: SnowballConfig,
    page_size: usize,
    extractor: SentenceExtractor,
    clusterer: SinglePassClusterer,
}

impl Bootstrapper {
    pub fn new(store: Arc<dyn SentenceStore>, config: SnowballConfig) -> Self {
        let extractor = SentenceExtractor::from_config(&config);
        let clusterer = SinglePassClusterer::new(config.min_pattern_similarity);

        Self {
            store,
            config,
            page_size: 100,
            extractor,
            clusterer,
        }
    }

    /// Page size used when reading every sentence of a seed
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn config(&self) -> &SnowballConfig {
        &self.config
    }

    /// Number of tag-filtered sentences scanned in each iteration.
    ///
    /// The cap is split evenly; the last iteration also takes the remainder.
    pub fn sentence_budget(&self) -> Vec<usize> {
        let iterations = self.config.iterations;
        if iterations == 0 {
            return Vec::new();
        }

        let per_iteration = self.config.sentence_cap / iterations;
        let mut budget = vec![per_iteration; iterations];
        if let Some(last) = budget.last_mut() {
            *last += self.config.sentence_cap % iterations;
        }
        budget
    }

    /// Run the loop from `seeds`, writing logs to `sink`.
    ///
    /// Whatever was accumulated is persisted on every exit path, including
    /// store failures, before the outcome or the error is returned.
    pub async fn run(&self, seeds: &SeedSet, sink: &mut dyn OutputSink) -> Result<BootstrapOutcome> {
        info!(
            "Relation: {}, subject tag: {}, object tag: {}",
            seeds.relation, seeds.subject_tag, seeds.object_tag
        );
        info!("Seeds: {:?}", seeds.pairs);
        info!("Using sentence store: {}", self.store.name());

        let tags = TagPair::new(seeds.subject_tag.as_str(), seeds.object_tag.as_str())?;

        let mut state = RunState {
            seeds: seeds.tuples(self.config.tuple_update_factor),
            ..RunState::default()
        };
        let initial = state.seeds.clone();
        state.record_tuples(0, &initial);

        let result = self.iterate(seeds, &tags, &mut state, sink).await;

        info!(
            "Writing {} patterns and {} tuples",
            state.patterns.len(),
            state.tuples.len()
        );
        let persisted = state.persist(sink);

        let termination = match (result, persisted) {
            (Ok(termination), Ok(())) => termination,
            (Err(e), persisted) => {
                if let Err(write_err) = persisted {
                    error!("Failed to persist results after run error: {}", write_err);
                }
                return Err(e);
            }
            (Ok(_), Err(e)) => return Err(e),
        };

        Ok(BootstrapOutcome {
            termination,
            patterns: state.patterns,
            tuples: state.tuples,
        })
    }

    async fn iterate(
        &self,
        seeds: &SeedSet,
        tags: &TagPair,
        state: &mut RunState,
        sink: &mut dyn OutputSink,
    ) -> Result<Termination> {
        let budget = self.sentence_budget();
        let per_iteration = budget.first().copied().unwrap_or(0);

        for (idx, &count) in budget.iter().enumerate() {
            let iteration = idx + 1;
            info!("Beginning iteration {}", iteration);

            // Pattern extraction
            info!("PATTERN EXTRACTION PHASE");
            let new_patterns = self.extract_patterns(&state.seeds).await?;
            if new_patterns.is_empty() {
                info!("No new patterns. Exiting early on iteration {}", iteration);
                return Ok(Termination::NoNewPatterns { iteration });
            }

            sink.write_patterns(iteration, PatternStage::Discovered, &new_patterns)?;
            state
                .pattern_iterations
                .extend(std::iter::repeat(iteration).take(new_patterns.len()));
            state.patterns.extend(new_patterns);
            info!("Total number of patterns: {}", state.patterns.len());

            // Tuple extraction
            info!("TUPLE EXTRACTION PHASE");
            let offset = idx * per_iteration;
            let candidates = self
                .extract_tuples(seeds, tags, state, offset, count)
                .await?;
            info!("Number of candidate tuples: {}", candidates.len());

            let new_seeds: Vec<CandidateTuple> = candidates
                .into_iter()
                .filter(|c| c.confidence() >= self.config.min_tuple_confidence)
                .collect();
            if new_seeds.is_empty() {
                info!("No new seeds. Exiting early on iteration {}", iteration);
                return Ok(Termination::NoNewSeeds { iteration });
            }

            state.record_tuples(iteration, &new_seeds);
            info!("Number of seed tuples: {}", new_seeds.len());
            info!("Total tuples so far: {}", state.tuples.len());

            state.seeds = new_seeds;
            info!("Ending iteration {}", iteration);
        }

        Ok(Termination::Completed)
    }

    /// Raw patterns from every sentence containing a seed, clustered
    async fn extract_patterns(&self, seeds: &[CandidateTuple]) -> Result<Vec<ScoredPattern>> {
        let mut raw_patterns = Vec::new();

        for seed in seeds {
            let tuple = &seed.tuple;
            let count = self.store.count_containing(tuple).await?;
            debug!("{} sentences contain {}", count, tuple);

            let mut from = 0;
            while from < count {
                let page = self
                    .store
                    .sentences_containing(tuple, from, self.page_size)
                    .await?;
                if page.is_empty() {
                    break;
                }
                from += page.len();

                for sentence in &page {
                    raw_patterns.extend(self.extractor.raw_patterns(sentence, tuple));
                }
            }
        }
        info!("Number of raw patterns: {}", raw_patterns.len());

        let clusters = self.clusterer.cluster(raw_patterns);
        Ok(scored_patterns(
            clusters,
            self.config.min_pattern_support,
            self.config.pattern_update_factor,
        ))
    }

    /// Scan `count` tag-filtered sentences from `offset`, one at a time,
    /// and return the deduplicated candidates with propagated confidence
    async fn extract_tuples(
        &self,
        seeds: &SeedSet,
        tags: &TagPair,
        state: &mut RunState,
        offset: usize,
        count: usize,
    ) -> Result<Vec<CandidateTuple>> {
        let threshold = self.config.min_pattern_similarity;
        let mut accumulated: Vec<Accumulated> = Vec::new();
        let mut by_tuple: HashMap<RelationTuple, usize> = HashMap::new();

        for j in 0..count {
            let at = offset + j;
            let Some(sentence) = self
                .store
                .sentence_with_tags_at(tags.subject_tag(), tags.object_tag(), at)
                .await?
            else {
                warn!("Sentence store exhausted at offset {}", at);
                break;
            };

            let found = self.extractor.candidates(
                &sentence,
                &seeds.relation,
                tags,
                self.config.tuple_update_factor,
            );

            for (candidate, raw_pattern) in found {
                let mut matches = Vec::new();
                let mut best: Option<(usize, f64)> = None;

                for (p, pattern) in state.patterns.iter_mut().enumerate() {
                    if !pattern.pattern().matching_tags(&raw_pattern.pattern) {
                        continue;
                    }
                    let similarity = pattern.similarity(&raw_pattern.pattern);
                    if similarity < threshold {
                        continue;
                    }

                    let current_seeds = state.seeds.iter().map(|s| &s.tuple);
                    pattern.update_confidence(&candidate.tuple, current_seeds);
                    matches.push((similarity, p));
                    if best.map_or(true, |(_, top)| similarity > top) {
                        best = Some((p, similarity));
                    }
                }

                let Some((best_pattern, best_similarity)) = best else {
                    continue;
                };
                debug!(
                    "{} matched {} patterns (best #{} at {:.3})",
                    candidate.tuple,
                    matches.len(),
                    best_pattern,
                    best_similarity
                );

                let slot = match by_tuple.entry(candidate.tuple.clone()) {
                    Entry::Occupied(slot) => *slot.get(),
                    Entry::Vacant(slot) => {
                        slot.insert(accumulated.len());
                        accumulated.push(Accumulated {
                            candidate,
                            matches: Vec::new(),
                            raw_patterns: Vec::new(),
                        });
                        accumulated.len() - 1
                    }
                };
                accumulated[slot].matches.extend(matches);
                accumulated[slot].raw_patterns.push(raw_pattern);
            }
        }

        let max_conf = state
            .patterns
            .iter()
            .map(ScoredPattern::confidence)
            .fold(f64::NEG_INFINITY, f64::max);

        let candidates = accumulated
            .into_iter()
            .map(|acc| {
                let matches: Vec<(f64, &ScoredPattern)> = acc
                    .matches
                    .iter()
                    .map(|&(similarity, p)| (similarity, &state.patterns[p]))
                    .collect();

                let mut candidate = acc.candidate;
                candidate.update_confidence(&matches, max_conf);
                candidate.add_patterns(acc.raw_patterns);
                candidate
            })
            .collect();

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowball_core::Sentence;

    struct EmptyStore;

    #[async_trait::async_trait]
    impl SentenceStore for EmptyStore {
        async fn count_containing(&self, _tuple: &RelationTuple) -> Result<usize> {
            Ok(0)
        }

        async fn sentences_containing(
            &self,
            _tuple: &RelationTuple,
            _from: usize,
            _size: usize,
        ) -> Result<Vec<Sentence>> {
            Ok(Vec::new())
        }

        async fn count_with_tags(&self, _subject_tag: &str, _object_tag: &str) -> Result<usize> {
            Ok(0)
        }

        async fn sentences_with_tags(
            &self,
            _subject_tag: &str,
            _object_tag: &str,
            _from: usize,
            _size: usize,
        ) -> Result<Vec<Sentence>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    fn bootstrapper(sentence_cap: usize, iterations: usize) -> Bootstrapper {
        let config = SnowballConfig {
            sentence_cap,
            iterations,
            ..SnowballConfig::default()
        };
        Bootstrapper::new(Arc::new(EmptyStore), config)
    }

    #[test]
    fn test_sentence_budget_absorbs_remainder() {
        assert_eq!(bootstrapper(10, 3).sentence_budget(), vec![3, 3, 4]);
        assert_eq!(bootstrapper(9, 3).sentence_budget(), vec![3, 3, 3]);
        assert_eq!(bootstrapper(2, 3).sentence_budget(), vec![0, 0, 2]);
        assert!(bootstrapper(10, 0).sentence_budget().is_empty());
    }

    #[test]
    fn test_sentence_budget_totals_cap() {
        for (cap, iterations) in [(10_000, 10), (7, 2), (1, 1), (13, 5)] {
            let total: usize = bootstrapper(cap, iterations).sentence_budget().iter().sum();
            assert_eq!(total, cap);
        }
    }

    #[test]
    fn test_record_tuples_replaces_by_identity() {
        let mut state = RunState::default();
        let tuple = RelationTuple::new("r", "Paris", "France", "LOCATION", "COUNTRY");
        let seed = CandidateTuple::new(tuple.clone(), 0.5);
        let promoted = CandidateTuple::with_confidence(tuple, 0.82, 0.5);

        state.record_tuples(0, &[seed]);
        state.record_tuples(1, &[promoted.clone()]);

        assert_eq!(state.tuples.len(), 1);
        assert_eq!(state.tuples[0].iteration, 1);
        assert_eq!(state.tuples[0].tuple, promoted);
    }

    #[test]
    fn test_termination_serializes_with_reason() {
        let json = serde_json::to_value(Termination::NoNewSeeds { iteration: 2 }).unwrap();
        assert_eq!(json["reason"], "no_new_seeds");
        assert_eq!(json["iteration"], 2);
    }
}
