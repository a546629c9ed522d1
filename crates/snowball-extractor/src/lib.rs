//! Snowball Extractor - Pattern/tuple bootstrapping engine
//!
//! Implements the Snowball loop for learning binary relation instances
//! from an entity-tagged corpus:
//! - Context vectors and extraction patterns
//! - Scored patterns and candidate tuples with smoothed confidence
//! - Sentence extraction, single-pass clustering and the iteration loop
//! - Seed parsing, pattern/tuple logs and pair-level evaluation

pub mod bootstrap;
pub mod cluster;
pub mod confidence;
pub mod context;
pub mod metrics;
pub mod output;
pub mod pattern;
pub mod seed;
pub mod sentence;
pub mod tuple;

pub use bootstrap::{BootstrapOutcome, Bootstrapper, Termination};
pub use cluster::{scored_patterns, Cluster, SinglePassClusterer};
pub use context::ContextVector;
pub use metrics::{evaluate_pairs, read_gold_pairs, threshold_sweep, PairMetrics, SweepPoint};
pub use output::{
    read_patterns, read_patterns_at, read_tuples, MemorySink, OutputSink, PatternRecord,
    PatternStage, RunLog, TupleRecord,
};
pub use pattern::{Pattern, RawPattern, ScoredPattern};
pub use seed::SeedSet;
pub use sentence::{ContextWeights, SentenceExtractor, TagPair};
pub use tuple::CandidateTuple;
