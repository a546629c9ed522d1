//! Pattern and tuple logs
//!
//! Append-only JSON Lines logs, one record per line. Pattern records are
//! written as soon as an iteration discovers them and once more, with their
//! final evidence counters, when the run ends, so every pattern of a run
//! appears twice; filter on `stage` (or use `read_patterns_at`) before
//! counting. Tuple records are written once at the end of the run.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snowball_core::{OutputConfig, Result, SnowballError};
use tracing::debug;

use crate::pattern::ScoredPattern;
use crate::tuple::CandidateTuple;

// ============================================================================
// Records
// ============================================================================

/// When a pattern record was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStage {
    /// Freshly clustered during an iteration
    Discovered,
    /// End-of-run snapshot
    Final,
}

/// One line of the pattern log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// Iteration that created the pattern (1-based)
    pub iteration: usize,
    pub stage: PatternStage,
    /// `confidence()` at write time
    pub confidence: f64,
    pub pattern: ScoredPattern,
}

/// One line of the tuple log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleRecord {
    /// Iteration that promoted the tuple; `0` for the initial seeds
    pub iteration: usize,
    pub tuple: CandidateTuple,
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for the records produced by a bootstrapping run
pub trait OutputSink: Send {
    fn write_patterns(
        &mut self,
        iteration: usize,
        stage: PatternStage,
        patterns: &[ScoredPattern],
    ) -> Result<()>;

    fn write_tuples(&mut self, tuples: &[TupleRecord]) -> Result<()>;
}

/// Pattern and tuple log files
pub struct RunLog {
    patterns_path: PathBuf,
    tuples_path: PathBuf,
    patterns: BufWriter<File>,
    tuples: BufWriter<File>,
}

impl RunLog {
    /// Open both logs for appending, creating files and parent directories
    pub fn open(patterns_path: impl Into<PathBuf>, tuples_path: impl Into<PathBuf>) -> Result<Self> {
        let patterns_path = patterns_path.into();
        let tuples_path = tuples_path.into();

        Ok(Self {
            patterns: open_append(&patterns_path)?,
            tuples: open_append(&tuples_path)?,
            patterns_path,
            tuples_path,
        })
    }

    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        Self::open(&config.patterns_file, &config.tuples_file)
    }

    pub fn patterns_path(&self) -> &Path {
        &self.patterns_path
    }

    pub fn tuples_path(&self) -> &Path {
        &self.tuples_path
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SnowballError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SnowballError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn write_lines<T, W>(writer: &mut W, path: &Path, records: impl IntoIterator<Item = T>) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    for record in records {
        serde_json::to_writer(&mut *writer, &record)?;
        writer
            .write_all(b"\n")
            .map_err(|e| SnowballError::io(path, e))?;
    }
    writer.flush().map_err(|e| SnowballError::io(path, e))
}

impl OutputSink for RunLog {
    fn write_patterns(
        &mut self,
        iteration: usize,
        stage: PatternStage,
        patterns: &[ScoredPattern],
    ) -> Result<()> {
        debug!(
            "Writing {} patterns to {}",
            patterns.len(),
            self.patterns_path.display()
        );
        let records = patterns.iter().map(|p| PatternRecord {
            iteration,
            stage,
            confidence: p.confidence(),
            pattern: p.clone(),
        });
        write_lines(&mut self.patterns, &self.patterns_path, records)
    }

    fn write_tuples(&mut self, tuples: &[TupleRecord]) -> Result<()> {
        debug!(
            "Writing {} tuples to {}",
            tuples.len(),
            self.tuples_path.display()
        );
        write_lines(&mut self.tuples, &self.tuples_path, tuples)
    }
}

/// Sink keeping every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub patterns: Vec<PatternRecord>,
    pub tuples: Vec<TupleRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemorySink {
    fn write_patterns(
        &mut self,
        iteration: usize,
        stage: PatternStage,
        patterns: &[ScoredPattern],
    ) -> Result<()> {
        self.patterns
            .extend(patterns.iter().map(|p| PatternRecord {
                iteration,
                stage,
                confidence: p.confidence(),
                pattern: p.clone(),
            }));
        Ok(())
    }

    fn write_tuples(&mut self, tuples: &[TupleRecord]) -> Result<()> {
        self.tuples.extend_from_slice(tuples);
        Ok(())
    }
}

// ============================================================================
// Readers
// ============================================================================

/// Parse a tuple log
pub fn read_tuples(path: impl AsRef<Path>) -> Result<Vec<TupleRecord>> {
    read_lines(path.as_ref())
}

/// Parse a pattern log
pub fn read_patterns(path: impl AsRef<Path>) -> Result<Vec<PatternRecord>> {
    read_lines(path.as_ref())
}

/// Parse a pattern log, keeping only records written at `stage`
pub fn read_patterns_at(path: impl AsRef<Path>, stage: PatternStage) -> Result<Vec<PatternRecord>> {
    let mut records = read_patterns(path)?;
    records.retain(|r| r.stage == stage);
    Ok(records)
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| SnowballError::io(path, e))?;
    let mut records = Vec::new();

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SnowballError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            SnowballError::SerializationError(format!("{}:{}: {}", path.display(), n + 1, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextVector;
    use crate::pattern::{Pattern, RawPattern};
    use snowball_core::RelationTuple;

    fn scored() -> ScoredPattern {
        let pattern = Pattern::new(
            ContextVector::from_tokens(&["the"], 0.1),
            "LOCATION",
            ContextVector::from_tokens(&["is", "located", "in"], 0.8),
            "COUNTRY",
            ContextVector::default(),
        );
        ScoredPattern::new(vec![RawPattern::new(pattern, 4, 2); 2], 0.5).unwrap()
    }

    fn record(subject: &str, iteration: usize) -> TupleRecord {
        let tuple = RelationTuple::new("located_in", subject, "France", "LOCATION", "COUNTRY");
        TupleRecord {
            iteration,
            tuple: CandidateTuple::with_confidence(tuple, 0.82, 0.5),
        }
    }

    #[test]
    fn test_run_log_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let patterns_path = dir.path().join("out/patterns.jsonl");
        let tuples_path = dir.path().join("out/tuples.jsonl");

        let mut log = RunLog::open(&patterns_path, &tuples_path).unwrap();
        log.write_patterns(1, PatternStage::Discovered, &[scored()])
            .unwrap();
        log.write_patterns(1, PatternStage::Final, &[scored()])
            .unwrap();
        log.write_tuples(&[record("Paris", 0), record("Lyon", 1)])
            .unwrap();

        let patterns = read_patterns(&patterns_path).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].stage, PatternStage::Discovered);
        assert_eq!(patterns[1].stage, PatternStage::Final);
        assert_eq!(patterns[0].pattern, scored());
        assert_eq!(patterns[0].confidence, scored().confidence());

        let tuples = read_tuples(&tuples_path).unwrap();
        assert_eq!(tuples, vec![record("Paris", 0), record("Lyon", 1)]);
    }

    #[test]
    fn test_read_patterns_at_stage() {
        let dir = tempfile::tempdir().unwrap();
        let patterns_path = dir.path().join("patterns.jsonl");
        let tuples_path = dir.path().join("tuples.jsonl");

        let mut log = RunLog::open(&patterns_path, &tuples_path).unwrap();
        log.write_patterns(1, PatternStage::Discovered, &[scored()])
            .unwrap();
        log.write_patterns(2, PatternStage::Discovered, &[scored()])
            .unwrap();
        log.write_patterns(1, PatternStage::Final, &[scored()])
            .unwrap();
        log.write_patterns(2, PatternStage::Final, &[scored()])
            .unwrap();

        assert_eq!(read_patterns(&patterns_path).unwrap().len(), 4);
        let finals = read_patterns_at(&patterns_path, PatternStage::Final).unwrap();
        let iterations: Vec<usize> = finals.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![1, 2]);
        assert!(finals.iter().all(|r| r.stage == PatternStage::Final));
    }

    #[test]
    fn test_run_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let patterns_path = dir.path().join("patterns.jsonl");
        let tuples_path = dir.path().join("tuples.jsonl");

        for subject in ["Paris", "Lyon"] {
            let mut log = RunLog::open(&patterns_path, &tuples_path).unwrap();
            log.write_tuples(&[record(subject, 1)]).unwrap();
        }

        assert_eq!(read_tuples(&tuples_path).unwrap().len(), 2);
        assert!(read_patterns(&patterns_path).unwrap().is_empty());
    }

    #[test]
    fn test_read_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuples.jsonl");
        std::fs::write(&path, "\n{not json}\n").unwrap();

        let err = read_tuples(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.write_patterns(2, PatternStage::Discovered, &[scored()])
            .unwrap();
        sink.write_tuples(&[record("Paris", 0)]).unwrap();

        assert_eq!(sink.patterns[0].iteration, 2);
        assert_eq!(sink.tuples.len(), 1);
    }
}
