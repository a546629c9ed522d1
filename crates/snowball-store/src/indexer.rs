//! Corpus indexer
//!
//! Turns extracted dump files into JSONL sentence shards. Input paths are
//! sorted into a shared queue; a fixed number of blocking workers pop paths,
//! tag every page and append the sentences to their own shard
//! `sentences-<worker>.jsonl`. A file that cannot be read or parsed is
//! logged and counted; pages read before the failure are kept.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use snowball_core::{Result, SnowballError};
use snowball_tagger::{EntityTagger, PageReader};
use tracing::{info, warn};

/// Summary of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Files fully processed
    pub files: usize,
    /// Files abandoned after an error
    pub failed_files: usize,
    pub pages: usize,
    pub sentences: usize,
    /// Shards written, one per worker
    pub shards: Vec<PathBuf>,
}

impl IndexReport {
    fn merge(&mut self, other: IndexReport) {
        self.files += other.files;
        self.failed_files += other.failed_files;
        self.pages += other.pages;
        self.sentences += other.sentences;
        self.shards.extend(other.shards);
    }
}

/// Shard file name for a worker
pub fn shard_name(worker: usize) -> String {
    format!("sentences-{worker}.jsonl")
}

/// All regular files under `root`, recursively, sorted
pub fn collect_inputs(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| SnowballError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| SnowballError::io(&dir, e))?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

type Queue = Arc<Mutex<VecDeque<PathBuf>>>;

/// Parallel dump-to-shard indexer
pub struct Indexer {
    tagger: Arc<dyn EntityTagger>,
    workers: usize,
    output_dir: PathBuf,
}

impl Indexer {
    pub fn new(tagger: Arc<dyn EntityTagger>, workers: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tagger,
            workers: workers.max(1),
            output_dir: output_dir.into(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Index the given dump files
    pub async fn run(&self, mut paths: Vec<PathBuf>) -> Result<IndexReport> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| SnowballError::io(&self.output_dir, e))?;

        paths.sort();
        info!(
            "Indexing {} files with {} workers ({} tagger) into {}",
            paths.len(),
            self.workers,
            self.tagger.name(),
            self.output_dir.display()
        );
        let queue: Queue = Arc::new(Mutex::new(paths.into()));

        let handles = (0..self.workers).map(|worker| {
            let queue = Arc::clone(&queue);
            let tagger = Arc::clone(&self.tagger);
            let shard = self.output_dir.join(shard_name(worker));
            tokio::task::spawn_blocking(move || run_worker(worker, &queue, tagger.as_ref(), shard))
        });

        let mut report = IndexReport::default();
        for joined in futures::future::join_all(handles).await {
            let worker_report = joined
                .map_err(|e| SnowballError::Other(anyhow::anyhow!("Indexing worker panicked: {e}")))??;
            report.merge(worker_report);
        }
        report.shards.sort();

        info!(
            "Indexed {} files ({} failed): {} pages, {} sentences",
            report.files, report.failed_files, report.pages, report.sentences
        );
        Ok(report)
    }
}

fn next_path(queue: &Queue) -> Option<PathBuf> {
    queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
}

fn run_worker(
    worker: usize,
    queue: &Queue,
    tagger: &dyn EntityTagger,
    shard: PathBuf,
) -> Result<IndexReport> {
    let file = File::create(&shard).map_err(|e| SnowballError::io(&shard, e))?;
    let mut out = BufWriter::new(file);
    let mut report = IndexReport::default();

    while let Some(path) = next_path(queue) {
        match index_file(&path, tagger, &mut out, &shard, &mut report) {
            Ok(()) => report.files += 1,
            Err(SnowballError::IoError { path: failed, source }) if failed == shard => {
                return Err(SnowballError::io(failed, source));
            }
            Err(e) => {
                warn!("Worker {worker}: skipping {}: {e}", path.display());
                report.failed_files += 1;
            }
        }
    }

    out.flush().map_err(|e| SnowballError::io(&shard, e))?;
    report.shards.push(shard);
    Ok(report)
}

fn index_file(
    path: &Path,
    tagger: &dyn EntityTagger,
    out: &mut impl Write,
    shard: &Path,
    report: &mut IndexReport,
) -> Result<()> {
    for page in PageReader::open(path)? {
        let page = page?;
        report.pages += 1;

        for (index, tagged) in tagger.tag(&page.text)?.into_iter().enumerate() {
            if tagged.is_empty() {
                continue;
            }
            let sentence = tagged.into_sentence(page.id, index);
            serde_json::to_writer(&mut *out, &sentence)?;
            out.write_all(b"\n")
                .map_err(|e| SnowballError::io(shard, e))?;
            report.sentences += 1;
        }
    }
    Ok(())
}
