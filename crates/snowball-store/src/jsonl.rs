//! JSONL shard store
//!
//! Sentences live in one or more JSON-lines shard files as written by the
//! indexer. Opening a store scans every shard once and keeps only byte
//! offsets plus two inverted indexes:
//! - tagged token -> record ids
//! - entity tag -> record ids
//!
//! Record ids are assigned in shard order, then line order, so posting
//! lists are sorted and query results come back in a stable order.
//! Fetching a sentence seeks to its offset and parses a single line.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use snowball_core::{split_tagged, RelationTuple, Result, Sentence, SentenceStore, SnowballError};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// Shard file extension picked up when a directory is given
pub const SHARD_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, Copy)]
struct Location {
    shard: usize,
    offset: u64,
}

type Postings = Vec<usize>;

/// Sentence store over JSONL shard files
pub struct JsonlSentenceStore {
    shards: Vec<PathBuf>,
    locations: Vec<Location>,
    by_token: HashMap<String, Postings>,
    by_tag: HashMap<String, Postings>,
    /// Last tag-pair intersection; the tuple pass asks for the same pair
    /// one offset at a time
    tag_cache: Mutex<Option<(String, String, Arc<Postings>)>>,
}

impl JsonlSentenceStore {
    /// Open shard files, or directories holding `*.jsonl` shards
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let shards = expand_shards(paths)?;
        let mut store = Self {
            shards: Vec::new(),
            locations: Vec::new(),
            by_token: HashMap::new(),
            by_tag: HashMap::new(),
            tag_cache: Mutex::new(None),
        };

        for path in shards {
            store.scan_shard(path)?;
        }

        info!(
            "Opened JSONL store: {} sentences in {} shards, {} tagged tokens",
            store.len(),
            store.shards.len(),
            store.by_token.len()
        );
        Ok(store)
    }

    /// Number of indexed sentences
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Shard files in scan order
    pub fn shards(&self) -> &[PathBuf] {
        &self.shards
    }

    fn scan_shard(&mut self, path: PathBuf) -> Result<()> {
        let shard = self.shards.len();
        let file = File::open(&path).map_err(|e| SnowballError::io(&path, e))?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut offset = 0u64;
        let mut line_no = 0usize;
        let before = self.locations.len();

        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .map_err(|e| SnowballError::io(&path, e))?;
            if n == 0 {
                break;
            }
            line_no += 1;
            let start = offset;
            offset += n as u64;

            if line.trim().is_empty() {
                continue;
            }
            let sentence: Sentence = serde_json::from_str(&line).map_err(|e| {
                SnowballError::SerializationError(format!("{}:{}: {e}", path.display(), line_no))
            })?;

            let id = self.locations.len();
            self.locations.push(Location {
                shard,
                offset: start,
            });
            for token in &sentence.tagged_tokens {
                if let Some((tag, _)) = split_tagged(token) {
                    push_posting(self.by_token.entry(token.clone()).or_default(), id);
                    push_posting(self.by_tag.entry(tag.to_string()).or_default(), id);
                }
            }
        }

        debug!(
            "Indexed {} sentences from {}",
            self.locations.len() - before,
            path.display()
        );
        self.shards.push(path);
        Ok(())
    }

    fn token_ids(&self, token: &str) -> &[usize] {
        self.by_token.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    fn tag_ids(&self, tag: &str) -> &[usize] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    fn pair_ids(&self, tuple: &RelationTuple) -> Postings {
        intersect(
            self.token_ids(&tuple.subject_anchor()),
            self.token_ids(&tuple.object_anchor()),
        )
    }

    fn tag_pair_ids(&self, subject_tag: &str, object_tag: &str) -> Arc<Postings> {
        let mut cache = self.tag_cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((subj, obj, ids)) = cache.as_ref() {
            if subj == subject_tag && obj == object_tag {
                return Arc::clone(ids);
            }
        }

        let ids = Arc::new(intersect(self.tag_ids(subject_tag), self.tag_ids(object_tag)));
        *cache = Some((
            subject_tag.to_string(),
            object_tag.to_string(),
            Arc::clone(&ids),
        ));
        ids
    }

    async fn read(&self, id: usize) -> Result<Sentence> {
        let location = self
            .locations
            .get(id)
            .copied()
            .ok_or_else(|| SnowballError::StoreError(format!("No sentence with id {id}")))?;
        let path = &self.shards[location.shard];

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SnowballError::io(path, e))?;
        file.seek(SeekFrom::Start(location.offset))
            .await
            .map_err(|e| SnowballError::io(path, e))?;

        let mut line = String::new();
        tokio::io::BufReader::new(file)
            .read_line(&mut line)
            .await
            .map_err(|e| SnowballError::io(path, e))?;

        serde_json::from_str(&line).map_err(|e| {
            SnowballError::StoreError(format!(
                "{} changed since it was indexed (offset {}): {e}",
                path.display(),
                location.offset
            ))
        })
    }

    async fn read_page(&self, ids: &[usize], from: usize, size: usize) -> Result<Vec<Sentence>> {
        let mut page = Vec::with_capacity(size.min(ids.len().saturating_sub(from)));
        for &id in ids.iter().skip(from).take(size) {
            page.push(self.read(id).await?);
        }
        Ok(page)
    }
}

#[async_trait]
impl SentenceStore for JsonlSentenceStore {
    async fn count_containing(&self, tuple: &RelationTuple) -> Result<usize> {
        Ok(self.pair_ids(tuple).len())
    }

    async fn sentences_containing(
        &self,
        tuple: &RelationTuple,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        let ids = self.pair_ids(tuple);
        self.read_page(&ids, from, size).await
    }

    async fn count_with_tags(&self, subject_tag: &str, object_tag: &str) -> Result<usize> {
        Ok(self.tag_pair_ids(subject_tag, object_tag).len())
    }

    async fn sentences_with_tags(
        &self,
        subject_tag: &str,
        object_tag: &str,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        let ids = self.tag_pair_ids(subject_tag, object_tag);
        self.read_page(&ids, from, size).await
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

fn push_posting(list: &mut Postings, id: usize) {
    if list.last() != Some(&id) {
        list.push(id);
    }
}

/// Intersect two ascending posting lists
fn intersect(a: &[usize], b: &[usize]) -> Postings {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }

    out
}

/// Resolve files and directories into a sorted list of shard files
fn expand_shards<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| SnowballError::io(path, e))?;
            let mut found = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| SnowballError::io(path, e))?;
                let file = entry.path();
                if file.is_file()
                    && file.extension().and_then(|e| e.to_str()) == Some(SHARD_EXTENSION)
                {
                    found.push(file);
                }
            }
            found.sort();
            shards.extend(found);
        } else if path.is_file() {
            shards.push(path.to_path_buf());
        } else {
            return Err(SnowballError::StoreError(format!(
                "Shard path not found: {}",
                path.display()
            )));
        }
    }

    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sentence(id: u64, index: usize, tagged: &[&str]) -> Sentence {
        let tokens = tagged
            .iter()
            .map(|t| split_tagged(t).map(|(_, x)| x).unwrap_or(*t).to_string())
            .collect();
        Sentence::new(id, index, tokens, tagged.iter().map(|t| t.to_string()).collect())
    }

    fn write_shard(path: &Path, sentences: &[Sentence]) {
        let mut file = File::create(path).unwrap();
        for s in sentences {
            writeln!(file, "{}", serde_json::to_string(s).unwrap()).unwrap();
        }
    }

    fn corpus(dir: &Path) {
        write_shard(
            &dir.join("sentences-0.jsonl"),
            &[
                sentence(1, 0, &["<LOCATION>Paris</LOCATION>", "in", "<COUNTRY>France</COUNTRY>"]),
                sentence(1, 1, &["nothing", "here"]),
                sentence(2, 0, &["<PERSON>Curie</PERSON>", "in", "<LOCATION>Paris</LOCATION>"]),
            ],
        );
        write_shard(
            &dir.join("sentences-1.jsonl"),
            &[
                sentence(3, 0, &["<LOCATION>Lyon</LOCATION>", "in", "<COUNTRY>France</COUNTRY>"]),
                sentence(4, 2, &["<COUNTRY>France</COUNTRY>", "'s", "<LOCATION>Paris</LOCATION>"]),
            ],
        );
        std::fs::write(dir.join("notes.txt"), "not a shard").unwrap();
    }

    #[test]
    fn test_intersect() {
        assert_eq!(intersect(&[1, 3, 5, 7], &[2, 3, 7, 9]), vec![3, 7]);
        assert!(intersect(&[], &[1]).is_empty());
    }

    #[test]
    fn test_open_directory_scans_sorted_shards() {
        let dir = tempfile::tempdir().unwrap();
        corpus(dir.path());

        let store = JsonlSentenceStore::open(&[dir.path()]).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.shards().len(), 2);
        assert!(store.shards()[0].ends_with("sentences-0.jsonl"));
    }

    #[tokio::test]
    async fn test_exact_pair_lookup() {
        let dir = tempfile::tempdir().unwrap();
        corpus(dir.path());
        let store = JsonlSentenceStore::open(&[dir.path()]).unwrap();

        let paris = RelationTuple::new("r", "Paris", "France", "LOCATION", "COUNTRY");
        assert_eq!(store.count_containing(&paris).await.unwrap(), 2);

        let found = store.sentences_containing(&paris, 0, 10).await.unwrap();
        let keys: Vec<String> = found.iter().map(Sentence::key).collect();
        assert_eq!(keys, vec!["1_0", "4_2"]);

        let missing = RelationTuple::new("r", "Rome", "France", "LOCATION", "COUNTRY");
        assert_eq!(store.count_containing(&missing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tag_pair_pages_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        corpus(dir.path());
        let store = JsonlSentenceStore::open(&[dir.path()]).unwrap();

        assert_eq!(store.count_with_tags("LOCATION", "COUNTRY").await.unwrap(), 3);

        let second = store
            .sentence_with_tags_at("LOCATION", "COUNTRY", 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.key(), "3_0");
        assert_eq!(second.tokens, vec!["Lyon", "in", "France"]);

        let tail = store
            .sentences_with_tags("LOCATION", "COUNTRY", 2, 10)
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].key(), "4_2");

        assert!(store
            .sentence_with_tags_at("LOCATION", "COUNTRY", 3)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_open_rejects_bad_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"id\": 1}\n").unwrap();

        let err = JsonlSentenceStore::open(&[&path]).err().unwrap();
        assert!(matches!(err, SnowballError::SerializationError(msg) if msg.contains(":1:")));
    }

    #[test]
    fn test_open_missing_path() {
        let result = JsonlSentenceStore::open(&[Path::new("/nonexistent/shards")]);
        assert!(matches!(result, Err(SnowballError::StoreError(_))));
    }
}
