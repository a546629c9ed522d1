//! In-memory sentence store

use async_trait::async_trait;
use snowball_core::{RelationTuple, Result, Sentence, SentenceStore};

/// Whether a sentence carries entities of both tags
fn has_tags(sentence: &Sentence, subject_tag: &str, object_tag: &str) -> bool {
    sentence.has_entity(subject_tag) && sentence.has_entity(object_tag)
}

/// Sentence store backed by a vector, queried in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySentenceStore {
    sentences: Vec<Sentence>,
}

impl MemorySentenceStore {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn push(&mut self, sentence: Sentence) {
        self.sentences.push(sentence);
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    fn containing<'a>(&'a self, tuple: &'a RelationTuple) -> impl Iterator<Item = &'a Sentence> {
        self.sentences.iter().filter(move |s| s.contains_tuple(tuple))
    }

    fn with_tags<'a>(
        &'a self,
        subject_tag: &'a str,
        object_tag: &'a str,
    ) -> impl Iterator<Item = &'a Sentence> {
        self.sentences
            .iter()
            .filter(move |s| has_tags(s, subject_tag, object_tag))
    }
}

impl FromIterator<Sentence> for MemorySentenceStore {
    fn from_iter<I: IntoIterator<Item = Sentence>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl SentenceStore for MemorySentenceStore {
    async fn count_containing(&self, tuple: &RelationTuple) -> Result<usize> {
        Ok(self.containing(tuple).count())
    }

    async fn sentences_containing(
        &self,
        tuple: &RelationTuple,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        Ok(self.containing(tuple).skip(from).take(size).cloned().collect())
    }

    async fn count_with_tags(&self, subject_tag: &str, object_tag: &str) -> Result<usize> {
        Ok(self.with_tags(subject_tag, object_tag).count())
    }

    async fn sentences_with_tags(
        &self,
        subject_tag: &str,
        object_tag: &str,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        Ok(self
            .with_tags(subject_tag, object_tag)
            .skip(from)
            .take(size)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(id: u64, tagged: &[&str]) -> Sentence {
        let tokens = tagged
            .iter()
            .map(|t| {
                snowball_core::split_tagged(t)
                    .map(|(_, text)| text.to_string())
                    .unwrap_or_else(|| t.to_string())
            })
            .collect();
        Sentence::new(id, 0, tokens, tagged.iter().map(|t| t.to_string()).collect())
    }

    fn store() -> MemorySentenceStore {
        [
            sentence(1, &["<LOCATION>Paris</LOCATION>", "in", "<COUNTRY>France</COUNTRY>"]),
            sentence(2, &["<LOCATION>Lyon</LOCATION>", "in", "<COUNTRY>France</COUNTRY>"]),
            sentence(3, &["<PERSON>Marie</PERSON>", "in", "<LOCATION>Paris</LOCATION>"]),
            sentence(4, &["<COUNTRY>France</COUNTRY>", "'s", "<LOCATION>Paris</LOCATION>"]),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_exact_pair_queries() {
        let store = store();
        let paris = RelationTuple::new("r", "Paris", "France", "LOCATION", "COUNTRY");

        assert_eq!(store.count_containing(&paris).await.unwrap(), 2);
        let page = store.sentences_containing(&paris, 1, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].document_id, 4);
    }

    #[tokio::test]
    async fn test_tag_queries_are_paginated_in_order() {
        let store = store();

        assert_eq!(store.count_with_tags("LOCATION", "COUNTRY").await.unwrap(), 3);
        let ids: Vec<u64> = store
            .sentences_with_tags("LOCATION", "COUNTRY", 1, 5)
            .await
            .unwrap()
            .iter()
            .map(|s| s.document_id)
            .collect();
        assert_eq!(ids, vec![2, 4]);

        let third = store
            .sentence_with_tags_at("LOCATION", "COUNTRY", 2)
            .await
            .unwrap();
        assert_eq!(third.map(|s| s.document_id), Some(4));
        assert!(store
            .sentence_with_tags_at("LOCATION", "COUNTRY", 3)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_len_and_push() {
        let mut store = MemorySentenceStore::default();
        assert!(store.is_empty());
        store.push(sentence(9, &["x"]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.name(), "memory");
    }
}
