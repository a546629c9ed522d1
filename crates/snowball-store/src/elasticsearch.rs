//! Elasticsearch sentence store
//!
//! Queries an index whose documents are serialized `Sentence`s. Both
//! `tagged_tokens` and `entities` must be mapped as `keyword` fields so that
//! `term` filters match whole tokens. Results are sorted by `id` then
//! `index` to keep `from`/`size` pagination stable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use snowball_core::{RelationTuple, Result, Sentence, SentenceStore, SnowballError, StoreConfig};
use tracing::debug;

// ============================================================================
// Query bodies
// ============================================================================

fn term_filters(field: &str, first: &str, second: &str) -> Value {
    let mut filters = vec![json!({ "term": { field: first } })];
    if first != second {
        filters.push(json!({ "term": { field: second } }));
    }
    json!({ "bool": { "filter": filters } })
}

/// Query matching sentences that contain both tagged anchors of a tuple
pub fn exact_pair_query(tuple: &RelationTuple) -> Value {
    term_filters(
        "tagged_tokens",
        &tuple.subject_anchor(),
        &tuple.object_anchor(),
    )
}

/// Query matching sentences that carry both entity tags
pub fn tag_pair_query(subject_tag: &str, object_tag: &str) -> Value {
    term_filters("entities", subject_tag, object_tag)
}

/// Paginated `_search` body for a query
pub fn search_body(query: &Value, from: usize, size: usize) -> Value {
    json!({
        "query": query,
        "from": from,
        "size": size,
        "sort": [{ "id": "asc" }, { "index": "asc" }]
    })
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: Sentence,
}

// ============================================================================
// Store
// ============================================================================

/// Sentence store backed by an Elasticsearch index
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchStore {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnowballError::StoreError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(
            &config.elasticsearch_url,
            &config.elasticsearch_index,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index, action)
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, action: &str, body: &Value) -> Result<T> {
        let url = self.endpoint(action);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SnowballError::StoreError(format!("Request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SnowballError::StoreError(format!(
                "Elasticsearch {action} returned {status}: {error_text}"
            )));
        }

        response.json().await.map_err(|e| {
            SnowballError::StoreError(format!("Failed to parse {action} response: {e}"))
        })
    }

    async fn count(&self, query: Value) -> Result<usize> {
        let response: CountResponse = self.post("_count", &json!({ "query": query })).await?;
        Ok(response.count)
    }

    async fn search(&self, query: Value, from: usize, size: usize) -> Result<Vec<Sentence>> {
        let response: SearchResponse = self
            .post("_search", &search_body(&query, from, size))
            .await?;
        Ok(response.hits.hits.into_iter().map(|h| h.source).collect())
    }
}

#[async_trait]
impl SentenceStore for ElasticsearchStore {
    async fn count_containing(&self, tuple: &RelationTuple) -> Result<usize> {
        self.count(exact_pair_query(tuple)).await
    }

    async fn sentences_containing(
        &self,
        tuple: &RelationTuple,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        self.search(exact_pair_query(tuple), from, size).await
    }

    async fn count_with_tags(&self, subject_tag: &str, object_tag: &str) -> Result<usize> {
        self.count(tag_pair_query(subject_tag, object_tag)).await
    }

    async fn sentences_with_tags(
        &self,
        subject_tag: &str,
        object_tag: &str,
        from: usize,
        size: usize,
    ) -> Result<Vec<Sentence>> {
        self.search(tag_pair_query(subject_tag, object_tag), from, size)
            .await
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pair_query() {
        let tuple = RelationTuple::new("r", "Paris", "France", "LOCATION", "COUNTRY");
        let query = exact_pair_query(&tuple);

        assert_eq!(
            query,
            json!({ "bool": { "filter": [
                { "term": { "tagged_tokens": "<LOCATION>Paris</LOCATION>" } },
                { "term": { "tagged_tokens": "<COUNTRY>France</COUNTRY>" } }
            ]}})
        );
    }

    #[test]
    fn test_tag_pair_query_same_tag_once() {
        let query = tag_pair_query("PERSON", "PERSON");
        assert_eq!(query["bool"]["filter"].as_array().map(Vec::len), Some(1));
        assert_eq!(query["bool"]["filter"][0]["term"]["entities"], "PERSON");
    }

    #[test]
    fn test_search_body() {
        let body = search_body(&tag_pair_query("A", "B"), 200, 100);
        assert_eq!(body["from"], 200);
        assert_eq!(body["size"], 100);
        assert_eq!(body["sort"][0]["id"], "asc");
        assert_eq!(body["query"]["bool"]["filter"][1]["term"]["entities"], "B");
    }

    #[test]
    fn test_parse_search_response() {
        let raw = json!({
            "took": 3,
            "hits": { "total": { "value": 1 }, "hits": [{
                "_index": "snowball_sentences",
                "_id": "7_2",
                "_source": {
                    "id": 7,
                    "index": 2,
                    "tokens": ["Paris", "in", "France"],
                    "tagged_tokens": ["<LOCATION>Paris</LOCATION>", "in", "<COUNTRY>France</COUNTRY>"],
                    "entities": ["COUNTRY", "LOCATION"]
                }
            }]}
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.hits.hits.len(), 1);
        assert_eq!(parsed.hits.hits[0].source.key(), "7_2");

        let count: CountResponse = serde_json::from_value(json!({ "count": 42 })).unwrap();
        assert_eq!(count.count, 42);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let store =
            ElasticsearchStore::new("http://localhost:9200/", "sents", Duration::from_secs(5))
                .unwrap();
        assert_eq!(store.endpoint("_count"), "http://localhost:9200/sents/_count");
        assert_eq!(store.name(), "elasticsearch");
    }
}
