use std::collections::HashSet;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use sage_core::store::{Query, SearchResult, StoreError, UpsertRecord, VectorStore};

use crate::provider::filter::apply_attribute_filter;
use crate::provider::retry::{RetryPolicy, with_backoff};
use crate::provider::{build_http_client, error_message};

/// Probe request used to approximate `existing_ids`: the remote index has no
/// list primitive, so we issue one broad query and collect the ids observed.
/// Not a guarantee of completeness.
const PROBE_TEXT: &str = "document";
const PROBE_LIMIT: usize = 1000;

/// Vector store backed by a hosted index.
///
/// Embedding happens server-side: upserts carry the text to embed, and
/// queries may be raw text. Every remote operation runs under the retry
/// policy (3 attempts, 1s/2s backoff).
#[derive(Debug)]
pub struct HostedVectorStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    collection: String,
    attribute_filter: bool,
    retry: RetryPolicy,
}

impl HostedVectorStore {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        collection: &str,
        attribute_filter: bool,
    ) -> Self {
        Self {
            client: build_http_client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            collection: collection.to_string(),
            attribute_filter,
            retry: RetryPolicy::default(),
        }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.endpoint, self.collection)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!(
                "{} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                error_message(&body_text)
            )));
        }
        Ok(response)
    }

    async fn run_query(&self, body: &QueryBody) -> Result<SearchResult, StoreError> {
        let url = self.collection_url("/query");
        let response = with_backoff(self.retry, || self.post_json(&url, body)).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Remote(format!("malformed query response: {e}")))?;
        Ok(shape_results(parsed.matches))
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct UpsertBody {
    records: Vec<WireRecord>,
}

#[derive(Serialize)]
struct WireRecord {
    id: String,
    text: String,
    /// What the remote service embeds; `text` is what it returns in results.
    embed_text: String,
    metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct QueryBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    id: String,
    text: String,
    /// Similarity in [0, 1], higher is better.
    score: f32,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Reshape remote matches into the uniform parallel-array result, converting
/// the similarity score to a distance (`1 − score`) so local and hosted
/// results sort the same way.
fn shape_results(matches: Vec<Match>) -> SearchResult {
    let mut result = SearchResult::default();
    for m in matches {
        result.ids.push(m.id);
        result.documents.push(m.text);
        result.distances.push(1.0 - m.score);
        result.metadatas.push(m.metadata);
    }
    result
}

impl VectorStore for HostedVectorStore {
    /// Idempotently create the remote collection.
    async fn initialize(&self) -> Result<(), StoreError> {
        with_backoff(self.retry, || async move {
            let response = self
                .authorize(self.client.put(self.collection_url("")))
                .send()
                .await
                .map_err(|e| StoreError::Remote(e.to_string()))?;

            let status = response.status();
            // 409 means the collection already exists, which is fine.
            if status.is_success() || status.as_u16() == 409 {
                return Ok(());
            }
            let body_text = response.text().await.unwrap_or_default();
            Err(StoreError::Remote(format!(
                "failed to create collection '{}': {} {}: {}",
                self.collection,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                error_message(&body_text)
            )))
        })
        .await
    }

    async fn add_documents(&self, records: Vec<UpsertRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let body = UpsertBody {
            records: records
                .into_iter()
                .map(|r| WireRecord {
                    id: r.id,
                    text: r.text,
                    embed_text: r.index_text,
                    metadata: r.metadata,
                    embedding: r.embedding,
                })
                .collect(),
        };
        let url = self.collection_url("/upsert");
        with_backoff(self.retry, || self.post_json(&url, &body)).await?;
        Ok(())
    }

    async fn query(&self, query: Query, limit: usize) -> Result<SearchResult, StoreError> {
        match query {
            Query::Vector(vector) => {
                self.run_query(&QueryBody {
                    vector: Some(vector),
                    text: None,
                    top_k: limit,
                })
                .await
            }
            Query::Text(text) => {
                let results = self
                    .run_query(&QueryBody {
                        vector: None,
                        text: Some(text.clone()),
                        top_k: limit,
                    })
                    .await?;
                if self.attribute_filter {
                    Ok(apply_attribute_filter(&text, results))
                } else {
                    Ok(results)
                }
            }
        }
    }

    /// Approximate the stored id set with a single broad probe query.
    ///
    /// The remote index exposes no list primitive; ids beyond the probe
    /// limit are missed, so callers must treat this as best-effort.
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let results = self
            .run_query(&QueryBody {
                vector: None,
                text: Some(PROBE_TEXT.to_string()),
                top_k: PROBE_LIMIT,
            })
            .await?;
        Ok(results.ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_results_converts_score_to_distance() {
        let matches = vec![
            Match {
                id: "1".into(),
                text: "best".into(),
                score: 0.95,
                metadata: serde_json::json!({"type": "Fruit"}),
            },
            Match {
                id: "2".into(),
                text: "worse".into(),
                score: 0.40,
                metadata: serde_json::Value::Null,
            },
        ];

        let result = shape_results(matches);
        assert_eq!(result.ids, vec!["1", "2"]);
        assert!((result.distances[0] - 0.05).abs() < 1e-6);
        assert!((result.distances[1] - 0.60).abs() < 1e-6);
        assert_eq!(result.metadatas[0]["type"], "Fruit");
        assert_eq!(result.documents.len(), result.distances.len());
    }

    #[test]
    fn query_body_serializes_only_the_given_shape() {
        let by_text = serde_json::to_value(QueryBody {
            vector: None,
            text: Some("bananas".into()),
            top_k: 5,
        })
        .unwrap();
        assert_eq!(by_text["text"], "bananas");
        assert_eq!(by_text["top_k"], 5);
        assert!(by_text.get("vector").is_none());

        let by_vector = serde_json::to_value(QueryBody {
            vector: Some(vec![0.1, 0.2]),
            text: None,
            top_k: 3,
        })
        .unwrap();
        assert!(by_vector.get("text").is_none());
        assert_eq!(by_vector["vector"][1], 0.2);
    }

    #[test]
    fn wire_record_carries_display_and_index_text() {
        let record = WireRecord {
            id: "1".into(),
            text: "A banana is a yellow fruit.".into(),
            embed_text: "A banana is a yellow fruit. It is a kind of Fruit.".into(),
            metadata: serde_json::Value::Null,
            embedding: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["text"], "A banana is a yellow fruit.");
        assert!(
            value["embed_text"].as_str().unwrap().contains("kind of Fruit"),
            "index text should carry the enrichment"
        );
        assert!(value.get("embedding").is_none());
    }

    #[test]
    fn parse_query_response() {
        let json = r#"{"matches": [{"id": "a", "text": "doc", "score": 0.8}]}"#;
        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].id, "a");
        assert!(parsed.matches[0].metadata.is_null());
    }
}
