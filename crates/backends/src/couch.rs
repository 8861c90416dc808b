//! CouchRepository - Feed/Webhook documents in CouchDB
//!
//! Documents of every kind share one database and are told apart by their
//! `type` field. Writes rely on CouchDB's `_rev` check: a stale revision is
//! reported per document as a `conflict`.

use std::time::Duration;

use contracts::{
    ContractError, Document, FeedRepository, RepositoryConfig, Revision, WriteResult,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::BackendError;

/// Page size of `_find` requests
const FIND_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<Value>,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    #[serde(default)]
    doc: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkDocsResult {
    id: String,
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl From<BulkDocsResult> for WriteResult {
    fn from(result: BulkDocsResult) -> Self {
        match (result.ok, result.error) {
            (Some(true), _) => WriteResult::ok(
                result.id,
                Revision::new(result.rev.unwrap_or_default()),
            ),
            (_, Some(error)) => {
                if let Some(reason) = result.reason {
                    debug!(id = %result.id, %error, %reason, "Bulk write rejected");
                }
                WriteResult::failed(result.id, error)
            }
            _ => WriteResult::failed(result.id, "unknown"),
        }
    }
}

/// CouchDB-backed repository
pub struct CouchRepository {
    client: Client,
    database_url: Url,
    credentials: Option<(String, Option<String>)>,
}

impl CouchRepository {
    /// Create a repository for `config.database` on `config.url`
    ///
    /// Credentials embedded in the URL are sent as basic auth.
    pub fn new(config: &RepositoryConfig) -> Result<Self, BackendError> {
        let mut database_url = Url::parse(&format!(
            "{}/{}/",
            config.url.trim_end_matches('/'),
            config.database
        ))
        .map_err(|e| BackendError::invalid_url("<repository url>", e.to_string()))?;

        let credentials = (!database_url.username().is_empty()).then(|| {
            (
                database_url.username().to_string(),
                database_url.password().map(str::to_string),
            )
        });
        // credentials travel in the Authorization header only
        let _ = database_url.set_username("");
        let _ = database_url.set_password(None);

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            database_url,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.database_url
            .join(path)
            .map_err(|e| BackendError::invalid_url(path, e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, BackendError> {
        let url = self.endpoint(path)?;
        let mut request = self.client.post(url).json(body);

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status(path, status, body));
        }

        Ok(response)
    }

    async fn find_all<D: Document>(&self) -> Result<Vec<D>, BackendError> {
        let mut documents = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut body = json!({
                "selector": { "type": D::KIND.as_str() },
                "limit": FIND_PAGE_SIZE,
            });
            if let Some(bookmark) = &bookmark {
                body["bookmark"] = Value::String(bookmark.clone());
            }

            let page: FindResponse = self.post("_find", &body).await?.json().await?;
            let page_len = page.docs.len();
            documents.extend(page.docs.into_iter().filter_map(decode_document::<D>));

            match page.bookmark {
                Some(next) if page_len == FIND_PAGE_SIZE && bookmark.as_ref() != Some(&next) => {
                    bookmark = Some(next);
                }
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn all_docs<D: Document>(&self, ids: &[Uuid]) -> Result<Vec<D>, BackendError> {
        let keys: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let body = json!({ "keys": keys });

        let response: AllDocsResponse = self
            .post("_all_docs?include_docs=true", &body)
            .await?
            .json()
            .await?;

        Ok(response
            .rows
            .into_iter()
            .filter(|row| row.error.is_none())
            .filter_map(|row| row.doc)
            .filter(|doc| doc.get("type").and_then(Value::as_str) == Some(D::KIND.as_str()))
            .filter_map(decode_document::<D>)
            .collect())
    }

    async fn bulk_docs<D: Document>(
        &self,
        documents: Vec<D>,
    ) -> Result<Vec<WriteResult>, BackendError> {
        let body = json!({ "docs": documents });

        let results: Vec<BulkDocsResult> = self.post("_bulk_docs", &body).await?.json().await?;

        Ok(results.into_iter().map(WriteResult::from).collect())
    }
}

/// Decode a stored document, logging and skipping malformed ones
fn decode_document<D: Document>(doc: Value) -> Option<D> {
    let id = doc
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string();

    match serde_json::from_value(doc) {
        Ok(document) => Some(document),
        Err(e) => {
            let err = ContractError::MalformedDocument {
                kind: D::KIND.as_str(),
                id,
                message: e.to_string(),
            };
            error!(error = %err, "Skipping malformed document");
            None
        }
    }
}

impl FeedRepository for CouchRepository {
    #[instrument(name = "couch_get_all", skip(self), fields(kind = %D::KIND))]
    async fn get_all<D: Document>(&self) -> Result<Vec<D>, ContractError> {
        let documents = self
            .find_all::<D>()
            .await
            .map_err(BackendError::into_repository)?;
        debug!(count = documents.len(), "Loaded documents");
        Ok(documents)
    }

    #[instrument(
        name = "couch_get_by_keys",
        skip(self, ids),
        fields(kind = %D::KIND, keys = ids.len())
    )]
    async fn get_by_keys<D: Document>(&self, ids: &[Uuid]) -> Result<Vec<D>, ContractError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.all_docs(ids)
            .await
            .map_err(BackendError::into_repository)
    }

    #[instrument(
        name = "couch_bulk_update",
        skip(self, documents),
        fields(kind = %D::KIND, documents = documents.len())
    )]
    async fn bulk_update<D: Document>(
        &self,
        documents: Vec<D>,
    ) -> Result<Vec<WriteResult>, ContractError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        self.bulk_docs(documents)
            .await
            .map_err(BackendError::into_repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use contracts::{Feed, Webhook};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CouchState {
        feeds: Vec<Value>,
        bulk_bodies: Mutex<Vec<Value>>,
        find_bodies: Mutex<Vec<Value>>,
    }

    async fn find(State(state): State<Arc<CouchState>>, Json(body): Json<Value>) -> Json<Value> {
        state.find_bodies.lock().unwrap().push(body.clone());
        let docs = if body["selector"]["type"] == "feed" {
            state.feeds.clone()
        } else {
            vec![]
        };
        Json(json!({ "docs": docs, "bookmark": "nil" }))
    }

    async fn all_docs(
        State(state): State<Arc<CouchState>>,
        Query(params): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(params.get("include_docs").map(String::as_str), Some("true"));
        let rows: Vec<Value> = body["keys"]
            .as_array()
            .unwrap()
            .iter()
            .map(|key| {
                state
                    .feeds
                    .iter()
                    .find(|doc| doc["_id"] == *key)
                    .map(|doc| json!({ "id": key, "key": key, "doc": doc }))
                    .unwrap_or_else(|| json!({ "key": key, "error": "not_found" }))
            })
            .collect();
        Json(json!({ "rows": rows }))
    }

    async fn bulk_docs(State(state): State<Arc<CouchState>>, Json(body): Json<Value>) -> Json<Value> {
        state.bulk_bodies.lock().unwrap().push(body.clone());
        let results: Vec<Value> = body["docs"]
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                if i == 0 {
                    json!({ "ok": true, "id": doc["_id"], "rev": "2-b" })
                } else {
                    json!({ "id": doc["_id"], "error": "conflict", "reason": "Document update conflict." })
                }
            })
            .collect();
        Json(Value::Array(results))
    }

    async fn spawn_couch(feeds: Vec<Value>) -> (RepositoryConfig, Arc<CouchState>) {
        let state = Arc::new(CouchState {
            feeds,
            ..Default::default()
        });
        let app = Router::new()
            .route("/osinter_users/_find", post(find))
            .route("/osinter_users/_all_docs", post(all_docs))
            .route("/osinter_users/_bulk_docs", post(bulk_docs))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = RepositoryConfig {
            url: format!("http://{}/", addr),
            ..Default::default()
        };
        (config, state)
    }

    fn feed_doc(feed: &Feed) -> Value {
        let mut doc = serde_json::to_value(feed).unwrap();
        doc["_rev"] = json!("1-a");
        doc
    }

    #[tokio::test]
    async fn test_get_all_filters_by_type_and_skips_malformed() {
        let feed = Feed::new("ransomware");
        let malformed = json!({ "_id": "not-a-uuid", "type": "feed", "name": "broken" });
        let (config, state) = spawn_couch(vec![feed_doc(&feed), malformed]).await;

        let repository = CouchRepository::new(&config).unwrap();
        let feeds: Vec<Feed> = repository.get_all().await.unwrap();

        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, feed.id);
        assert_eq!(feeds[0].rev.as_str(), "1-a");
        assert_eq!(state.find_bodies.lock().unwrap()[0]["selector"]["type"], "feed");

        let webhooks: Vec<Webhook> = repository.get_all().await.unwrap();
        assert!(webhooks.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_keys_ignores_missing() {
        let feed = Feed::new("phishing");
        let (config, _state) = spawn_couch(vec![feed_doc(&feed)]).await;
        let repository = CouchRepository::new(&config).unwrap();

        let feeds: Vec<Feed> = repository
            .get_by_keys(&[feed.id, Uuid::new_v4()])
            .await
            .unwrap();

        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name, "phishing");
    }

    #[tokio::test]
    async fn test_bulk_update_reports_conflicts_per_document() {
        let (config, state) = spawn_couch(vec![]).await;
        let repository = CouchRepository::new(&config).unwrap();

        let mut first = Feed::new("a");
        first.rev = Revision::new("1-a");
        first.webhooks.last_article = "A102".into();
        let second = Feed::new("b");

        let results = repository
            .bulk_update(vec![first.clone(), second.clone()])
            .await
            .unwrap();

        assert!(results[0].success);
        assert_eq!(results[0].revision, Some(Revision::new("2-b")));
        assert!(results[1].is_conflict());
        assert_eq!(results[1].id, second.id.to_string());

        let body = &state.bulk_bodies.lock().unwrap()[0];
        assert_eq!(body["docs"][0]["_rev"], "1-a");
        assert_eq!(body["docs"][0]["webhooks"]["last_article"], "A102");
        assert_eq!(body["docs"][0]["type"], "feed");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_repository_error() {
        let config = RepositoryConfig {
            url: "http://127.0.0.1:9/".into(),
            request_timeout_secs: 1,
            ..Default::default()
        };
        let repository = CouchRepository::new(&config).unwrap();

        let err = repository.get_all::<Webhook>().await.unwrap_err();
        assert!(matches!(err, ContractError::Repository { .. }));
    }
}
