//! ElasticArticleSearch - article queries against an Elasticsearch index

use std::time::Duration;

use contracts::{
    Article, ArticleQuery, ArticleSearch, ContractError, SearchConfig, SortBy, SortOrder,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::BackendError;

/// Fields searched by free-text terms, with boosts
const TEXT_FIELDS: [&str; 3] = ["title^5", "description^3", "content"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

/// Elasticsearch-backed article search
pub struct ElasticArticleSearch {
    client: Client,
    search_url: Url,
}

impl ElasticArticleSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, BackendError> {
        let search_url = Url::parse(&format!(
            "{}/{}/_search",
            config.url.trim_end_matches('/'),
            config.index
        ))
        .map_err(|e| BackendError::invalid_url("<search url>", e.to_string()))?;

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, search_url })
    }

    async fn search(&self, query: &ArticleQuery) -> Result<Vec<Article>, BackendError> {
        let body = build_search_body(query);

        let response = self
            .client
            .post(self.search_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status("_search", status, body));
        }

        let response: SearchResponse = response.json().await?;

        Ok(response
            .hits
            .hits
            .into_iter()
            .filter_map(decode_hit)
            .collect())
    }
}

fn decode_hit(hit: Hit) -> Option<Article> {
    let mut source = hit.source;
    source.insert("id".into(), Value::String(hit.id.clone()));

    match serde_json::from_value(Value::Object(source)) {
        Ok(article) => Some(article),
        Err(e) => {
            warn!(id = %hit.id, error = %e, "Skipping malformed article");
            None
        }
    }
}

fn sort_field(sort_by: SortBy) -> &'static str {
    match sort_by {
        SortBy::PublishDate => "publish_date",
        SortBy::InsertedAt => "inserted_at",
        SortBy::ReadTimes => "read_times",
    }
}

fn sort_direction(sort_order: SortOrder) -> &'static str {
    match sort_order {
        SortOrder::Desc => "desc",
        SortOrder::Asc => "asc",
    }
}

/// Translate an article query into an Elasticsearch request body
pub(crate) fn build_search_body(query: &ArticleQuery) -> Value {
    let mut must = Vec::new();
    let mut filter = Vec::new();

    if let Some(term) = query.search_term.as_deref().filter(|t| !t.is_empty()) {
        must.push(json!({
            "simple_query_string": {
                "query": term,
                "fields": TEXT_FIELDS,
                "default_operator": "AND",
            }
        }));
    }

    if let Some(text) = query.semantic_search.as_deref().filter(|t| !t.is_empty()) {
        must.push(json!({
            "multi_match": {
                "query": text,
                "fields": TEXT_FIELDS,
            }
        }));
    }

    if !query.sources.is_empty() {
        filter.push(json!({ "terms": { "profile": query.sources } }));
    }

    if !query.source_category.is_empty() {
        filter.push(json!({ "terms": { "source_category": query.source_category } }));
    }

    if let Some(ids) = &query.ids {
        filter.push(json!({ "ids": { "values": ids } }));
    }

    if query.first_date.is_some() || query.last_date.is_some() {
        let mut range = Map::new();
        if let Some(first) = query.first_date {
            range.insert("gte".into(), Value::String(first.to_rfc3339()));
        }
        if let Some(last) = query.last_date {
            range.insert("lte".into(), Value::String(last.to_rfc3339()));
        }
        filter.push(json!({ "range": { "publish_date": range } }));
    }

    let mut sort = Map::new();
    sort.insert(
        sort_field(query.sort_by).into(),
        json!({ "order": sort_direction(query.sort_order) }),
    );

    let mut body = json!({
        "size": query.limit,
        "query": { "bool": { "must": must, "filter": filter } },
        "sort": [sort],
    });

    if query.highlight {
        body["highlight"] = json!({
            "fields": { "title": {}, "description": {}, "content": {} }
        });
    }

    body
}

impl ArticleSearch for ElasticArticleSearch {
    #[instrument(
        name = "elastic_query",
        skip(self, query),
        fields(limit = query.limit, sources = query.sources.len())
    )]
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>, ContractError> {
        let articles = self.search(query).await.map_err(BackendError::into_search)?;
        debug!(count = articles.len(), "Articles fetched");
        Ok(articles)
    }
}
