//! 内存后端
//!
//! 用于测试与离线运行的 `FeedRepository` / `ArticleSearch` 实现，
//! 支持注入失败场景（写冲突、读写错误、检索失败）。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    Article, ArticleQuery, ArticleSearch, ContractError, Document, FeedRepository, Revision,
    SortOrder, WriteResult,
};
use serde_json::Value;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::fixtures::Fixtures;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Next revision after `current` (`"<n>-mem"`)
fn next_revision(current: Option<&str>) -> Revision {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    Revision::new(format!("{}-mem", generation + 1))
}

/// 仓库失败注入配置
#[derive(Debug, Default, Clone)]
pub struct MemoryFailures {
    /// 写入时返回冲突的文档 ID 及剩余冲突次数
    pub conflicts: HashMap<Uuid, u32>,
    /// 每次批量写入额外返回的失败结果 ID（可不是 UUID）
    pub extra_failed_ids: Vec<String>,
    /// 所有读取返回错误
    pub fail_reads: bool,
    /// 所有批量写入返回错误
    pub fail_writes: bool,
}

impl MemoryFailures {
    /// Writes of `id` always conflict
    pub fn always_conflict(mut self, id: Uuid) -> Self {
        self.conflicts.insert(id, u32::MAX);
        self
    }

    /// Writes of `id` conflict `times` times, then go through
    pub fn conflict_times(mut self, id: Uuid, times: u32) -> Self {
        self.conflicts.insert(id, times);
        self
    }
}

/// 内存文档仓库
///
/// 以 `(type, _id)` 为键保存原始 JSON，按修订号做乐观并发检查。
#[derive(Default)]
pub struct MemoryRepository {
    documents: Mutex<BTreeMap<(&'static str, Uuid), Value>>,
    failures: Mutex<MemoryFailures>,
    bulk_update_calls: AtomicU32,
    get_by_keys_calls: AtomicU32,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用失败注入配置创建仓库
    pub fn with_failures(failures: MemoryFailures) -> Self {
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }

    pub fn from_fixtures(fixtures: &Fixtures) -> Result<Self, ContractError> {
        let repository = Self::new();
        for feed in &fixtures.feeds {
            repository.insert(feed.clone())?;
        }
        for webhook in &fixtures.webhooks {
            repository.insert(webhook.clone())?;
        }
        Ok(repository)
    }

    pub fn set_failures(&self, failures: MemoryFailures) {
        *lock(&self.failures) = failures;
    }

    /// Store a document as-is, bypassing the revision check
    ///
    /// A document without revision is stored at `1-mem`.
    pub fn insert<D: Document>(&self, document: D) -> Result<(), ContractError> {
        let mut value = serde_json::to_value(&document)
            .map_err(|e| ContractError::repository(e.to_string()))?;
        if document.revision().is_empty() {
            value["_rev"] = Value::String(next_revision(None).to_string());
        }

        lock(&self.documents).insert((D::KIND.as_str(), document.id()), value);
        Ok(())
    }

    /// Current stored version of a document
    pub fn get<D: Document>(&self, id: Uuid) -> Option<D> {
        let documents = lock(&self.documents);
        let value = documents.get(&(D::KIND.as_str(), id))?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn bulk_update_calls(&self) -> u32 {
        self.bulk_update_calls.load(Ordering::SeqCst)
    }

    pub fn get_by_keys_calls(&self) -> u32 {
        self.get_by_keys_calls.load(Ordering::SeqCst)
    }

    fn ensure_readable(&self) -> Result<(), ContractError> {
        if lock(&self.failures).fail_reads {
            Err(ContractError::repository("memory repository unavailable"))
        } else {
            Ok(())
        }
    }

    /// Consume one injected conflict for `id`, if any
    fn take_conflict(failures: &mut MemoryFailures, id: &Uuid) -> bool {
        match failures.conflicts.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

fn decode<D: Document>(value: &Value) -> Option<D> {
    match serde_json::from_value(value.clone()) {
        Ok(document) => Some(document),
        Err(e) => {
            error!(kind = %D::KIND, error = %e, "Skipping malformed document");
            None
        }
    }
}

impl FeedRepository for MemoryRepository {
    #[instrument(name = "memory_get_all", skip(self), fields(kind = %D::KIND))]
    async fn get_all<D: Document>(&self) -> Result<Vec<D>, ContractError> {
        self.ensure_readable()?;

        let documents = lock(&self.documents);
        Ok(documents
            .iter()
            .filter(|((kind, _), _)| *kind == D::KIND.as_str())
            .filter_map(|(_, value)| decode(value))
            .collect())
    }

    #[instrument(name = "memory_get_by_keys", skip(self, ids), fields(kind = %D::KIND))]
    async fn get_by_keys<D: Document>(&self, ids: &[Uuid]) -> Result<Vec<D>, ContractError> {
        self.get_by_keys_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_readable()?;

        let documents = lock(&self.documents);
        Ok(ids
            .iter()
            .filter_map(|id| documents.get(&(D::KIND.as_str(), *id)))
            .filter_map(decode)
            .collect())
    }

    #[instrument(
        name = "memory_bulk_update",
        skip(self, documents),
        fields(kind = %D::KIND, documents = documents.len())
    )]
    async fn bulk_update<D: Document>(
        &self,
        documents: Vec<D>,
    ) -> Result<Vec<WriteResult>, ContractError> {
        self.bulk_update_calls.fetch_add(1, Ordering::SeqCst);

        let mut failures = lock(&self.failures);
        if failures.fail_writes {
            return Err(ContractError::repository("memory repository rejected write"));
        }

        let mut stored = lock(&self.documents);
        let mut results = Vec::with_capacity(documents.len());

        for document in documents {
            let id = document.id();
            let key = (D::KIND.as_str(), id);
            let current_rev = stored
                .get(&key)
                .and_then(|value| value.get("_rev"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let stale = current_rev.as_deref().unwrap_or("") != document.revision().as_str();
            if stale || Self::take_conflict(&mut failures, &id) {
                results.push(WriteResult::failed(id.to_string(), "conflict"));
                continue;
            }

            let mut value = serde_json::to_value(&document)
                .map_err(|e| ContractError::repository(e.to_string()))?;
            let revision = next_revision(current_rev.as_deref());
            value["_rev"] = Value::String(revision.to_string());
            stored.insert(key, value);

            results.push(WriteResult::ok(id.to_string(), revision));
        }

        results.extend(
            failures
                .extra_failed_ids
                .iter()
                .map(|id| WriteResult::failed(id.clone(), "conflict")),
        );

        Ok(results)
    }
}

/// 内存文章检索
#[derive(Default)]
pub struct MemorySearch {
    articles: Mutex<Vec<Article>>,
    /// 检索词命中时返回错误
    fail_terms: Mutex<HashSet<String>>,
    queries: Mutex<Vec<ArticleQuery>>,
}

impl MemorySearch {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles: Mutex::new(articles),
            ..Self::default()
        }
    }

    pub fn from_fixtures(fixtures: &Fixtures) -> Self {
        Self::new(fixtures.articles.clone())
    }

    /// Add articles, as the ingestion side would between runs
    pub fn extend(&self, articles: impl IntoIterator<Item = Article>) {
        lock(&self.articles).extend(articles);
    }

    /// Fail every query whose search term equals `term`
    pub fn fail_on_term(&self, term: impl Into<String>) {
        lock(&self.fail_terms).insert(term.into());
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<ArticleQuery> {
        lock(&self.queries).clone()
    }

    fn matches(query: &ArticleQuery, article: &Article) -> bool {
        if let Some(ids) = &query.ids {
            if !ids.contains(&article.id) {
                return false;
            }
        }

        if !query.sources.is_empty() && !query.sources.contains(&article.profile) {
            return false;
        }

        if query.first_date.is_some_and(|first| article.publish_date < first)
            || query.last_date.is_some_and(|last| article.publish_date > last)
        {
            return false;
        }

        match query.search_term.as_deref().filter(|t| !t.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                article.title.to_lowercase().contains(&term)
                    || article.description.to_lowercase().contains(&term)
                    || article
                        .content
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

impl ArticleSearch for MemorySearch {
    #[instrument(name = "memory_query", skip(self, query), fields(limit = query.limit))]
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>, ContractError> {
        lock(&self.queries).push(query.clone());

        if let Some(term) = &query.search_term {
            if lock(&self.fail_terms).contains(term) {
                return Err(ContractError::search(format!(
                    "memory search failure for '{}'",
                    term
                )));
            }
        }

        // every sort field is approximated by publish date
        let mut articles: Vec<Article> = lock(&self.articles)
            .iter()
            .filter(|article| Self::matches(query, article))
            .cloned()
            .collect();
        articles.sort_by_key(|article| article.publish_date);
        if query.sort_order == SortOrder::Desc {
            articles.reverse();
        }
        articles.truncate(query.limit as usize);

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use contracts::{Feed, HookType, Webhook};

    fn article(n: u32) -> Article {
        Article {
            id: format!("A{n}"),
            publish_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::hours(n as i64),
            title: format!("Article {n}"),
            description: String::new(),
            image_url: String::new(),
            url: String::new(),
            author: None,
            profile: if n % 2 == 0 { "even" } else { "odd" }.into(),
            content: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_revision() {
        let repository = MemoryRepository::new();
        let feed = Feed::new("a");
        repository.insert(feed.clone()).unwrap();

        let stored: Feed = repository.get(feed.id).unwrap();
        assert_eq!(stored.rev.as_str(), "1-mem");

        let feeds: Vec<Feed> = repository.get_all().await.unwrap();
        assert_eq!(feeds.len(), 1);
        let webhooks: Vec<Webhook> = repository.get_all().await.unwrap();
        assert!(webhooks.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_update_checks_revision() {
        let repository = MemoryRepository::new();
        let feed = Feed::new("a");
        repository.insert(feed.clone()).unwrap();

        let mut fresh: Feed = repository.get(feed.id).unwrap();
        fresh.webhooks.last_article = "A2".into();
        let results = repository.bulk_update(vec![fresh.clone()]).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].revision, Some(Revision::new("2-mem")));

        // same (now stale) revision again
        let results = repository.bulk_update(vec![fresh]).await.unwrap();
        assert!(results[0].is_conflict());
        assert_eq!(repository.bulk_update_calls(), 2);

        let stored: Feed = repository.get(feed.id).unwrap();
        assert_eq!(stored.cursor(), Some("A2"));
    }

    #[tokio::test]
    async fn test_injected_conflicts() {
        let feed = Feed::new("a");
        let repository =
            MemoryRepository::with_failures(MemoryFailures::default().conflict_times(feed.id, 1));
        repository.insert(feed.clone()).unwrap();

        let stored: Feed = repository.get(feed.id).unwrap();
        let first = repository.bulk_update(vec![stored.clone()]).await.unwrap();
        assert!(first[0].is_conflict());

        let second = repository.bulk_update(vec![stored]).await.unwrap();
        assert!(second[0].success);
    }

    #[tokio::test]
    async fn test_get_by_keys_skips_missing_and_other_kinds() {
        let repository = MemoryRepository::new();
        let webhook = Webhook::new("w", Uuid::new_v4(), "https://x", HookType::Discord);
        repository.insert(webhook.clone()).unwrap();

        let feeds: Vec<Feed> = repository
            .get_by_keys(&[webhook.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert!(feeds.is_empty());

        let webhooks: Vec<Webhook> = repository.get_by_keys(&[webhook.id]).await.unwrap();
        assert_eq!(webhooks.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let repository = MemoryRepository::with_failures(MemoryFailures {
            fail_reads: true,
            ..Default::default()
        });
        assert!(repository.get_all::<Feed>().await.is_err());
    }

    #[tokio::test]
    async fn test_search_sorts_filters_and_caps() {
        let search = MemorySearch::new((1..=10).map(article).collect());

        let articles = search
            .query(&ArticleQuery {
                sources: vec!["even".into()],
                limit: 3,
                ..Default::default()
            })
            .await
            .unwrap();

        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A10", "A8", "A6"]);
        assert_eq!(search.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_search_failure_injection() {
        let search = MemorySearch::new(vec![article(1)]);
        search.fail_on_term("boom");

        let err = search
            .query(&ArticleQuery {
                search_term: Some("boom".into()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Search { .. }));
    }
}
