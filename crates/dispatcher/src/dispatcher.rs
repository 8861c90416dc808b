//! Dispatcher - one dispatch run from feeds to committed cursors

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use connectors::ConnectorRegistry;
use contracts::{
    Article, ArticleSearch, Connector, EngineConfig, FetchFailure, Feed, FeedRepository,
    HookType, ProviderPayload, RunReport, SendOutcome, SendReport, Webhook,
};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::bindings::{resolve_bindings, Bindings};
use crate::commit::{CommitManager, PendingCursor};
use crate::cursor::resolve_new;
use crate::error::DispatchError;
use crate::fetcher::ArticleFetcher;

/// Feed with the articles to dispatch for it
struct FeedBatch {
    feed: Feed,
    articles: Vec<Article>,
}

/// Dispatch engine
///
/// Repository and search are injected; connectors come from the registry.
pub struct Dispatcher<R, S> {
    repository: Arc<R>,
    fetcher: Arc<ArticleFetcher<S>>,
    registry: Arc<ConnectorRegistry>,
    config: EngineConfig,
}

impl<R, S> Dispatcher<R, S>
where
    R: FeedRepository + Send + Sync + 'static,
    S: ArticleSearch + Send + Sync + 'static,
{
    pub fn new(
        repository: Arc<R>,
        search: Arc<S>,
        registry: ConnectorRegistry,
        config: EngineConfig,
    ) -> Self {
        let fetcher = Arc::new(ArticleFetcher::new(search, config.max_window));

        Self {
            repository,
            fetcher,
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Send new articles and advance cursors
    #[instrument(name = "dispatch_run", skip(self))]
    pub async fn run(&self) -> Result<RunReport, DispatchError> {
        self.execute(false).await
    }

    /// Resolve what would be sent, without sending or committing
    #[instrument(name = "dispatch_dry_run", skip(self))]
    pub async fn dry_run(&self) -> Result<RunReport, DispatchError> {
        self.execute(true).await
    }

    async fn execute(&self, dry_run: bool) -> Result<RunReport, DispatchError> {
        let started = Instant::now();
        let mut report = RunReport {
            dry_run,
            ..RunReport::default()
        };

        let webhooks: Vec<Webhook> = self
            .repository
            .get_all()
            .await
            .map_err(|e| DispatchError::load("webhooks", e))?;
        let feeds: Vec<Feed> = self
            .repository
            .get_all::<Feed>()
            .await
            .map_err(|e| DispatchError::load("feeds", e))?
            .into_iter()
            .filter(Feed::has_webhooks)
            .collect();
        report.feeds_considered = feeds.len();

        let bindings = resolve_bindings(&feeds, webhooks, &self.registry);
        let feeds: Vec<Feed> = feeds
            .into_iter()
            .filter(|feed| bindings.get(&feed.id).is_some())
            .collect();
        report.feeds_bound = feeds.len();

        info!(
            feeds = report.feeds_considered,
            bound = report.feeds_bound,
            dangling = bindings.dangling,
            unsupported = bindings.unsupported,
            "Feeds loaded"
        );

        let batches = self.collect_new_articles(feeds, &mut report).await;
        report.feeds_with_new_articles = batches.len();
        report.articles = batches.iter().map(|batch| batch.articles.len()).sum();

        if batches.is_empty() {
            info!("No new articles, nothing to dispatch");
            report.elapsed_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        if dry_run {
            report.planned_sends = self.log_planned_sends(&batches, &bindings);
            report.elapsed_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        report.sends = self.send_all(&batches, &bindings).await;

        let pending = batches
            .iter()
            .filter_map(|batch| {
                let newest = batch.articles.last()?;
                Some(PendingCursor::new(&batch.feed, newest.id.clone()))
            })
            .collect();
        let manager = CommitManager::new(
            Arc::clone(&self.repository),
            self.config.commit_max_attempts,
        );
        report.commit = Some(manager.commit(pending).await);

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        let totals = report.send_totals();
        info!(
            feeds = report.feeds_with_new_articles,
            articles = report.articles,
            delivered = totals.delivered,
            failed = totals.failed,
            elapsed_ms = report.elapsed_ms,
            "Dispatch run finished"
        );
        Ok(report)
    }

    /// Fetch and resolve every feed, at most `fetch_workers` at a time
    async fn collect_new_articles(
        &self,
        feeds: Vec<Feed>,
        report: &mut RunReport,
    ) -> Vec<FeedBatch> {
        let semaphore = Arc::new(Semaphore::new(self.config.fetch_workers.max(1)));
        let mut tasks = JoinSet::new();

        for feed in feeds {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = AssertUnwindSafe(fetcher.fetch_candidates(&feed))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(contracts::ContractError::Other(
                            "article fetch panicked".to_string(),
                        ))
                    });
                (feed, result)
            });
        }

        let mut batches = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((feed, Ok(candidates))) => match resolve_new(&feed, candidates) {
                    Some(articles) => {
                        debug!(feed_id = %feed.id, new = articles.len(), "New articles");
                        batches.push(FeedBatch { feed, articles });
                    }
                    None => debug!(feed_id = %feed.id, "No new articles"),
                },
                Ok((feed, Err(e))) => {
                    warn!(feed_id = %feed.id, error = %e, "Article fetch failed, skipping feed");
                    report.fetch_failures.push(FetchFailure {
                        feed_id: feed.id,
                        message: e.to_string(),
                    });
                }
                Err(e) => error!(error = %e, "Fetch task aborted"),
            }
        }

        // join order is completion order
        batches.sort_by_key(|batch| batch.feed.id);
        batches
    }

    fn log_planned_sends(&self, batches: &[FeedBatch], bindings: &Bindings) -> usize {
        let mut planned = 0;
        for batch in batches {
            for webhook in bindings.get(&batch.feed.id).unwrap_or_default() {
                info!(
                    feed_id = %batch.feed.id,
                    feed = %batch.feed.name,
                    webhook_id = %webhook.id,
                    hook_type = %webhook.hook_type,
                    articles = batch.articles.len(),
                    first = %batch.articles[0].id,
                    newest = batch.articles.last().map(|a| a.id.as_str()).unwrap_or_default(),
                    "Dry run: would dispatch"
                );
                planned += 1;
            }
        }
        planned
    }

    /// Format per (feed, provider) and send per (feed, webhook), bounded by
    /// `send_workers`
    async fn send_all(&self, batches: &[FeedBatch], bindings: &Bindings) -> Vec<SendOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.send_workers.max(1)));
        let mut tasks = JoinSet::new();

        for batch in batches {
            let Some(webhooks) = bindings.get(&batch.feed.id) else {
                continue;
            };

            let mut payloads: Vec<(HookType, Arc<ProviderPayload>)> = Vec::new();

            for webhook in webhooks {
                let Some(connector) = self.registry.get(&webhook.hook_type) else {
                    continue;
                };

                let payload = match payloads.iter().find(|(t, _)| *t == webhook.hook_type) {
                    Some((_, payload)) => Arc::clone(payload),
                    None => {
                        let payload =
                            Arc::new(connector.format(&batch.articles, &batch.feed.name));
                        payloads.push((webhook.hook_type.clone(), Arc::clone(&payload)));
                        payload
                    }
                };

                let semaphore = Arc::clone(&semaphore);
                let feed_id = batch.feed.id;
                let webhook = webhook.clone();

                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    send_one(connector, webhook, feed_id, payload).await
                });
            }
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Send task aborted"),
            }
        }

        outcomes.sort_by_key(|outcome| (outcome.feed_id, outcome.webhook_id));
        outcomes
    }
}

/// Send one payload to one webhook, turning a panic into a failed outcome
async fn send_one(
    connector: Arc<dyn Connector>,
    webhook: Webhook,
    feed_id: contracts::FeedId,
    payload: Arc<ProviderPayload>,
) -> SendOutcome {
    let urls = [webhook.url.clone()];
    let sent = AssertUnwindSafe(connector.send(&urls, &payload))
        .catch_unwind()
        .await;

    let (report, panicked) = match sent {
        Ok(report) => (report, false),
        Err(_) => {
            error!(
                feed_id = %feed_id,
                webhook_id = %webhook.id,
                hook_type = %webhook.hook_type,
                "Send task panicked"
            );
            (
                SendReport {
                    failed: 1,
                    ..SendReport::default()
                },
                true,
            )
        }
    };

    if !report.is_clean() {
        warn!(
            feed_id = %feed_id,
            webhook_id = %webhook.id,
            failed = report.failed,
            skipped = report.skipped_urls,
            "Webhook delivery incomplete"
        );
    }

    SendOutcome {
        feed_id,
        webhook_id: webhook.id,
        hook_type: webhook.hook_type,
        report,
        panicked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use backends::{MemoryFailures, MemoryRepository, MemorySearch};
    use chrono::{Duration, TimeZone, Utc};
    use contracts::{Article, SecretUrl};
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Clone, Copy, PartialEq)]
    enum Behaviour {
        Deliver,
        Fail,
        Panic,
    }

    /// Connector recording the article IDs it was asked to send
    struct RecordingConnector {
        hook_type: HookType,
        behaviour: Behaviour,
        sent: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingConnector {
        fn new(hook_type: HookType, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                hook_type,
                behaviour,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Vec<String>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        fn hook_type(&self) -> HookType {
            self.hook_type.clone()
        }

        fn format(&self, articles: &[Article], _feed_name: &str) -> ProviderPayload {
            ProviderPayload::new(articles.iter().map(|a| json!({ "id": a.id })).collect())
        }

        async fn send(&self, urls: &[SecretUrl], payload: &ProviderPayload) -> SendReport {
            if self.behaviour == Behaviour::Panic {
                panic!("connector exploded");
            }

            let ids = payload
                .messages
                .iter()
                .map(|m| m["id"].as_str().unwrap().to_string())
                .collect();
            self.sent.lock().unwrap().push(ids);

            let count = urls.len() as u32;
            match self.behaviour {
                Behaviour::Deliver => SendReport {
                    delivered: count,
                    ..Default::default()
                },
                _ => SendReport {
                    failed: count,
                    ..Default::default()
                },
            }
        }

        async fn validate(&self, _url: &str) -> bool {
            true
        }
    }

    fn article(n: i64) -> Article {
        Article {
            id: format!("A{n}"),
            publish_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(n),
            title: format!("Article {n}"),
            description: String::new(),
            image_url: String::new(),
            url: String::new(),
            author: None,
            profile: "example".into(),
            content: None,
        }
    }

    struct Fixture {
        repository: Arc<MemoryRepository>,
        search: Arc<MemorySearch>,
    }

    impl Fixture {
        fn new(articles: impl IntoIterator<Item = i64>) -> Self {
            Self {
                repository: Arc::new(MemoryRepository::new()),
                search: Arc::new(MemorySearch::new(articles.into_iter().map(article).collect())),
            }
        }

        fn webhook(&self, hook_type: HookType) -> Webhook {
            let webhook = Webhook::new("hook", Uuid::new_v4(), "https://example.com/h", hook_type);
            self.repository.insert(webhook.clone()).unwrap();
            webhook
        }

        fn feed(&self, cursor: &str, webhooks: &[&Webhook]) -> Feed {
            let mut feed = Feed::new("feed");
            feed.webhooks.last_article = cursor.into();
            feed.webhooks.hooks = webhooks.iter().map(|w| w.id).collect();
            self.repository.insert(feed.clone()).unwrap();
            feed
        }

        fn cursor(&self, feed: &Feed) -> String {
            self.repository.get::<Feed>(feed.id).unwrap().webhooks.last_article
        }

        fn dispatcher(
            &self,
            connectors: &[Arc<RecordingConnector>],
        ) -> Dispatcher<MemoryRepository, MemorySearch> {
            let mut registry = ConnectorRegistry::new();
            for connector in connectors {
                registry.register(Arc::clone(connector) as Arc<dyn Connector>);
            }
            Dispatcher::new(
                Arc::clone(&self.repository),
                Arc::clone(&self.search),
                registry,
                EngineConfig::default(),
            )
        }
    }

    #[tokio::test]
    async fn test_dispatches_articles_after_cursor_and_commits() {
        let fixture = Fixture::new(98..=102);
        let discord = RecordingConnector::new(HookType::Discord, Behaviour::Deliver);
        let webhook = fixture.webhook(HookType::Discord);
        let feed = fixture.feed("A100", &[&webhook]);

        let report = fixture.dispatcher(&[Arc::clone(&discord)]).run().await.unwrap();

        assert_eq!(discord.sent(), vec![vec!["A101".to_string(), "A102".to_string()]]);
        assert_eq!(report.articles, 2);
        assert_eq!(report.sends.len(), 1);
        assert_eq!(report.commit.as_ref().unwrap().committed, 1);
        assert_eq!(fixture.cursor(&feed), "A102");
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_second_run_without_new_articles_is_noop() {
        let fixture = Fixture::new(1..=5);
        let slack = RecordingConnector::new(HookType::Slack, Behaviour::Deliver);
        let webhook = fixture.webhook(HookType::Slack);
        let feed = fixture.feed("", &[&webhook]);
        let dispatcher = fixture.dispatcher(&[Arc::clone(&slack)]);

        let first = dispatcher.run().await.unwrap();
        assert_eq!(first.articles, 5);
        assert_eq!(fixture.cursor(&feed), "A5");

        let second = dispatcher.run().await.unwrap();
        assert_eq!(second.articles, 0);
        assert!(second.sends.is_empty());
        assert!(second.commit.is_none());
        assert_eq!(slack.sent().len(), 1);
        assert_eq!(fixture.repository.bulk_update_calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_connectors_do_not_block_others() {
        let fixture = Fixture::new(1..=3);
        let discord = RecordingConnector::new(HookType::Discord, Behaviour::Panic);
        let slack = RecordingConnector::new(HookType::Slack, Behaviour::Fail);
        let teams = RecordingConnector::new(HookType::Teams, Behaviour::Deliver);

        let hooks = [
            fixture.webhook(HookType::Discord),
            fixture.webhook(HookType::Slack),
            fixture.webhook(HookType::Teams),
        ];
        let feed = fixture.feed("A1", &hooks.iter().collect::<Vec<_>>());

        let report = fixture
            .dispatcher(&[discord, Arc::clone(&slack), Arc::clone(&teams)])
            .run()
            .await
            .unwrap();

        assert_eq!(report.sends.len(), 3);
        assert_eq!(report.sends.iter().filter(|s| s.panicked).count(), 1);
        let totals = report.send_totals();
        assert_eq!(totals.delivered, 1);
        assert_eq!(totals.failed, 2);
        assert_eq!(teams.sent(), vec![vec!["A2".to_string(), "A3".to_string()]]);
        assert_eq!(slack.sent().len(), 1);

        // delivery is fire-and-forget for the cursor
        assert_eq!(fixture.cursor(&feed), "A3");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated_per_feed() {
        let fixture = Fixture::new(1..=3);
        let teams = RecordingConnector::new(HookType::Teams, Behaviour::Deliver);
        let webhook = fixture.webhook(HookType::Teams);

        let healthy = fixture.feed("", &[&webhook]);
        let mut broken = Feed::new("broken");
        broken.search_term = Some("outage".into());
        broken.webhooks.hooks = vec![webhook.id];
        fixture.repository.insert(broken.clone()).unwrap();
        fixture.search.fail_on_term("outage");

        let report = fixture.dispatcher(&[teams]).run().await.unwrap();

        assert_eq!(report.fetch_failures.len(), 1);
        assert_eq!(report.fetch_failures[0].feed_id, broken.id);
        assert_eq!(fixture.cursor(&healthy), "A3");
        assert_eq!(fixture.cursor(&broken), "");
    }

    #[tokio::test]
    async fn test_dry_run_sends_and_commits_nothing() {
        let fixture = Fixture::new(1..=4);
        let discord = RecordingConnector::new(HookType::Discord, Behaviour::Deliver);
        let first = fixture.webhook(HookType::Discord);
        let second = fixture.webhook(HookType::Discord);
        let feed = fixture.feed("A2", &[&first, &second]);

        let report = fixture
            .dispatcher(&[Arc::clone(&discord)])
            .dry_run()
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.planned_sends, 2);
        assert_eq!(report.articles, 2);
        assert!(discord.sent().is_empty());
        assert!(report.commit.is_none());
        assert_eq!(fixture.cursor(&feed), "A2");
    }

    #[tokio::test]
    async fn test_unbound_feeds_are_not_fetched() {
        let fixture = Fixture::new(1..=3);
        let _no_hooks = fixture.feed("", &[]);
        let matrix = fixture.webhook(HookType::Other("matrix".into()));
        let _unsupported = fixture.feed("", &[&matrix]);

        let report = fixture
            .dispatcher(&[RecordingConnector::new(HookType::Slack, Behaviour::Deliver)])
            .run()
            .await
            .unwrap();

        assert_eq!(report.feeds_considered, 1);
        assert_eq!(report.feeds_bound, 0);
        assert!(fixture.search.queries().is_empty());
        assert_eq!(fixture.repository.bulk_update_calls(), 0);
    }

    #[tokio::test]
    async fn test_repository_outage_aborts_run() {
        let fixture = Fixture::new(1..=3);
        fixture.repository.set_failures(MemoryFailures {
            fail_reads: true,
            ..Default::default()
        });

        let err = fixture.dispatcher(&[]).run().await.unwrap_err();
        assert!(matches!(err, DispatchError::Load { what: "webhooks", .. }));
    }
}
