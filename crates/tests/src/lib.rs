//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 内存后端 + 真实连接器 + 本地接收端的 e2e 测试
//! - 配置文件 + fixtures 驱动的 dry run

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::{Feed, HookType, Webhook};

    #[test]
    fn test_unknown_hook_type_survives_round_trip() {
        let webhook = Webhook::new(
            "matrix",
            uuid::Uuid::new_v4(),
            "https://matrix.example.com/hook",
            HookType::from("matrix"),
        );
        let json = serde_json::to_value(&webhook).unwrap();
        assert_eq!(json["hook_type"], "matrix");
        assert_eq!(json["type"], "webhook");

        let decoded: Webhook = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.hook_type, HookType::Other("matrix".into()));
    }

    #[test]
    fn test_feed_document_shape() {
        let mut feed = Feed::new("ransomware");
        feed.webhooks.last_article = "A100".into();

        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(json["type"], "feed");
        assert_eq!(json["webhooks"]["last_article"], "A100");
        assert!(json.get("_rev").is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use backends::{MemoryRepository, MemorySearch};
    use connectors::ConnectorRegistry;
    use contracts::{ConnectorSettings, EngineConfig, Feed, HookType};
    use dispatcher::Dispatcher;
    use observability::RunSummary;

    use crate::support::{article, feed, webhook, Receiver};

    fn dispatcher(
        repository: &Arc<MemoryRepository>,
        search: &Arc<MemorySearch>,
    ) -> Dispatcher<MemoryRepository, MemorySearch> {
        let registry = ConnectorRegistry::from_settings(&ConnectorSettings::default()).unwrap();
        Dispatcher::new(
            Arc::clone(repository),
            Arc::clone(search),
            registry,
            EngineConfig::default(),
        )
    }

    fn title_of_teams_card(card: &serde_json::Value) -> &str {
        card["content"]["body"][0]["text"].as_str().unwrap()
    }

    /// End-to-end: cursor A100, window A98..A102 -> A101 and A102 delivered
    /// to Slack and Teams, cursor advanced to A102
    #[tokio::test]
    async fn test_e2e_dispatch_and_idempotent_rerun() {
        let receiver = Receiver::accepting().await;
        let slack = webhook(HookType::Slack, receiver.url("/slack"));
        let teams = webhook(HookType::Teams, receiver.url("/teams"));
        let feed = feed("ransomware", "A100", &[&slack, &teams]);

        let repository = Arc::new(MemoryRepository::new());
        repository.insert(feed.clone()).unwrap();
        repository.insert(slack).unwrap();
        repository.insert(teams).unwrap();
        let search = Arc::new(MemorySearch::new((98..=102).map(article).collect()));

        let dispatcher = dispatcher(&repository, &search);
        let report = dispatcher.run().await.unwrap();

        assert_eq!(report.articles, 2);
        assert_eq!(report.sends.len(), 2);
        let totals = report.send_totals();
        assert_eq!(totals.delivered, 3);
        assert_eq!(totals.failed, 0);
        assert!(report.is_clean());

        let mut slack_titles: Vec<String> = receiver
            .requests_to("/slack")
            .iter()
            .map(|body| body["blocks"][0]["text"]["text"].as_str().unwrap().to_string())
            .collect();
        slack_titles.sort();
        assert_eq!(slack_titles, vec!["Article 101", "Article 102"]);

        let teams_requests = receiver.requests_to("/teams");
        assert_eq!(teams_requests.len(), 1);
        let cards = teams_requests[0]["attachments"].as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(title_of_teams_card(&cards[0]), "Article 101");
        assert_eq!(title_of_teams_card(&cards[1]), "Article 102");

        let stored: Feed = repository.get(feed.id).unwrap();
        assert_eq!(stored.webhooks.last_article, "A102");
        assert_eq!(report.commit.as_ref().unwrap().committed, 1);

        let summary = RunSummary::from(&report).to_string();
        assert!(summary.contains("Dispatch Run Summary"));

        // nothing new: no request, no commit
        let rerun = dispatcher.run().await.unwrap();
        assert!(rerun.sends.is_empty());
        assert_eq!(rerun.articles, 0);
        assert_eq!(receiver.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_e2e_failing_provider_does_not_block_others() {
        let broken = Receiver::spawn(vec![500; 8]).await;
        let healthy = Receiver::accepting().await;
        let slack = webhook(HookType::Slack, broken.url("/slack"));
        let teams = webhook(HookType::Teams, healthy.url("/teams"));
        let feed = feed("phishing", "", &[&slack, &teams]);

        let repository = Arc::new(MemoryRepository::new());
        repository.insert(feed.clone()).unwrap();
        repository.insert(slack.clone()).unwrap();
        repository.insert(teams.clone()).unwrap();
        let search = Arc::new(MemorySearch::new((1..=2).map(article).collect()));

        let report = dispatcher(&repository, &search).run().await.unwrap();

        let slack_outcome = report
            .sends
            .iter()
            .find(|outcome| outcome.webhook_id == slack.id)
            .unwrap();
        assert_eq!(slack_outcome.report.failed, 2);

        let teams_outcome = report
            .sends
            .iter()
            .find(|outcome| outcome.webhook_id == teams.id)
            .unwrap();
        assert_eq!(teams_outcome.report.delivered, 1);
        assert_eq!(healthy.requests_to("/teams").len(), 1);
        assert!(!report.is_clean());

        // delivery is best effort, the cursor still advances
        let stored: Feed = repository.get(feed.id).unwrap();
        assert_eq!(stored.webhooks.last_article, "A2");
    }

    #[tokio::test]
    async fn test_e2e_malformed_discord_url_is_skipped() {
        let receiver = Receiver::accepting().await;
        let discord = webhook(HookType::Discord, receiver.url("/api/webhooks/1/token"));
        let feed = feed("malware", "", &[&discord]);

        let repository = Arc::new(MemoryRepository::new());
        repository.insert(feed.clone()).unwrap();
        repository.insert(discord).unwrap();
        let search = Arc::new(MemorySearch::new(vec![article(1)]));

        let report = dispatcher(&repository, &search).run().await.unwrap();

        assert_eq!(report.send_totals().skipped_urls, 1);
        assert!(receiver.requests().is_empty());
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use backends::{Fixtures, RepositoryBackend, SearchBackend};
    use config_loader::ConfigLoader;
    use connectors::ConnectorRegistry;
    use contracts::{BackendKind, Feed, FeedRepository, HookType};
    use dispatcher::Dispatcher;

    use crate::support::{article, feed, webhook, Receiver};

    /// Config file + fixtures file -> dry run plans sends without sending
    #[tokio::test]
    async fn test_dry_run_from_config_file() {
        let receiver = Receiver::accepting().await;
        let slack = webhook(HookType::Slack, receiver.url("/slack"));
        let teams = webhook(HookType::Teams, receiver.url("/teams"));
        let feed = feed("ransomware", "A3", &[&slack, &teams]);

        let dir = tempfile::tempdir().unwrap();
        let fixtures = Fixtures {
            feeds: vec![feed.clone()],
            webhooks: vec![slack, teams],
            articles: (1..=5).map(article).collect(),
        };
        std::fs::write(
            dir.path().join("fixtures.json"),
            serde_json::to_string(&fixtures).unwrap(),
        )
        .unwrap();

        let config_path = dir.path().join("dispatch.toml");
        std::fs::write(
            &config_path,
            r#"
[repository]
kind = "memory"
fixtures = "fixtures.json"

[search]
kind = "memory"
fixtures = "fixtures.json"

[engine]
fetch_workers = 2
send_workers = 2
"#,
        )
        .unwrap();

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        assert_eq!(blueprint.repository.kind, BackendKind::Memory);

        let repository = Arc::new(RepositoryBackend::from_config(&blueprint.repository).unwrap());
        let search = Arc::new(SearchBackend::from_config(&blueprint.search).unwrap());
        let registry = ConnectorRegistry::from_settings(&blueprint.connectors).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::clone(&repository),
            search,
            registry,
            blueprint.engine.clone(),
        );

        let report = dispatcher.dry_run().await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.articles, 2);
        assert_eq!(report.planned_sends, 2);
        assert!(report.sends.is_empty());
        assert!(report.commit.is_none());
        assert!(receiver.requests().is_empty());

        let feeds: Vec<Feed> = repository.get_all().await.unwrap();
        assert_eq!(feeds[0].webhooks.last_article, "A3");
    }
}
