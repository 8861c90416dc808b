//! TeamsConnector - adaptive cards posted to Power Automate workflows

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use contracts::{
    Article, Connector, ConnectorSettings, HookType, ProviderPayload, SecretUrl, SendReport,
};
use futures::future::join_all;
use regex_lite::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::http::post_json;
use crate::metrics::ConnectorMetrics;

const DATE_FORMAT: &str = "%m/%d/%Y %H:%M";
const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://prod-[0-9]+\.\w+\.logic\.azure\.com:443/workflows.*$")
        .expect("valid teams url pattern")
});

/// Connector for Teams workflow webhooks
pub struct TeamsConnector {
    client: Client,
    settings: Arc<ConnectorSettings>,
    metrics: Arc<ConnectorMetrics>,
    url_pattern: Regex,
}

impl TeamsConnector {
    pub fn new(
        client: Client,
        settings: Arc<ConnectorSettings>,
        metrics: Arc<ConnectorMetrics>,
    ) -> Self {
        Self {
            client,
            settings,
            metrics,
            url_pattern: URL_PATTERN.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_url_pattern(mut self, pattern: &str) -> Self {
        self.url_pattern = Regex::new(pattern).unwrap();
        self
    }

    fn create_card(&self, article: &Article, feed_name: &str) -> Value {
        json!({
            "$schema": CARD_SCHEMA,
            "type": "AdaptiveCard",
            "version": "1.3",
            "body": [
                {
                    "type": "TextBlock",
                    "text": article.title,
                    "wrap": true,
                    "size": "Large",
                    "weight": "Bolder",
                },
                {
                    "type": "TextBlock",
                    "text": article.description,
                    "wrap": true,
                },
                {
                    "type": "Image",
                    "url": article.image_url,
                },
                {
                    "type": "ColumnSet",
                    "columns": [
                        {
                            "type": "Column",
                            "width": "stretch",
                            "items": [{
                                "type": "TextBlock",
                                "text": format!("From \"{}\"", feed_name),
                                "wrap": true,
                                "isSubtle": true,
                            }],
                        },
                        {
                            "type": "Column",
                            "width": "stretch",
                            "items": [{
                                "type": "TextBlock",
                                "text": article.publish_date.format(DATE_FORMAT).to_string(),
                                "wrap": true,
                                "horizontalAlignment": "Right",
                                "isSubtle": true,
                            }],
                        },
                    ],
                },
            ],
            "selectAction": {
                "type": "Action.OpenUrl",
                "title": "Open Article",
                "url": self.settings.article_link(&article.id),
            },
        })
    }

    /// Post the message, retrying non-2xx answers up to the attempt bound
    async fn deliver(&self, url: &str, message: &Value) -> bool {
        let max_attempts = self.settings.teams_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.metrics.inc_retry_count();
            }

            match post_json(&self.client, url, message).await {
                Ok(response) if response.is_success() => {
                    self.metrics.inc_delivered_count();
                    return true;
                }
                Ok(response) => {
                    debug!(attempt, status = %response.status, "Teams rejected message");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Teams request failed");
                }
            }
        }

        self.metrics.inc_failure_count();
        warn!(attempts = max_attempts, "Giving up on Teams message");
        false
    }
}

#[async_trait]
impl Connector for TeamsConnector {
    fn hook_type(&self) -> HookType {
        HookType::Teams
    }

    /// One card per article, carried as a single message attachment list
    fn format(&self, articles: &[Article], feed_name: &str) -> ProviderPayload {
        let cards = articles
            .iter()
            .map(|article| self.create_card(article, feed_name))
            .collect();

        ProviderPayload::new(cards)
    }

    #[instrument(
        name = "teams_send",
        skip(self, urls, payload),
        fields(urls = urls.len(), cards = payload.len())
    )]
    async fn send(&self, urls: &[SecretUrl], payload: &ProviderPayload) -> SendReport {
        if payload.is_empty() {
            return SendReport::default();
        }

        let attachments: Vec<Value> = payload
            .messages
            .iter()
            .map(|card| json!({ "contentType": CARD_CONTENT_TYPE, "content": card }))
            .collect();
        let message = json!({ "type": "message", "attachments": attachments });

        let deliveries = urls.iter().map(|url| self.deliver(url.expose(), &message));

        let mut report = SendReport::default();
        for delivered in join_all(deliveries).await {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Teams send finished"
        );
        report
    }

    #[instrument(name = "teams_validate", skip(self, url))]
    async fn validate(&self, url: &str) -> bool {
        if !self.url_pattern.is_match(url) {
            return false;
        }

        let card = json!({
            "$schema": CARD_SCHEMA,
            "type": "AdaptiveCard",
            "version": "1.3",
            "body": [{
                "type": "TextBlock",
                "text": "Initializing webhook from OSINTer...",
                "wrap": true,
            }],
        });
        let message = json!({
            "type": "message",
            "attachments": [{ "contentType": CARD_CONTENT_TYPE, "content": card }],
        });

        for _ in 0..self.settings.validate_attempts.max(1) {
            match post_json(&self.client, url, &message).await {
                Ok(response) if response.is_success() => return true,
                Ok(response) => debug!(status = %response.status, "Teams validation attempt failed"),
                Err(e) => debug!(error = %e, "Teams validation request failed"),
            }
        }

        false
    }
}
