//! SlackConnector - one block message per article
//!
//! Every post goes through a rate-limit handler. A message whose image is
//! rejected (`invalid_blocks`) is resent with the logo as its image.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use contracts::{
    Article, Connector, ConnectorSettings, HookType, ProviderPayload, SecretUrl, SendReport,
};
use futures::future::join_all;
use regex_lite::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::http::{post_json, ProviderResponse};
use crate::metrics::ConnectorMetrics;

const DATE_FORMAT: &str = "%m/%d/%Y %H:%M";
const INVALID_BLOCKS: &str = "invalid_blocks";
const INIT_MESSAGE: &str = "Initializing webhook from OSINTer...";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://hooks\.slack\.com/services/T[a-zA-Z0-9]+/B[a-zA-Z0-9]+/[a-zA-Z0-9]+")
        .expect("valid slack url pattern")
});

/// Connector for Slack incoming webhooks
pub struct SlackConnector {
    client: Client,
    settings: Arc<ConnectorSettings>,
    metrics: Arc<ConnectorMetrics>,
    url_pattern: Regex,
}

impl SlackConnector {
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

    fn create_blocks(&self, article: &Article, feed_name: &str) -> Value {
        json!([
            {
                "type": "header",
                "text": { "type": "plain_text", "text": article.title },
            },
            {
                "type": "section",
                "text": { "type": "plain_text", "text": article.description },
            },
            {
                "type": "image",
                "image_url": article.image_url,
                "alt_text": "Article Image",
            },
            {
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "style": "primary",
                    "text": { "type": "plain_text", "text": "Go to article" },
                    "value": "article-link",
                    "url": self.settings.article_link(&article.id),
                }],
            },
            {
                "type": "context",
                "elements": [{
                    "type": "plain_text",
                    "text": format!(
                        "From \"{}\" | {}",
                        feed_name,
                        article.publish_date.format(DATE_FORMAT)
                    ),
                }],
            },
        ])
    }

    /// Post, sleeping through HTTP 429 responses up to the retry bound
    async fn post_rate_limited(
        &self,
        url: &str,
        message: &Value,
    ) -> Result<ProviderResponse, reqwest::Error> {
        let mut retries = 0;

        loop {
            let response = post_json(&self.client, url, message).await?;

            if response.status != StatusCode::TOO_MANY_REQUESTS
                || retries >= self.settings.slack_rate_limit_retries
            {
                return Ok(response);
            }

            retries += 1;
            self.metrics.inc_retry_count();
            let wait = backoff(
                response.retry_after,
                Duration::from_secs(self.settings.slack_max_retry_after_secs),
            );
            debug!(retries, wait_secs = wait.as_secs(), "Slack rate limited, backing off");
            tokio::time::sleep(wait).await;
        }
    }

    /// Deliver one message, with the image fallback on `invalid_blocks`
    async fn deliver(&self, url: &str, message: &Value) -> bool {
        let mut response = match self.post_rate_limited(url, message).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.inc_failure_count();
                warn!(error = %e, "Slack request failed");
                return false;
            }
        };

        if response.status == StatusCode::BAD_REQUEST && response.body.contains(INVALID_BLOCKS) {
            let fallback = replace_images(message, &self.settings.full_logo_url);

            for _ in 0..self.settings.slack_image_retries {
                self.metrics.inc_retry_count();
                response = match self.post_rate_limited(url, &fallback).await {
                    Ok(response) => response,
                    Err(e) => {
                        self.metrics.inc_failure_count();
                        warn!(error = %e, "Slack request failed during image fallback");
                        return false;
                    }
                };

                if response.status != StatusCode::BAD_REQUEST {
                    break;
                }
            }
        }

        if response.is_success() {
            self.metrics.inc_delivered_count();
            true
        } else {
            self.metrics.inc_failure_count();
            warn!(status = %response.status, body = %response.body, "Slack rejected message");
            false
        }
    }
}

/// Wait before retrying a 429: the server's `Retry-After` (1s if absent),
/// never longer than `cap`
fn backoff(retry_after: Option<Duration>, cap: Duration) -> Duration {
    retry_after.unwrap_or(Duration::from_secs(1)).min(cap)
}

/// Copy of a block message with every image block pointing at `logo_url`
fn replace_images(message: &Value, logo_url: &str) -> Value {
    let mut message = message.clone();

    if let Some(blocks) = message.get_mut("blocks").and_then(Value::as_array_mut) {
        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("image") {
                block["image_url"] = Value::String(logo_url.to_string());
            }
        }
    }

    message
}

#[async_trait]
impl Connector for SlackConnector {
    fn hook_type(&self) -> HookType {
        HookType::Slack
    }

    fn format(&self, articles: &[Article], feed_name: &str) -> ProviderPayload {
        let messages = articles
            .iter()
            .map(|article| json!({ "blocks": self.create_blocks(article, feed_name) }))
            .collect();

        ProviderPayload::new(messages)
    }

    #[instrument(
        name = "slack_send",
        skip(self, urls, payload),
        fields(urls = urls.len(), messages = payload.len())
    )]
    async fn send(&self, urls: &[SecretUrl], payload: &ProviderPayload) -> SendReport {
        let deliveries = urls.iter().flat_map(|url| {
            payload
                .messages
                .iter()
                .map(move |message| self.deliver(url.expose(), message))
        });

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
            "Slack send finished"
        );
        report
    }

    #[instrument(name = "slack_validate", skip(self, url))]
    async fn validate(&self, url: &str) -> bool {
        if !self.url_pattern.is_match(url) {
            return false;
        }

        let message = json!({ "text": INIT_MESSAGE });

        // initial attempt plus the configured retries
        for _ in 0..=self.settings.validate_attempts {
            match post_json(&self.client, url, &message).await {
                Ok(response) if response.status == StatusCode::OK => return true,
                Ok(response) => debug!(status = %response.status, "Slack validation attempt failed"),
                Err(e) => debug!(error = %e, "Slack validation request failed"),
            }
        }

        false
    }
}
