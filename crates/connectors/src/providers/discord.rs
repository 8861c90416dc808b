//! DiscordConnector - embed batches posted to Discord webhooks

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use contracts::{
    Article, Connector, ConnectorSettings, HookType, ProviderPayload, SecretUrl, SendReport,
};
use futures::future::join_all;
use regex_lite::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::http::post_json;
use crate::metrics::ConnectorMetrics;

/// Embed accent colour
const EMBED_COLOUR: u32 = 0xD4163C;
/// A batch is closed once it holds more than this many embeds
const MAX_BATCH_EMBEDS: usize = 9;
/// Cumulative embed text allowed in a single message
const MAX_BATCH_TEXT: usize = 6000;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"discord(?:app)?\.com/api/webhooks/(?P<id>[0-9]{17,20})/(?P<token>[A-Za-z0-9\.\-_]{60,})",
    )
    .expect("valid discord url pattern")
});

#[derive(Debug, Clone, Serialize)]
struct EmbedImage {
    url: String,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedFooter {
    text: String,
}

/// Discord embed
#[derive(Debug, Clone, Serialize)]
struct Embed {
    title: String,
    url: String,
    description: String,
    color: u32,
    timestamp: String,
    image: EmbedImage,
    footer: EmbedFooter,
}

impl Embed {
    /// Text length as counted by Discord's per-message embed limit
    fn text_len(&self) -> usize {
        self.title.chars().count()
            + self.description.chars().count()
            + self.footer.text.chars().count()
    }
}

/// Connector for Discord webhooks
pub struct DiscordConnector {
    client: Client,
    settings: Arc<ConnectorSettings>,
    metrics: Arc<ConnectorMetrics>,
    url_pattern: Regex,
}

impl DiscordConnector {
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

    fn create_embed(&self, article: &Article, feed_name: &str) -> Embed {
        Embed {
            title: article.title.clone(),
            url: self.settings.article_link(&article.id),
            description: format!("**{}**", article.description),
            color: EMBED_COLOUR,
            timestamp: article.publish_date.to_rfc3339(),
            image: EmbedImage {
                url: article.image_url.clone(),
            },
            footer: EmbedFooter {
                text: format!("From \"{}\"", feed_name),
            },
        }
    }

    /// Split embeds into messages under the count and text ceilings
    fn batch_embeds(embeds: Vec<Embed>) -> Vec<Vec<Embed>> {
        let mut batches: Vec<Vec<Embed>> = Vec::new();
        let mut batch: Vec<Embed> = Vec::new();
        let mut batch_len = 0;

        for embed in embeds {
            let embed_len = embed.text_len();

            if !batch.is_empty()
                && (embed_len + batch_len > MAX_BATCH_TEXT || batch.len() > MAX_BATCH_EMBEDS)
            {
                batches.push(std::mem::take(&mut batch));
                batch_len = 0;
            }

            batch.push(embed);
            batch_len += embed_len;
        }

        if !batch.is_empty() {
            batches.push(batch);
        }

        batches
    }

    async fn deliver(&self, url: &str, message: &serde_json::Value) -> bool {
        match post_json(&self.client, url, message).await {
            Ok(response) if response.is_success() => {
                self.metrics.inc_delivered_count();
                true
            }
            Ok(response) => {
                self.metrics.inc_failure_count();
                warn!(
                    status = %response.status,
                    body = %response.body,
                    "Discord rejected message"
                );
                false
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                warn!(error = %e, "Discord request failed");
                false
            }
        }
    }
}

#[async_trait]
impl Connector for DiscordConnector {
    fn hook_type(&self) -> HookType {
        HookType::Discord
    }

    fn format(&self, articles: &[Article], feed_name: &str) -> ProviderPayload {
        let embeds = articles
            .iter()
            .map(|article| self.create_embed(article, feed_name))
            .collect();

        let messages = Self::batch_embeds(embeds)
            .into_iter()
            .map(|embeds| {
                json!({
                    "username": self.settings.username,
                    "avatar_url": self.settings.small_logo_url,
                    "embeds": embeds,
                })
            })
            .collect();

        ProviderPayload::new(messages)
    }

    #[instrument(
        name = "discord_send",
        skip(self, urls, payload),
        fields(urls = urls.len(), messages = payload.len())
    )]
    async fn send(&self, urls: &[SecretUrl], payload: &ProviderPayload) -> SendReport {
        let mut report = SendReport::default();
        let mut deliveries = Vec::new();

        for url in urls {
            if !self.url_pattern.is_match(url.expose()) {
                self.metrics.inc_skipped_count();
                report.skipped_urls += 1;
                warn!("Skipping malformed Discord webhook URL");
                continue;
            }

            for message in &payload.messages {
                deliveries.push(self.deliver(url.expose(), message));
            }
        }

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
            "Discord send finished"
        );
        report
    }

    #[instrument(name = "discord_validate", skip(self, url))]
    async fn validate(&self, url: &str) -> bool {
        if !self.url_pattern.is_match(url) {
            return false;
        }

        // 4096 = SUPPRESS_NOTIFICATIONS
        let message = json!({
            "content": "Initializing webhook from OSINTer...",
            "username": self.settings.username,
            "avatar_url": self.settings.small_logo_url,
            "flags": 4096,
        });

        match post_json(&self.client, url, &message).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!(error = %e, "Discord validation request failed");
                false
            }
        }
    }
}
