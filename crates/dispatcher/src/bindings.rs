//! Webhook Binding Resolver - feed → usable webhooks

use std::collections::{BTreeMap, HashMap, HashSet};

use connectors::ConnectorRegistry;
use contracts::{Feed, FeedId, Webhook, WebhookId};
use tracing::{error, warn};

/// Webhooks to dispatch to, per feed
#[derive(Debug, Default)]
pub struct Bindings {
    pub by_feed: BTreeMap<FeedId, Vec<Webhook>>,
    /// Feed references to webhooks that do not exist
    pub dangling: usize,
    /// Webhooks skipped because their hook type has no connector
    pub unsupported: usize,
}

impl Bindings {
    pub fn get(&self, feed_id: &FeedId) -> Option<&[Webhook]> {
        self.by_feed.get(feed_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_feed.is_empty()
    }
}

/// Resolve every feed's hook IDs to dispatchable webhooks
///
/// Dangling references and webhooks of unsupported types are logged and
/// skipped. Feeds left without a webhook are omitted.
pub fn resolve_bindings(
    feeds: &[Feed],
    webhooks: Vec<Webhook>,
    registry: &ConnectorRegistry,
) -> Bindings {
    let index: HashMap<WebhookId, Webhook> =
        webhooks.into_iter().map(|webhook| (webhook.id, webhook)).collect();

    let mut bindings = Bindings::default();
    let mut reported_unsupported: HashSet<WebhookId> = HashSet::new();

    for feed in feeds {
        let mut bound = Vec::new();

        for hook_id in &feed.webhooks.hooks {
            let Some(webhook) = index.get(hook_id) else {
                error!(feed_id = %feed.id, webhook_id = %hook_id, "Feed references missing webhook");
                bindings.dangling += 1;
                continue;
            };

            if !registry.supports(&webhook.hook_type) {
                if reported_unsupported.insert(webhook.id) {
                    error!(
                        webhook_id = %webhook.id,
                        hook_type = %webhook.hook_type,
                        "Unsupported webhook type, skipping"
                    );
                    bindings.unsupported += 1;
                }
                continue;
            }

            if !webhook.attached_feeds.is_empty() && !webhook.attached_feeds.contains(&feed.id) {
                warn!(
                    feed_id = %feed.id,
                    webhook_id = %webhook.id,
                    "Webhook does not list the feed it is attached to"
                );
            }

            bound.push(webhook.clone());
        }

        if !bound.is_empty() {
            bindings.by_feed.insert(feed.id, bound);
        }
    }

    bindings
}
