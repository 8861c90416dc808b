//! # Connectors
//!
//! Webhook 提供方适配模块。
//!
//! 负责：
//! - 将文章格式化为各平台原生消息（Discord / Slack / Teams）
//! - 尽力投递，单个目标失败不影响其他目标
//! - 校验 webhook URL 的格式与可达性

pub mod error;
pub mod http;
pub mod metrics;
pub mod providers;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use contracts::{Connector, ProviderPayload, SendReport};
pub use error::ConnectorError;
pub use http::build_client;
pub use metrics::{ConnectorMetrics, MetricsSnapshot};
pub use providers::{DiscordConnector, SlackConnector, TeamsConnector};
pub use registry::ConnectorRegistry;
