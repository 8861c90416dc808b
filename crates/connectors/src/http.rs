//! Shared HTTP plumbing for provider calls

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::ConnectorError;

/// Build the client shared by every connector
pub fn build_client(request_timeout: Duration) -> Result<Client, ConnectorError> {
    Ok(Client::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout)
        .user_agent(concat!("feed-dispatch/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Provider response, body read eagerly
#[derive(Debug, Clone)]
pub(crate) struct ProviderResponse {
    pub status: StatusCode,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// POST a JSON body and read the full response
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    body: &Value,
) -> Result<ProviderResponse, reqwest::Error> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Ok(ProviderResponse {
        status,
        body,
        retry_after,
    })
}
