//! 测试辅助：本地 Webhook 接收端与数据构造

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, TimeZone, Utc};
use contracts::{Article, Feed, HookType, Webhook};
use serde_json::Value;
use uuid::Uuid;

#[derive(Default)]
struct ReceiverState {
    requests: Mutex<Vec<(String, Value)>>,
    statuses: Mutex<VecDeque<u16>>,
}

/// Local webhook endpoint recording every POST
pub struct Receiver {
    base_url: String,
    state: Arc<ReceiverState>,
}

impl Receiver {
    /// Endpoint answering `200 ok`
    pub async fn accepting() -> Self {
        Self::spawn(Vec::new()).await
    }

    /// Endpoint answering with `statuses` first, then `200 ok`
    pub async fn spawn(statuses: Vec<u16>) -> Self {
        let state = Arc::new(ReceiverState {
            requests: Mutex::new(Vec::new()),
            statuses: Mutex::new(statuses.into()),
        });

        let app = Router::new()
            .route("/*path", post(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, body)| body)
            .collect()
    }
}

async fn handle(
    State(state): State<Arc<ReceiverState>>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    state
        .requests
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));

    let status = state.statuses.lock().unwrap().pop_front().unwrap_or(200);
    (StatusCode::from_u16(status).unwrap(), "ok")
}

/// Article `A{n}`, published `n` minutes after a fixed epoch
pub fn article(n: i64) -> Article {
    Article {
        id: format!("A{n}"),
        publish_date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(n),
        title: format!("Article {n}"),
        description: format!("Summary of article {n}"),
        image_url: "https://img.example.com/a.png".into(),
        url: format!("https://news.example.com/{n}"),
        author: None,
        profile: "example".into(),
        content: None,
    }
}

pub fn webhook(hook_type: HookType, url: String) -> Webhook {
    Webhook::new(format!("{hook_type} hook"), Uuid::new_v4(), url, hook_type)
}

pub fn feed(name: &str, cursor: &str, hooks: &[&Webhook]) -> Feed {
    let mut feed = Feed::new(name);
    feed.webhooks.last_article = cursor.to_string();
    feed.webhooks.hooks = hooks.iter().map(|w| w.id).collect();
    feed
}
