//! Local webhook receiver and fixtures for connector tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use contracts::Article;
use serde_json::Value;

#[derive(Default)]
struct ReceiverState {
    requests: Mutex<Vec<(String, Value)>>,
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    retry_after: &'static str,
}

/// Receiver answering with scripted responses, then `200 ok`
pub struct Receiver {
    pub base_url: String,
    state: Arc<ReceiverState>,
}

impl Receiver {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

pub async fn spawn_receiver(responses: Vec<(u16, &'static str)>) -> Receiver {
    spawn_receiver_with_retry_after(responses, "0").await
}

/// Receiver sending the given `Retry-After` value with every response
pub async fn spawn_receiver_with_retry_after(
    responses: Vec<(u16, &'static str)>,
    retry_after: &'static str,
) -> Receiver {
    let state = Arc::new(ReceiverState {
        requests: Mutex::new(Vec::new()),
        responses: Mutex::new(responses.into()),
        retry_after,
    });

    let app = Router::new()
        .route("/*path", post(handle))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Receiver {
        base_url: format!("http://{}", addr),
        state,
    }
}

async fn handle(
    State(state): State<Arc<ReceiverState>>,
    uri: axum::http::Uri,
    Json(body): Json<Value>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    state
        .requests
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));

    let (status, text) = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((200, "ok"));

    (
        StatusCode::from_u16(status).unwrap(),
        [(header::RETRY_AFTER, state.retry_after)],
        text,
    )
}

/// Article fixture with a description of the given length
pub fn article(id: &str, description_len: usize) -> Article {
    Article {
        id: id.to_string(),
        publish_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        title: format!("Title {id}"),
        description: "d".repeat(description_len),
        image_url: "https://img.example.com/a.png".into(),
        url: "https://news.example.com/a".into(),
        author: None,
        profile: "example".into(),
        content: None,
    }
}
