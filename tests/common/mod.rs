//! Fake remote retrieval engine served over real HTTP.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Canned failure: HTTP status plus a `detail` message.
pub type Failure = Option<(u16, &'static str)>;

// == Behaviour ==
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub healthy: bool,
    pub exists: bool,
    pub activate_status: &'static str,
    pub reactivate_status: &'static str,
    pub check_failure: Failure,
    pub activate_failure: Failure,
    pub upload_failure: Failure,
    /// Applied before answering uploads
    pub upload_delay: Duration,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            healthy: true,
            exists: false,
            activate_status: "activated_existing",
            reactivate_status: "reactivated",
            check_failure: None,
            activate_failure: None,
            upload_failure: None,
            upload_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub document_id: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

// == Recorded Traffic ==
#[derive(Default)]
pub struct Traffic {
    pub health: AtomicUsize,
    pub check: AtomicUsize,
    pub activate: AtomicUsize,
    pub upload: AtomicUsize,
    pub reactivate: AtomicUsize,
    pub sessions: Mutex<Vec<String>>,
    pub bearer: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<Upload>>,
}

impl Traffic {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        [
            &self.health,
            &self.check,
            &self.activate,
            &self.upload,
            &self.reactivate,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn observe(&self, headers: &HeaderMap) {
        if let Some(session) = headers.get("x-session-id").and_then(|v| v.to_str().ok()) {
            self.sessions.lock().unwrap().push(session.to_string());
        }
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.bearer.lock().unwrap().push(auth.to_string());
        }
    }
}

struct FakeState {
    behaviour: Behaviour,
    traffic: Arc<Traffic>,
}

type Shared = State<Arc<FakeState>>;

// == Fake Engine ==
pub struct FakeEngine {
    pub url: String,
    pub traffic: Arc<Traffic>,
}

impl FakeEngine {
    /// Binds an ephemeral port and serves until the test runtime ends.
    pub async fn start(behaviour: Behaviour) -> Self {
        let traffic = Arc::new(Traffic::default());
        let state = Arc::new(FakeState {
            behaviour,
            traffic: traffic.clone(),
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/check-document/:id", get(check_document))
            .route("/activate-document/:id", post(activate_document))
            .route("/upload-pdf", post(upload_pdf))
            .route("/reactivate-document/:id", post(reactivate_document))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            traffic,
        }
    }
}

fn failure_response(failure: (u16, &'static str)) -> Response {
    let status = StatusCode::from_u16(failure.0).unwrap();
    (status, Json(json!({ "detail": failure.1 }))).into_response()
}

async fn health(State(state): Shared, headers: HeaderMap) -> Response {
    state.traffic.observe(&headers);
    state.traffic.health.fetch_add(1, Ordering::SeqCst);
    if state.behaviour.healthy {
        Json(json!({ "status": "ok" })).into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn check_document(
    State(state): Shared,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.traffic.observe(&headers);
    state.traffic.check.fetch_add(1, Ordering::SeqCst);
    match state.behaviour.check_failure {
        Some(failure) => failure_response(failure),
        None => Json(json!({ "exists": state.behaviour.exists })).into_response(),
    }
}

async fn activate_document(
    State(state): Shared,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.traffic.observe(&headers);
    state.traffic.activate.fetch_add(1, Ordering::SeqCst);
    match state.behaviour.activate_failure {
        Some(failure) => failure_response(failure),
        None => Json(json!({ "status": state.behaviour.activate_status })).into_response(),
    }
}

async fn upload_pdf(State(state): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    state.traffic.observe(&headers);
    state.traffic.upload.fetch_add(1, Ordering::SeqCst);

    let mut upload = Upload {
        document_id: String::new(),
        file_name: None,
        content_type: None,
        size: 0,
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.size = field.bytes().await.unwrap().len();
            }
            "document_id" => upload.document_id = field.text().await.unwrap(),
            _ => {}
        }
    }

    if !state.behaviour.upload_delay.is_zero() {
        tokio::time::sleep(state.behaviour.upload_delay).await;
    }

    if let Some(failure) = state.behaviour.upload_failure {
        return failure_response(failure);
    }

    let document_id = upload.document_id.clone();
    state.traffic.uploads.lock().unwrap().push(upload);
    Json(json!({ "document_id": document_id, "status": "uploaded" })).into_response()
}

async fn reactivate_document(
    State(state): Shared,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.traffic.observe(&headers);
    state.traffic.reactivate.fetch_add(1, Ordering::SeqCst);
    let body: Value = json!({
        "status": state.behaviour.reactivate_status,
        "processing_time": 0.02,
    });
    Json(body).into_response()
}
