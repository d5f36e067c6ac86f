//! In-process stub of the PractiCheck services for tests.
//!
//! Binds an axum router on `127.0.0.1:0`, answers each path with a canned
//! response and records every request it sees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub content_type: &'static str,
}

impl StubResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "application/json",
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "text/plain",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    routes: Arc<HashMap<String, StubResponse>>,
    fallback: Option<StubResponse>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub struct Stub {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl Stub {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<SeenRequest> {
        self.seen.lock().unwrap().last().cloned()
    }
}

/// Every path gets the same response.
pub async fn spawn_stub(response: StubResponse) -> Stub {
    spawn(HashMap::new(), Some(response)).await
}

/// Per-path responses; unknown paths get a 404 with a `detail`.
pub async fn spawn_routes(routes: Vec<(&str, StubResponse)>) -> Stub {
    let routes = routes
        .into_iter()
        .map(|(path, response)| (path.to_string(), response))
        .collect();
    spawn(routes, None).await
}

async fn spawn(routes: HashMap<String, StubResponse>, fallback: Option<StubResponse>) -> Stub {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        routes: Arc::new(routes),
        fallback,
        seen: seen.clone(),
    };

    let app = Router::new().fallback(handle).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Stub {
        base_url: format!("http://{}", addr),
        seen,
    }
}

async fn handle(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.seen.lock().unwrap().push(SeenRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header_str(header::AUTHORIZATION),
        content_type: header_str(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let response = state
        .routes
        .get(uri.path())
        .cloned()
        .or_else(|| state.fallback.clone())
        .unwrap_or_else(|| StubResponse::json(404, serde_json::json!({"detail": "Not Found"})));

    (
        StatusCode::from_u16(response.status).unwrap(),
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}
