//! HTTP request wrapper shared by every PractiCheck service call.
//!
//! The token is read from the `TokenStore` on each request, so a login or
//! logout performed anywhere is seen by all clones of the client without
//! re-wiring. Each call is sent exactly once; there is no retry.

use std::time::Duration;

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::TokenStore;

/// Method, body and extra headers for one call. Defaults to a bodiless GET.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header; a `Content-Type` here replaces the JSON default.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// API client for one PractiCheck service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: TokenStore,
}

impl ApiClient {
    /// Create a client for `base_url`. Without `timeout` the transport
    /// defaults apply.
    pub fn new(base_url: &str, store: TokenStore, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    /// Same connection pool and token store, different service.
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            store: self.store.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn build_headers(&self, extra: &HeaderMap) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in extra.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let token = self
            .store
            .token()
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Stored token is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error built from the body if not.
    async fn check_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_transport)?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::invalid_body(&body, &e))
    }

    /// Send one request and return the parsed JSON body.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let url = self.url(path);
        let headers = self.build_headers(&options.headers)?;

        let mut builder = self.client.request(options.method.clone(), &url).headers(headers);
        if let Some(ref body) = options.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
            builder = builder.body(bytes);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %options.method, url = %url, error = %e, "Request could not be sent");
                return Err(ApiError::from_transport(e));
            }
        };

        debug!(method = %options.method, url = %url, status = response.status().as_u16(), "Response received");
        Self::check_response(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(path, RequestOptions::get()).await?;
        decode(value)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let value = self.request(path, RequestOptions::post(encode(body)?)).await?;
        decode(value)
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let value = self.request(path, RequestOptions::put(encode(body)?)).await?;
        decode(value)
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(path, RequestOptions::delete()).await
    }
}

fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, StorageNamespace};
    use crate::models::User;
    use crate::test_support::{spawn_stub, StubResponse};
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()), StorageNamespace::Default)
    }

    fn student() -> User {
        serde_json::from_value(json!({"id": "1", "name": "A", "role": "student"})).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8001/", store(), None).unwrap();
        assert_eq!(client.url("/dashboard/stats"), "http://localhost:8001/dashboard/stats");
        assert_eq!(client.url("dashboard/stats"), "http://localhost:8001/dashboard/stats");
        assert_eq!(client.url("https://elsewhere/x"), "https://elsewhere/x");
    }

    #[tokio::test]
    async fn test_bearer_header_when_session_exists() {
        let stub = spawn_stub(StubResponse::json(200, json!({"ok": true}))).await;
        let store = store();
        store.save("tok1", &student()).unwrap();
        let client = ApiClient::new(&stub.base_url, store, None).unwrap();

        let body = client.request("/dashboard/stats", RequestOptions::get()).await.unwrap();

        assert_eq!(body, json!({"ok": true}));
        let seen = stub.last_request().unwrap();
        assert_eq!(seen.authorization.as_deref(), Some("Bearer tok1"));
        assert_eq!(seen.content_type.as_deref(), Some("application/json"));
        assert_eq!(seen.path, "/dashboard/stats");
    }

    #[tokio::test]
    async fn test_no_authorization_without_session() {
        let stub = spawn_stub(StubResponse::json(200, json!([]))).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        client.request("/universities", RequestOptions::get()).await.unwrap();

        assert_eq!(stub.last_request().unwrap().authorization, None);
    }

    #[tokio::test]
    async fn test_token_read_per_request() {
        let stub = spawn_stub(StubResponse::json(200, json!({}))).await;
        let store = store();
        let client = ApiClient::new(&stub.base_url, store.clone(), None).unwrap();

        client.request("/a", RequestOptions::get()).await.unwrap();
        assert_eq!(stub.last_request().unwrap().authorization, None);

        store.save("later", &student()).unwrap();
        client.request("/b", RequestOptions::get()).await.unwrap();
        assert_eq!(stub.last_request().unwrap().authorization.as_deref(), Some("Bearer later"));

        store.clear().unwrap();
        client.request("/c", RequestOptions::get()).await.unwrap();
        assert_eq!(stub.last_request().unwrap().authorization, None);
    }

    #[tokio::test]
    async fn test_content_type_override_and_body() {
        let stub = spawn_stub(StubResponse::json(201, json!({"id": "u1"}))).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let options = RequestOptions::post(json!({"name": "Strathmore"})).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.practicheck+json"),
        );
        let body = client.request("/dashboard/universities", options).await.unwrap();

        assert_eq!(body, json!({"id": "u1"}));
        let seen = stub.last_request().unwrap();
        assert_eq!(seen.method, "POST");
        assert_eq!(seen.content_type.as_deref(), Some("application/vnd.practicheck+json"));
        assert_eq!(seen.body, json!({"name": "Strathmore"}));
    }

    #[tokio::test]
    async fn test_error_carries_detail() {
        let stub = spawn_stub(StubResponse::json(401, json!({"detail": "Invalid credentials"}))).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let err = client.request("/auth/login", RequestOptions::post(json!({}))).await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_error_without_message_uses_status() {
        let stub = spawn_stub(StubResponse::text(500, "Internal Server Error")).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let err = client.request("/x", RequestOptions::get()).await.unwrap_err();

        assert_eq!(err.to_string(), "Request failed with status 500");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let stub = spawn_stub(StubResponse::text(204, "")).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let body = client.delete("/dashboard/alerts/a1").await.unwrap();
        assert_eq!(body, Value::Null);
        assert_eq!(stub.last_request().unwrap().method, "DELETE");
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_response() {
        let stub = spawn_stub(StubResponse::text(200, "<html>proxy page</html>")).await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let err = client.request("/x", RequestOptions::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_service_unavailable() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}", addr), store(), None).unwrap();
        let err = client.request("/health", RequestOptions::get()).await.unwrap_err();

        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_typed_get() {
        let stub = spawn_stub(StubResponse::json(
            200,
            json!([{"id": "u1", "name": "Strathmore", "location": "Nairobi"}]),
        ))
        .await;
        let client = ApiClient::new(&stub.base_url, store(), None).unwrap();

        let unis: Vec<crate::models::UniversityInfo> = client.get("/universities").await.unwrap();
        assert_eq!(unis[0].name, "Strathmore");

        let err = client.get::<Vec<u32>>("/universities").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
