//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, the concrete implementation of the
//! `ApiGateway` port from the core crate. It talks JSON to the personnel
//! backend using `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use personnel_core::ports::{ApiGateway, ApiRequest, Method, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ApiGateway` port over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Creates a new `HttpGateway` rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

//=========================================================================================
// `ApiGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn send(&self, request: ApiRequest) -> PortResult<Value> {
        let request_id = Uuid::new_v4();
        let url = self.url(&request.path);
        debug!(%request_id, method = request.method.as_str(), %url, "Sending request.");

        let mut builder = self.client.request(to_reqwest(request.method), &url);
        if !request.query.is_empty() {
            let pairs: Vec<(&str, &str)> = request.query.iter().collect();
            builder = builder.query(&pairs);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        debug!(%request_id, status = status.as_u16(), "Response received.");

        if !status.is_success() {
            let err = status_error(status, &text);
            warn!(%request_id, status = status.as_u16(), "Request failed: {}", err);
            return Err(err);
        }
        parse_body(&text)
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Maps a non-success status to the port error the core understands.
fn status_error(status: StatusCode, body: &str) -> PortError {
    let message = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::FORBIDDEN => PortError::Forbidden(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::Rejected(status.as_u16(), message),
    }
}

/// The backend reports errors as `{ "message": ... }`; anything else is passed on raw.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = doc.get(key) {
                return message.clone();
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Empty success bodies (e.g. from deletes) read as `null`.
fn parse_body(text: &str) -> PortResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| PortError::Decode(e.to_string()))
}
