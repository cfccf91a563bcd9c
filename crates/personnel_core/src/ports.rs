//! crates/personnel_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core logic depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the HTTP client and of where the session is persisted.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::domain::PersistedSession;
use crate::filter::QueryParams;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, disk).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Request rejected with status {0}: {1}")]
    Rejected(u16, String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Could not decode response: {0}")]
    Decode(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Request Description
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// One JSON request against the REST API, relative to the gateway's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::default(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The single authenticated request gateway every network effect goes through.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// Sends one request and returns the decoded JSON body (`Value::Null` for empty bodies).
    async fn send(&self, request: ApiRequest) -> PortResult<Value>;
}

/// Persistent client-side storage for the auth token and last-known identity.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<PersistedSession>;

    fn save(&self, session: &PersistedSession) -> PortResult<()>;

    /// Removes every persisted copy. Never fails; adapters log what they cannot delete.
    fn clear(&self);
}

/// A `TokenStore` that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<PersistedSession> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, session: &PersistedSession) -> PortResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
