//! Typed HTTP client for the task server.
//!
//! CLI subcommands (`taskd add`, `taskd list`, etc.) use this to reach a
//! running server; [`state::TaskBrowser`] builds an interactive view on top
//! of it.

pub mod state;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::tasks::model::{CreateTask, Task, UpdateTask};
use crate::tasks::query::{Selector, SortKey};

/// Where the CLI looks for the server when `--server` is not given.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3001";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("task not found")]
    NotFound,

    /// The server (or local validation) rejected the request as malformed.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The server answered with an unexpected status.
    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network failure. The request may never have reached the server, so
    /// callers must not assume a mutation was applied.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

// ─── List query ───────────────────────────────────────────────────────────────

/// Query-string parameters of `GET /tasks`. Unset fields are omitted from
/// the URL entirely.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Option<Selector>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
}

impl ListQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.to_string()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sortBy", sort_by.to_string()));
        }
        pairs
    }
}

// ─── TasksClient ──────────────────────────────────────────────────────────────

/// A thin typed wrapper over the REST endpoints.
#[derive(Debug, Clone)]
pub struct TasksClient {
    base_url: String,
    http: reqwest::Client,
}

impl TasksClient {
    /// Create a client targeting `base_url` (e.g. `http://127.0.0.1:3001`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is reachable (3-second timeout).
    pub async fn is_reachable(&self) -> bool {
        let probe = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(std::time::Duration::from_secs(3))
            .send();
        matches!(probe.await, Ok(resp) if resp.status().is_success())
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Task>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/tasks", self.base_url))
            .query(&query.to_pairs())
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Task, ClientError> {
        let resp = self
            .http
            .get(format!("{}/tasks/{id}", self.base_url))
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn create(&self, req: &CreateTask) -> Result<Task, ClientError> {
        let resp = self
            .http
            .post(format!("{}/tasks", self.base_url))
            .json(req)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn update(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, ClientError> {
        let resp = self
            .http
            .patch(format!("{}/tasks/{id}", self.base_url))
            .json(patch)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(format!("{}/tasks/{id}", self.base_url))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(resp).await)
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_from(resp).await)
        }
    }

    /// Map an error response onto the client taxonomy, pulling the message
    /// out of the `{"error": ...}` body when there is one.
    async fn error_from(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        let message = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| "request failed".to_string());
        if status == StatusCode::NOT_FOUND {
            ClientError::NotFound
        } else if status.is_client_error() {
            ClientError::Invalid(message)
        } else {
            ClientError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}
