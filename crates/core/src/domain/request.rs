// Offline Request payload
// The common payload shape: an HTTP call captured while offline and replayed later.

use super::error::{DomainError, Result};
use super::operation::OperationPayload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// A request to replay against the backend once online
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineRequest {
    pub method: HttpMethod,
    /// Path relative to the delivery base URL (e.g. "/api/support/tickets")
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl OfflineRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with('/') {
            return Err(DomainError::ValidationError(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    pub fn into_payload(self) -> serde_json::Result<OperationPayload> {
        Ok(OperationPayload::new(serde_json::to_value(self)?))
    }

    pub fn from_payload(payload: &OperationPayload) -> serde_json::Result<Self> {
        Self::deserialize(payload.as_value())
    }
}
