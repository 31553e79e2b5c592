// HTTP delivery
// Replays OfflineRequest payloads against a backend base URL.
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use deferq_core::domain::{HttpMethod, OfflineRequest, QueuedOperation};
use deferq_core::port::{Delivery, DeliveryError};

/// Header carrying the operation id, so the backend can de-duplicate replays
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Header carrying the caller's correlation/session id, when present
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Longest response body excerpt kept in a rejection error
const MAX_ERROR_BODY_CHARS: usize = 200;

pub struct HttpDelivery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDelivery {
    /// Create an HTTP delivery adapter
    ///
    /// `request_timeout` bounds every attempt; the queue itself never times a
    /// delivery out.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DeliveryError::Other(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, op: &QueuedOperation) -> Result<(), DeliveryError> {
        let request = OfflineRequest::from_payload(&op.payload)
            .map_err(|e| DeliveryError::InvalidPayload(e.to_string()))?;
        let url = format!("{}{}", self.base_url, request.endpoint);

        let mut builder = self
            .client
            .request(Self::method(request.method), &url)
            .header(IDEMPOTENCY_HEADER, op.id.as_str());
        if let Some(correlation_id) = &op.correlation_id {
            builder = builder.header(CORRELATION_HEADER, correlation_id.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(op_id = %op.id, method = %request.method, url = %url, "Sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        warn!(op_id = %op.id, status = status.as_u16(), "Backend rejected request");
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferq_core::domain::OperationPayload;
    use serde_json::json;

    fn op_for(request: OfflineRequest, correlation_id: Option<&str>) -> QueuedOperation {
        QueuedOperation::new("op-7", 0, request.into_payload().unwrap())
            .with_correlation_id(correlation_id.map(str::to_string))
    }

    #[tokio::test]
    async fn test_post_with_body_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/support/tickets")
            .match_header(IDEMPOTENCY_HEADER, "op-7")
            .match_header(CORRELATION_HEADER, "session-1")
            .match_body(mockito::Matcher::Json(json!({"subject": "card declined"})))
            .with_status(201)
            .create_async()
            .await;

        let delivery = HttpDelivery::new(server.url(), Duration::from_secs(5)).unwrap();
        let op = op_for(
            OfflineRequest::new(HttpMethod::Post, "/api/support/tickets")
                .with_body(json!({"subject": "card declined"})),
            Some("session-1"),
        );

        delivery.deliver(&op).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/api/tickets/1")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let delivery = HttpDelivery::new(format!("{}/", server.url()), Duration::from_secs(5)).unwrap();
        let op = op_for(OfflineRequest::new(HttpMethod::Put, "/api/tickets/1"), None);

        let err = delivery.deliver(&op).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected {
                status: 503,
                message: "maintenance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_invalid() {
        let delivery = HttpDelivery::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let op = QueuedOperation::new("op-1", 0, OperationPayload::new(json!("plain message")));

        assert!(matches!(
            delivery.deliver(&op).await,
            Err(DeliveryError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let delivery = HttpDelivery::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let op = op_for(OfflineRequest::new(HttpMethod::Get, "/health"), None);

        assert!(matches!(
            delivery.deliver(&op).await,
            Err(DeliveryError::Transport(_))
        ));
    }
}
