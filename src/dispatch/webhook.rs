//! Webhook dispatcher: POSTs the booking request as JSON to a mail or
//! automation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use super::{Ack, Dispatcher};
use crate::booking::payload::BookingRequest;
use crate::error::{ConfigError, DispatchError};

/// Webhook configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as a bearer token when set.
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Returns `Ok(None)` if `BOOKING_WEBHOOK_URL` is not set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(url) = std::env::var("BOOKING_WEBHOOK_URL") else {
            return Ok(None);
        };
        let token = std::env::var("BOOKING_WEBHOOK_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        let timeout_secs: u64 = match std::env::var("BOOKING_WEBHOOK_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BOOKING_WEBHOOK_TIMEOUT_SECS".to_string(),
                message: format!("not a number: {raw}"),
            })?,
            Err(_) => 15,
        };
        Ok(Some(Self {
            url,
            token,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

/// Delivers booking requests to an HTTP endpoint.
pub struct WebhookDispatcher {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn submit(&self, request: &BookingRequest) -> Result<Ack, DispatchError> {
        let mut call = self
            .client
            .post(&self.config.url)
            .header("Idempotency-Key", request.idempotency_key.to_string())
            .json(request);
        if let Some(ref token) = self.config.token {
            call = call.bearer_auth(token.expose_secret());
        }

        let response = call.send().await.map_err(|e| DispatchError::Transport {
            dispatcher: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Booking webhook returned an error");
            let reason = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
            return Err(if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                DispatchError::Rejected {
                    dispatcher: self.name().to_string(),
                    reason,
                }
            } else {
                DispatchError::Transport {
                    dispatcher: self.name().to_string(),
                    reason,
                }
            });
        }

        // Prefer the remote id when the endpoint returns one.
        let reference = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
            .unwrap_or_else(|| request.idempotency_key.to_string());

        info!(category = %request.service_category(), reference = %reference, "Booking webhook accepted");
        Ok(Ack::new(self.name(), reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;
    use uuid::Uuid;

    use crate::booking::context::WorkflowContext;
    use crate::booking::draft::BookingDraft;
    use crate::booking::model::ServiceCategory;

    #[derive(Clone, Default)]
    struct Captured {
        calls: Arc<Mutex<Vec<(Option<String>, Option<String>, serde_json::Value)>>>,
    }

    async fn start_endpoint(status: AxumStatus) -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(c): State<Captured>, headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                        let key = headers
                            .get("idempotency-key")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        c.calls.lock().unwrap().push((key, auth, body));
                        (status, Json(serde_json::json!({"id": "remote-42"})))
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://127.0.0.1:{port}/hook"), captured)
    }

    fn request() -> BookingRequest {
        let draft = BookingDraft::seeded(Some(ServiceCategory::IndividualLesson));
        BookingRequest::from_draft(&draft, &WorkflowContext::default(), Uuid::new_v4()).unwrap()
    }

    fn dispatcher(url: String) -> WebhookDispatcher {
        WebhookDispatcher::new(WebhookConfig {
            url,
            token: Some(SecretString::from("t0ken")),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn posts_json_with_idempotency_key() {
        let (url, captured) = start_endpoint(AxumStatus::OK).await;
        let request = request();

        let ack = dispatcher(url).submit(&request).await.unwrap();
        assert_eq!(ack.reference, "remote-42");
        assert_eq!(ack.dispatcher, "webhook");

        let calls = captured.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (key, auth, body) = &calls[0];
        assert_eq!(key.as_deref(), Some(request.idempotency_key.to_string().as_str()));
        assert_eq!(auth.as_deref(), Some("Bearer t0ken"));
        assert_eq!(body["serviceCategory"], "IndividualLesson");
    }

    #[tokio::test]
    async fn client_error_is_rejected() {
        let (url, _captured) = start_endpoint(AxumStatus::UNPROCESSABLE_ENTITY).await;
        let err = dispatcher(url).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
    }

    #[tokio::test]
    async fn server_error_is_transport_failure() {
        let (url, _captured) = start_endpoint(AxumStatus::BAD_GATEWAY).await;
        let err = dispatcher(url).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_failure() {
        let err = dispatcher("http://127.0.0.1:9/hook".into())
            .submit(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));
    }
}
