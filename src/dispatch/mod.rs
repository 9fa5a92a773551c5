//! Submission dispatchers: deliver a finished booking request to the studio.
//!
//! The core only sees the `Dispatcher` trait. Concrete senders:
//! - `SmtpDispatcher`: notification email via lettre
//! - `WebhookDispatcher`: JSON POST to a mail/automation endpoint via reqwest
//! - `LogDispatcher`: writes the request to the log (development)

pub mod render;
pub mod smtp;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::booking::payload::BookingRequest;
use crate::config::{AppConfig, DispatcherKind};
use crate::error::{ConfigError, DispatchError};

pub use smtp::{SmtpConfig, SmtpDispatcher};
pub use webhook::{WebhookConfig, WebhookDispatcher};

/// Acknowledgement of a delivered booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Which dispatcher delivered it.
    pub dispatcher: String,
    /// Reference shown to the visitor (message id, remote id, or idempotency key).
    pub reference: String,
    pub accepted_at: DateTime<Utc>,
}

impl Ack {
    pub fn new(dispatcher: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            reference: reference.into(),
            accepted_at: Utc::now(),
        }
    }
}

/// External notification boundary. One call per submission attempt; no
/// timeout is imposed by the caller.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Short identifier used in logs and acks.
    fn name(&self) -> &str;

    async fn submit(&self, request: &BookingRequest) -> Result<Ack, DispatchError>;
}

/// Dispatcher that only logs the request.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    fn name(&self) -> &str {
        "log"
    }

    async fn submit(&self, request: &BookingRequest) -> Result<Ack, DispatchError> {
        let body = serde_json::to_string(request)
            .map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;
        let fields = request
            .details
            .populated_fields()
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(",");
        // Contact details only at debug.
        info!(
            category = %request.service_category(),
            idempotency_key = %request.idempotency_key,
            fields = %fields,
            "Booking request received (log dispatcher)"
        );
        debug!(idempotency_key = %request.idempotency_key, payload = %body, "Booking request payload");
        Ok(Ack::new(self.name(), request.idempotency_key.to_string()))
    }
}

/// Build the dispatcher selected in the configuration.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Dispatcher>, ConfigError> {
    match config.dispatcher {
        DispatcherKind::Log => Ok(Arc::new(LogDispatcher)),
        DispatcherKind::Smtp => {
            let smtp = SmtpConfig::from_env()?.ok_or_else(|| {
                ConfigError::MissingEnvVar("SMTP_HOST".to_string())
            })?;
            Ok(Arc::new(SmtpDispatcher::new(smtp)))
        }
        DispatcherKind::Webhook => {
            let webhook = WebhookConfig::from_env()?.ok_or_else(|| {
                ConfigError::MissingEnvVar("BOOKING_WEBHOOK_URL".to_string())
            })?;
            let dispatcher = WebhookDispatcher::new(webhook).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "BOOKING_WEBHOOK_URL".to_string(),
                    message: e.to_string(),
                }
            })?;
            Ok(Arc::new(dispatcher))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::context::WorkflowContext;
    use crate::booking::draft::BookingDraft;
    use crate::booking::model::ServiceCategory;
    use crate::booking::schema::FieldName;
    use uuid::Uuid;

    #[tokio::test]
    async fn log_dispatcher_acks_with_idempotency_key() {
        let draft = BookingDraft::seeded(Some(ServiceCategory::GroupWorkshop));
        let key = Uuid::new_v4();
        let request = BookingRequest::from_draft(&draft, &WorkflowContext::default(), key).unwrap();

        let ack = LogDispatcher.submit(&request).await.unwrap();
        assert_eq!(ack.dispatcher, "log");
        assert_eq!(ack.reference, key.to_string());
    }

    /// Writer that appends formatted log lines to a shared buffer.
    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_dispatcher_keeps_contact_details_out_of_info() {
        let mut draft = BookingDraft::seeded(Some(ServiceCategory::IndividualLesson));
        draft.update_field(FieldName::Name, "Anna".into()).unwrap();
        draft
            .update_field(FieldName::Email, "anna.secret@example.de".into())
            .unwrap();
        draft.update_field(FieldName::Phone, "0176-5550199".into()).unwrap();
        draft.update_field(FieldName::SessionType, "Online".into()).unwrap();
        let request =
            BookingRequest::from_draft(&draft, &WorkflowContext::default(), Uuid::new_v4()).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogDispatcher.submit(&request).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Booking request received"));
        assert!(output.contains("IndividualLesson"));
        assert!(output.contains("sessionType"));
        assert!(!output.contains("anna.secret@example.de"));
        assert!(!output.contains("0176-5550199"));
    }

    #[test]
    fn log_dispatcher_is_default() {
        let config = AppConfig::default();
        let dispatcher = from_config(&config).unwrap();
        assert_eq!(dispatcher.name(), "log");
    }
}
