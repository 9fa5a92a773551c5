//! SMTP dispatcher: sends the booking request as a notification email via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::{Ack, Dispatcher, render};
use crate::booking::payload::BookingRequest;
use crate::error::{ConfigError, DispatchError};

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Sender address of the notification.
    pub from_address: String,
    /// Studio inbox that receives booking requests.
    pub notify_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `Ok(None)` if `SMTP_HOST` is not set (dispatcher disabled).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };

        let port = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SMTP_PORT".to_string(),
                message: format!("not a port number: {raw}"),
            })?,
            Err(_) => 587,
        };

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let notify_address = std::env::var("BOOKING_NOTIFY_ADDRESS")
            .map_err(|_| ConfigError::MissingEnvVar("BOOKING_NOTIFY_ADDRESS".to_string()))?;
        let from_address =
            std::env::var("BOOKING_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from_address,
            notify_address,
        }))
    }
}

/// Delivers booking requests to the studio inbox.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the notification email. The visitor's address goes into
    /// `Reply-To` so the studio can answer directly.
    pub fn build_message(&self, request: &BookingRequest) -> Result<Message, DispatchError> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| rejected(format!("Invalid from address: {e}")))?;
        let to: Mailbox = self
            .config
            .notify_address
            .parse()
            .map_err(|e| rejected(format!("Invalid notify address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(render::subject(request))
            .header(ContentType::TEXT_PLAIN);
        if let Ok(reply_to) = request.email.parse::<Mailbox>() {
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(render::body(request))
            .map_err(|e| DispatchError::InvalidPayload(format!("Failed to build email: {e}")))
    }

    fn transport(&self) -> Result<SmtpTransport, DispatchError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        let builder = if self.config.port == 465 {
            SmtpTransport::relay(&self.config.host)
        } else {
            SmtpTransport::starttls_relay(&self.config.host)
        }
        .map_err(|e| transport_err(format!("SMTP relay error: {e}")))?;

        Ok(builder.port(self.config.port).credentials(creds).build())
    }
}

#[async_trait]
impl Dispatcher for SmtpDispatcher {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn submit(&self, request: &BookingRequest) -> Result<Ack, DispatchError> {
        let email = self.build_message(request)?;
        let transport = self.transport()?;

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| transport_err(format!("SMTP task failed: {e}")))?
            .map_err(|e| transport_err(format!("SMTP send failed: {e}")))?;

        info!(
            category = %request.service_category(),
            to = %self.config.notify_address,
            "Booking notification email sent"
        );
        Ok(Ack::new(self.name(), request.idempotency_key.to_string()))
    }
}

fn rejected(reason: String) -> DispatchError {
    DispatchError::Rejected {
        dispatcher: "smtp".into(),
        reason,
    }
}

fn transport_err(reason: String) -> DispatchError {
    DispatchError::Transport {
        dispatcher: "smtp".into(),
        reason,
    }
}
