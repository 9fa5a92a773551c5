//! Serialized booking request handed to the dispatcher.

use serde::Serialize;
use uuid::Uuid;

use super::context::WorkflowContext;
use super::draft::BookingDraft;
use super::model::{DetailBag, Language, ServiceCategory};
use crate::error::BookingError;

/// Flat record sent to the notification collaborator.
///
/// Category fields are flattened from the live detail bag only, tagged with
/// `serviceCategory`, so an abandoned category can never leak into a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Stable for every retry of the same draft.
    pub idempotency_key: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: DetailBag,
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_link: Option<String>,
}

impl BookingRequest {
    /// Snapshot a draft. Fails only if no category is selected.
    pub fn from_draft(
        draft: &BookingDraft,
        context: &WorkflowContext,
        idempotency_key: Uuid,
    ) -> Result<Self, BookingError> {
        let details = draft.details().cloned().ok_or(BookingError::SchemaNotFound)?;
        Ok(Self {
            idempotency_key,
            name: draft.name().to_string(),
            email: draft.email().to_string(),
            phone: draft.phone().to_string(),
            message: draft.message().map(str::to_string),
            details,
            terms_accepted: draft.terms_accepted(),
            privacy_accepted: draft.privacy_accepted(),
            language: context.language,
            calendar_link: context.calendar_link.clone(),
        })
    }

    pub fn service_category(&self) -> ServiceCategory {
        self.details.category()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
