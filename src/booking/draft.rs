//! Booking draft: the accumulating record for one visitor session.
//!
//! All mutation goes through the step-scoped operations below; fields are
//! private so nothing can merge raw data past the schema.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{DetailBag, LegalDocument, ServiceCategory};
use super::schema::{self, FieldName};
use super::validator;
use crate::error::BookingError;

/// The four form steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    ServiceSelection,
    PersonalInfo,
    ServiceSpecificDetails,
    Confirmation,
}

impl BookingStep {
    pub const ALL: [BookingStep; 4] = [
        Self::ServiceSelection,
        Self::PersonalInfo,
        Self::ServiceSpecificDetails,
        Self::Confirmation,
    ];

    /// The following step, if any.
    pub fn next(&self) -> Option<BookingStep> {
        match self {
            Self::ServiceSelection => Some(Self::PersonalInfo),
            Self::PersonalInfo => Some(Self::ServiceSpecificDetails),
            Self::ServiceSpecificDetails => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }

    /// The preceding step, if any.
    pub fn previous(&self) -> Option<BookingStep> {
        match self {
            Self::ServiceSelection => None,
            Self::PersonalInfo => Some(Self::ServiceSelection),
            Self::ServiceSpecificDetails => Some(Self::PersonalInfo),
            Self::Confirmation => Some(Self::ServiceSpecificDetails),
        }
    }
}

impl Default for BookingStep {
    fn default() -> Self {
        Self::ServiceSelection
    }
}

impl std::fmt::Display for BookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ServiceSelection => "service_selection",
            Self::PersonalInfo => "personal_info",
            Self::ServiceSpecificDetails => "service_specific_details",
            Self::Confirmation => "confirmation",
        };
        write!(f, "{s}")
    }
}

/// A raw value coming from the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// What an accepted `update_field` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldUpdate {
    /// A scalar field was overwritten.
    Set,
    /// A scalar field was emptied.
    Cleared,
    /// A tag was added to a set-valued field.
    Added,
    /// A tag was removed from a set-valued field.
    Removed,
}

/// The mutable record for one booking session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    name: String,
    email: String,
    phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<DetailBag>,
    terms_accepted: bool,
    privacy_accepted: bool,
    current_step: BookingStep,
}

impl BookingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty draft with the category pre-selected (from a marketing link).
    /// The draft stays on `ServiceSelection` so the visitor confirms the choice.
    pub fn seeded(category: Option<ServiceCategory>) -> Self {
        Self {
            details: category.map(DetailBag::empty),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn service_category(&self) -> Option<ServiceCategory> {
        self.details.as_ref().map(DetailBag::category)
    }

    pub fn details(&self) -> Option<&DetailBag> {
        self.details.as_ref()
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    pub fn privacy_accepted(&self) -> bool {
        self.privacy_accepted
    }

    pub fn current_step(&self) -> BookingStep {
        self.current_step
    }

    /// Select the service category.
    ///
    /// Switching to a different category replaces the detail bag, so nothing
    /// from the previous category survives. Only a call made on
    /// `ServiceSelection` moves the draft on to `PersonalInfo`.
    pub fn set_service_category(&mut self, category: ServiceCategory) -> BookingStep {
        if self.service_category() != Some(category) {
            if let Some(previous) = self.service_category() {
                debug!(from = %previous, to = %category, "Switching service category, discarding details");
            }
            self.details = Some(DetailBag::empty(category));
        }
        if self.current_step == BookingStep::ServiceSelection {
            self.current_step = BookingStep::PersonalInfo;
        }
        self.current_step
    }

    /// Set one field.
    ///
    /// Detail fields must be declared by the active category's schema. Set-valued
    /// fields toggle membership of the given tag. On any error the draft is
    /// left untouched.
    pub fn update_field(
        &mut self,
        field: FieldName,
        value: FieldValue,
    ) -> Result<FieldUpdate, BookingError> {
        match field {
            FieldName::Name => set_text(&mut self.name, field, value),
            FieldName::Email => set_text(&mut self.email, field, value),
            FieldName::Phone => set_text(&mut self.phone, field, value),
            FieldName::Message => {
                let text = expect_text(field, value)?;
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    self.message = None;
                    Ok(FieldUpdate::Cleared)
                } else {
                    self.message = Some(trimmed.to_string());
                    Ok(FieldUpdate::Set)
                }
            }
            FieldName::ServiceCategory => {
                let text = expect_text(field, value)?;
                let category = parse_choice(field, &text)?;
                self.set_service_category(category);
                Ok(FieldUpdate::Set)
            }
            FieldName::TermsAccepted => {
                self.terms_accepted = expect_flag(field, value)?;
                Ok(FieldUpdate::Set)
            }
            FieldName::PrivacyAccepted => {
                self.privacy_accepted = expect_flag(field, value)?;
                Ok(FieldUpdate::Set)
            }
            _ => self.update_detail(field, value),
        }
    }

    /// Record whether the visitor acknowledged a legal document.
    pub fn acknowledge(&mut self, document: LegalDocument, accepted: bool) {
        match document {
            LegalDocument::Terms => self.terms_accepted = accepted,
            LegalDocument::Privacy => self.privacy_accepted = accepted,
        }
    }

    /// Move to the next step if the current one validates.
    ///
    /// On `Confirmation` this is a no-op. On failure the step is unchanged and
    /// the error lists the fields that need attention.
    pub fn advance_step(&mut self, today: NaiveDate) -> Result<BookingStep, BookingError> {
        let Some(next) = self.current_step.next() else {
            return Ok(self.current_step);
        };
        let report = validator::validate_step(self, self.current_step, today);
        if !report.valid {
            return Err(BookingError::Validation {
                step: self.current_step,
                missing: report.missing,
            });
        }
        self.current_step = next;
        Ok(next)
    }

    /// Move to the previous step. No validation; no-op on the first step.
    pub fn retreat_step(&mut self) -> BookingStep {
        if let Some(previous) = self.current_step.previous() {
            self.current_step = previous;
        }
        self.current_step
    }

    /// Return to the empty initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn update_detail(
        &mut self,
        field: FieldName,
        value: FieldValue,
    ) -> Result<FieldUpdate, BookingError> {
        let category = self.service_category();
        let schema = match schema::lookup(category) {
            Ok(schema) => schema,
            Err(_) => {
                return Err(BookingError::UnknownFieldForCategory { field, category });
            }
        };
        if !schema.declares(field) {
            return Err(BookingError::UnknownFieldForCategory { field, category });
        }
        let limit = schema.selection_limit(field);
        let text = expect_text(field, value)?;
        let text = text.trim();

        let Some(bag) = self.details.as_mut() else {
            return Err(BookingError::SchemaNotFound);
        };

        match bag {
            DetailBag::IndividualLesson(d) => match field {
                FieldName::SessionType => set_choice(&mut d.session_type, field, text),
                FieldName::SkillLevel => set_choice(&mut d.skill_level, field, text),
                FieldName::FocusAreas => toggle(&mut d.focus_areas, field, text, limit),
                FieldName::PreferredDate => set_parsed(&mut d.preferred_date, field, text, parse_date),
                FieldName::PreferredTime => set_parsed(&mut d.preferred_time, field, text, parse_time),
                _ => Err(BookingError::UnknownFieldForCategory { field, category }),
            },
            DetailBag::PerformanceCoaching(d) => match field {
                FieldName::EventType => set_choice(&mut d.event_type, field, text),
                FieldName::EventDate => set_parsed(&mut d.event_date, field, text, parse_date),
                FieldName::GuestCount => set_choice(&mut d.guest_count, field, text),
                FieldName::MusicPreferences => {
                    toggle(&mut d.music_preferences, field, text, limit)
                }
                _ => Err(BookingError::UnknownFieldForCategory { field, category }),
            },
            DetailBag::GroupWorkshop(d) => match field {
                FieldName::WorkshopTheme => set_choice(&mut d.theme, field, text),
                FieldName::Duration => set_choice(&mut d.duration, field, text),
                FieldName::GroupSize => set_choice(&mut d.group_size, field, text),
                FieldName::PreferredSlots => toggle(&mut d.preferred_slots, field, text, limit),
                _ => Err(BookingError::UnknownFieldForCategory { field, category }),
            },
        }
    }
}

fn expect_text(field: FieldName, value: FieldValue) -> Result<String, BookingError> {
    match value {
        FieldValue::Text(text) => Ok(text),
        FieldValue::Flag(_) => Err(BookingError::InvalidValue {
            field,
            reason: "expected text".into(),
        }),
    }
}

fn expect_flag(field: FieldName, value: FieldValue) -> Result<bool, BookingError> {
    match value {
        FieldValue::Flag(flag) => Ok(flag),
        FieldValue::Text(text) => match text.trim() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" | "" => Ok(false),
            other => Err(BookingError::InvalidValue {
                field,
                reason: format!("expected a boolean, got {other:?}"),
            }),
        },
    }
}

fn set_text(slot: &mut String, field: FieldName, value: FieldValue) -> Result<FieldUpdate, BookingError> {
    let text = expect_text(field, value)?;
    *slot = text.trim().to_string();
    Ok(if slot.is_empty() {
        FieldUpdate::Cleared
    } else {
        FieldUpdate::Set
    })
}

fn parse_choice<T>(field: FieldName, text: &str) -> Result<T, BookingError>
where
    T: std::str::FromStr<Err = String>,
{
    text.parse()
        .map_err(|reason| BookingError::InvalidValue { field, reason })
}

fn set_choice<T>(slot: &mut Option<T>, field: FieldName, text: &str) -> Result<FieldUpdate, BookingError>
where
    T: std::str::FromStr<Err = String>,
{
    set_parsed(slot, field, text, |t| t.parse::<T>())
}

/// Overwrite a scalar detail field; an empty value clears it.
fn set_parsed<T>(
    slot: &mut Option<T>,
    field: FieldName,
    text: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<FieldUpdate, BookingError> {
    if text.is_empty() {
        *slot = None;
        return Ok(FieldUpdate::Cleared);
    }
    let parsed = parse(text).map_err(|reason| BookingError::InvalidValue { field, reason })?;
    *slot = Some(parsed);
    Ok(FieldUpdate::Set)
}

/// Toggle `text` in a tag set, refusing to grow past `limit`.
fn toggle<T>(
    set: &mut BTreeSet<T>,
    field: FieldName,
    text: &str,
    limit: Option<usize>,
) -> Result<FieldUpdate, BookingError>
where
    T: std::str::FromStr<Err = String> + Ord,
{
    let tag: T = parse_choice(field, text)?;
    if set.remove(&tag) {
        return Ok(FieldUpdate::Removed);
    }
    if let Some(limit) = limit {
        if set.len() >= limit {
            return Err(BookingError::SelectionLimitReached { field, limit });
        }
    }
    set.insert(tag);
    Ok(FieldUpdate::Added)
}

fn parse_date(text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_time(text: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM: {e}"))
}
