//! Step validation: pure checks of a draft against the schema registry.
//!
//! Never mutates and never fails: every check returns a `ValidationReport`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use super::draft::{BookingDraft, BookingStep};
use super::schema::{self, FieldName, ValueConstraint};

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Outcome of validating one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    /// Fields that are missing or hold a value outside their domain.
    pub missing: Vec<FieldName>,
}

impl ValidationReport {
    fn from_missing(missing: Vec<FieldName>) -> Self {
        Self {
            valid: missing.is_empty(),
            missing,
        }
    }
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

/// Validate `draft` for `step`.
///
/// `Confirmation` re-checks every earlier step as well, since going back may
/// have changed data that was valid when it was first entered.
pub fn validate_step(draft: &BookingDraft, step: BookingStep, today: NaiveDate) -> ValidationReport {
    let missing = match step {
        BookingStep::ServiceSelection => check_service_selection(draft),
        BookingStep::PersonalInfo => check_personal_info(draft),
        BookingStep::ServiceSpecificDetails => check_details(draft, today),
        BookingStep::Confirmation => {
            let mut missing = Vec::new();
            missing.extend(check_service_selection(draft));
            missing.extend(check_personal_info(draft));
            missing.extend(check_details(draft, today));
            missing.extend(check_acceptance(draft));
            dedup(missing)
        }
    };
    ValidationReport::from_missing(missing)
}

/// Validate every step from the first up to and including `step`.
pub fn validate_through(draft: &BookingDraft, step: BookingStep, today: NaiveDate) -> ValidationReport {
    let missing = BookingStep::ALL
        .iter()
        .take_while(|s| **s != step)
        .chain(std::iter::once(&step))
        .flat_map(|s| validate_step(draft, *s, today).missing)
        .collect();
    ValidationReport::from_missing(dedup(missing))
}

fn check_service_selection(draft: &BookingDraft) -> Vec<FieldName> {
    match draft.service_category() {
        Some(_) => Vec::new(),
        None => vec![FieldName::ServiceCategory],
    }
}

fn check_personal_info(draft: &BookingDraft) -> Vec<FieldName> {
    let mut missing = Vec::new();
    if draft.name().trim().is_empty() {
        missing.push(FieldName::Name);
    }
    if !is_valid_email(draft.email()) {
        missing.push(FieldName::Email);
    }
    if draft.phone().trim().is_empty() {
        missing.push(FieldName::Phone);
    }
    missing
}

fn check_details(draft: &BookingDraft, today: NaiveDate) -> Vec<FieldName> {
    let (Ok(schema), Some(bag)) = (schema::lookup(draft.service_category()), draft.details())
    else {
        return vec![FieldName::ServiceCategory];
    };

    let mut missing = Vec::new();
    for field in &schema.required_fields {
        if !bag.is_populated(*field) {
            missing.push(*field);
        }
    }
    // Populated fields, required or optional, must sit inside their domain.
    // Enumerated values are guaranteed by the detail types; dates are not.
    for field in bag.populated_fields() {
        if let Some(ValueConstraint::FutureDate) = schema.constraint(field) {
            if bag.date(field).is_some_and(|d| d < today) {
                missing.push(field);
            }
        }
    }
    missing
}

fn check_acceptance(draft: &BookingDraft) -> Vec<FieldName> {
    let mut missing = Vec::new();
    if !draft.terms_accepted() {
        missing.push(FieldName::TermsAccepted);
    }
    if !draft.privacy_accepted() {
        missing.push(FieldName::PrivacyAccepted);
    }
    missing
}

fn dedup(fields: Vec<FieldName>) -> Vec<FieldName> {
    let mut seen = Vec::with_capacity(fields.len());
    for field in fields {
        if !seen.contains(&field) {
            seen.push(field);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::model::{LegalDocument, ServiceCategory};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
    }

    fn coaching_draft() -> BookingDraft {
        let mut draft = BookingDraft::new();
        draft.set_service_category(ServiceCategory::PerformanceCoaching);
        draft.update_field(FieldName::Name, "Jonas".into()).unwrap();
        draft.update_field(FieldName::Email, "jonas@example.org".into()).unwrap();
        draft.update_field(FieldName::Phone, "+49 170 000000".into()).unwrap();
        draft
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.de"));
        assert!(is_valid_email("first.last+tag@sub.example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@@b.de"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn service_selection_requires_category() {
        let draft = BookingDraft::new();
        let report = validate_step(&draft, BookingStep::ServiceSelection, today());
        assert!(!report.valid);
        assert_eq!(report.missing, vec![FieldName::ServiceCategory]);
    }

    #[test]
    fn personal_info_lists_every_problem() {
        let draft = BookingDraft::new();
        let report = validate_step(&draft, BookingStep::PersonalInfo, today());
        assert_eq!(
            report.missing,
            vec![FieldName::Name, FieldName::Email, FieldName::Phone]
        );
    }

    #[test]
    fn whitespace_name_is_missing() {
        let mut draft = coaching_draft();
        draft.update_field(FieldName::Name, "   ".into()).unwrap();
        let report = validate_step(&draft, BookingStep::PersonalInfo, today());
        assert_eq!(report.missing, vec![FieldName::Name]);
    }

    #[test]
    fn details_require_schema_fields() {
        let mut draft = coaching_draft();
        let report = validate_step(&draft, BookingStep::ServiceSpecificDetails, today());
        assert_eq!(report.missing, vec![FieldName::EventType, FieldName::EventDate]);

        draft.update_field(FieldName::EventType, "Corporate".into()).unwrap();
        draft.update_field(FieldName::EventDate, "2026-05-10".into()).unwrap();
        let report = validate_step(&draft, BookingStep::ServiceSpecificDetails, today());
        assert!(report.valid, "same-day event should pass: {:?}", report.missing);
    }

    #[test]
    fn past_event_date_is_invalid() {
        let mut draft = coaching_draft();
        draft.update_field(FieldName::EventType, "Private".into()).unwrap();
        draft.update_field(FieldName::EventDate, "2026-05-09".into()).unwrap();
        let report = validate_step(&draft, BookingStep::ServiceSpecificDetails, today());
        assert_eq!(report.missing, vec![FieldName::EventDate]);
    }

    #[test]
    fn past_optional_date_is_invalid() {
        let mut draft = BookingDraft::new();
        draft.set_service_category(ServiceCategory::IndividualLesson);
        draft.update_field(FieldName::SessionType, "Online".into()).unwrap();
        draft.update_field(FieldName::SkillLevel, "Advanced".into()).unwrap();
        draft.update_field(FieldName::PreferredDate, "2025-12-24".into()).unwrap();
        let report = validate_step(&draft, BookingStep::ServiceSpecificDetails, today());
        assert_eq!(report.missing, vec![FieldName::PreferredDate]);
    }

    #[test]
    fn details_without_category_report_category() {
        let draft = BookingDraft::new();
        let report = validate_step(&draft, BookingStep::ServiceSpecificDetails, today());
        assert_eq!(report.missing, vec![FieldName::ServiceCategory]);
    }

    #[test]
    fn confirmation_rechecks_prior_steps() {
        let mut draft = coaching_draft();
        draft.update_field(FieldName::EventType, "Wedding".into()).unwrap();
        draft.update_field(FieldName::EventDate, "2026-08-01".into()).unwrap();
        draft.acknowledge(LegalDocument::Terms, true);

        let report = validate_step(&draft, BookingStep::Confirmation, today());
        assert_eq!(report.missing, vec![FieldName::PrivacyAccepted]);

        draft.acknowledge(LegalDocument::Privacy, true);
        draft.update_field(FieldName::Email, "broken".into()).unwrap();
        let report = validate_step(&draft, BookingStep::Confirmation, today());
        assert_eq!(report.missing, vec![FieldName::Email]);
    }

    #[test]
    fn validate_through_accumulates() {
        let draft = BookingDraft::new();
        let report = validate_through(&draft, BookingStep::PersonalInfo, today());
        assert_eq!(
            report.missing,
            vec![
                FieldName::ServiceCategory,
                FieldName::Name,
                FieldName::Email,
                FieldName::Phone
            ]
        );
        let first = validate_through(&draft, BookingStep::ServiceSelection, today());
        assert_eq!(first.missing, vec![FieldName::ServiceCategory]);
    }

    #[test]
    fn validation_does_not_mutate() {
        let draft = coaching_draft();
        let before = draft.clone();
        for step in BookingStep::ALL {
            let _ = validate_step(&draft, step, today());
        }
        assert_eq!(draft, before);
    }
}
