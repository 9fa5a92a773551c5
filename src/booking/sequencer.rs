//! Step sequencer: the booking flow as a state machine.
//!
//! The rendering layer sends `FlowEvent`s and observes `FlowState`. Submission
//! is split in two halves around the async dispatcher call: `begin_submit`
//! moves into `Submitting` and hands out a ticket, `complete_submit` applies
//! the dispatcher's answer if the ticket still matches the session generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::WorkflowContext;
use super::draft::{BookingDraft, BookingStep, FieldUpdate, FieldValue};
use super::model::{LegalDocument, ServiceCategory};
use super::payload::BookingRequest;
use super::schema::FieldName;
use super::validator::{self, ValidationReport};
use crate::dispatch::Ack;
use crate::error::{BookingError, DispatchError};

/// States of the booking flow.
///
/// The four form steps mirror `BookingStep`; `Submitting` is the
/// confirmation sub-state while a dispatch is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Choosing the service category.
    ServiceSelection,
    /// Entering name, email and phone.
    PersonalInfo,
    /// Filling in the category's detail fields.
    ServiceSpecificDetails,
    /// Reviewing the request and accepting the legal documents.
    Confirmation,
    /// Dispatcher call outstanding; only cancel is accepted.
    Submitting,
    /// Request delivered, draft discarded.
    Submitted,
    /// Flow abandoned by the visitor, draft discarded.
    Cancelled,
}

impl FlowState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: FlowState) -> bool {
        use FlowState::*;

        if target == Cancelled {
            return *self != Cancelled;
        }
        matches!(
            (self, target),
            // Forward, one step at a time
            (ServiceSelection, PersonalInfo)
                | (PersonalInfo, ServiceSpecificDetails)
                | (ServiceSpecificDetails, Confirmation)
                | (Confirmation, Submitting)
                // Dispatcher answered
                | (Submitting, Submitted)
                | (Submitting, Confirmation)
                // Back
                | (PersonalInfo, ServiceSelection)
                | (ServiceSpecificDetails, PersonalInfo)
                | (Confirmation, ServiceSpecificDetails)
                // Start over after a terminal state
                | (Submitted, ServiceSelection)
                | (Cancelled, ServiceSelection)
        )
    }

    /// Whether the flow has finished (the draft has been discarded).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Cancelled)
    }

    /// The form step shown in this state, if any.
    pub fn step(&self) -> Option<BookingStep> {
        match self {
            Self::ServiceSelection => Some(BookingStep::ServiceSelection),
            Self::PersonalInfo => Some(BookingStep::PersonalInfo),
            Self::ServiceSpecificDetails => Some(BookingStep::ServiceSpecificDetails),
            Self::Confirmation | Self::Submitting => Some(BookingStep::Confirmation),
            Self::Submitted | Self::Cancelled => None,
        }
    }
}

impl From<BookingStep> for FlowState {
    fn from(step: BookingStep) -> Self {
        match step {
            BookingStep::ServiceSelection => Self::ServiceSelection,
            BookingStep::PersonalInfo => Self::PersonalInfo,
            BookingStep::ServiceSpecificDetails => Self::ServiceSpecificDetails,
            BookingStep::Confirmation => Self::Confirmation,
        }
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::ServiceSelection
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ServiceSelection => "service_selection",
            Self::PersonalInfo => "personal_info",
            Self::ServiceSpecificDetails => "service_specific_details",
            Self::Confirmation => "confirmation",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Synchronous user actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    SelectService { category: ServiceCategory },
    UpdateField { field: FieldName, value: FieldValue },
    Acknowledge { document: LegalDocument, accepted: bool },
    Next,
    Back,
    Cancel,
    Restart,
}

impl FlowEvent {
    fn label(&self) -> &'static str {
        match self {
            Self::SelectService { .. } => "select_service",
            Self::UpdateField { .. } => "update_field",
            Self::Acknowledge { .. } => "acknowledge",
            Self::Next => "next",
            Self::Back => "back",
            Self::Cancel => "cancel",
            Self::Restart => "restart",
        }
    }
}

/// Number of transitions kept per session; older entries are dropped.
pub const MAX_TRANSITIONS: usize = 100;

/// A recorded state change.
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    /// Previous state.
    pub from: FlowState,
    /// New state.
    pub to: FlowState,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Event or outcome that caused it.
    pub reason: Option<String>,
}

/// Result of applying a `FlowEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    pub state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_update: Option<FieldUpdate>,
}

/// Proof that a submission was started, carried across the dispatcher call.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub generation: u64,
    pub request: BookingRequest,
}

/// How a dispatcher answer was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Delivered; the draft has been reset.
    Submitted(Ack),
    /// The session moved on (cancelled or reset) before the answer arrived.
    Stale,
}

/// One visitor's booking flow: draft, state and submission bookkeeping.
#[derive(Debug, Clone)]
pub struct BookingSession {
    id: Uuid,
    draft: BookingDraft,
    state: FlowState,
    /// Bumped whenever the draft is discarded; stale dispatcher answers carry an older value.
    generation: u64,
    idempotency_key: Uuid,
    context: WorkflowContext,
    /// Most recent transitions, at most `MAX_TRANSITIONS`.
    transitions: Vec<StateTransition>,
    last_error: Option<String>,
    last_ack: Option<Ack>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingSession {
    pub fn new(context: WorkflowContext) -> Self {
        Self::with_draft(context, BookingDraft::new())
    }

    /// Start a session, pre-selecting the category from an incoming `service`
    /// query value. Unrecognised values are ignored.
    pub fn from_query(context: WorkflowContext, service: Option<&str>) -> Self {
        let category = service.and_then(|raw| {
            let parsed = ServiceCategory::from_query(raw);
            if parsed.is_none() {
                debug!(service = raw, "Ignoring unrecognised service parameter");
            }
            parsed
        });
        Self::with_draft(context, BookingDraft::seeded(category))
    }

    fn with_draft(context: WorkflowContext, draft: BookingDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: FlowState::from(draft.current_step()),
            draft,
            generation: 0,
            idempotency_key: Uuid::new_v4(),
            context,
            transitions: Vec::new(),
            last_error: None,
            last_ack: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Validation status of the current step.
    pub fn current_report(&self) -> Option<ValidationReport> {
        self.state
            .step()
            .map(|step| validator::validate_step(&self.draft, step, self.context.today()))
    }

    /// Apply a synchronous event.
    pub fn apply(&mut self, event: FlowEvent) -> Result<EventOutcome, BookingError> {
        self.updated_at = Utc::now();
        let label = event.label();

        let field_update = match event {
            FlowEvent::Cancel => {
                self.cancel();
                return Ok(self.outcome(None));
            }
            _ if self.state == FlowState::Submitting => {
                return Err(BookingError::SubmissionInProgress);
            }
            FlowEvent::Restart => {
                if !self.state.is_terminal() {
                    return Err(self.rejected(label));
                }
                self.draft = BookingDraft::new();
                self.last_error = None;
                self.transition(FlowState::ServiceSelection, "restart");
                return Ok(self.outcome(None));
            }
            _ if self.state.is_terminal() => return Err(self.rejected(label)),
            FlowEvent::SelectService { category } => {
                self.draft.set_service_category(category);
                None
            }
            FlowEvent::UpdateField { field, value } => Some(self.draft.update_field(field, value)?),
            FlowEvent::Acknowledge { document, accepted } => {
                self.draft.acknowledge(document, accepted);
                None
            }
            FlowEvent::Next => {
                if let Err(e) = self.draft.advance_step(self.context.today()) {
                    debug!(session_id = %self.id, state = %self.state, error = %e, "Advance rejected");
                    return Err(e);
                }
                None
            }
            FlowEvent::Back => {
                self.draft.retreat_step();
                None
            }
        };

        self.sync_state(label);
        Ok(self.outcome(field_update))
    }

    /// Discard the draft and end the flow. Any dispatch still in flight
    /// becomes stale.
    pub fn cancel(&mut self) {
        if self.state == FlowState::Cancelled {
            return;
        }
        self.discard_draft();
        self.transition(FlowState::Cancelled, "cancel");
    }

    /// Enter `Submitting` and return the request to dispatch.
    ///
    /// Only reachable from `Confirmation` with every step valid and both legal
    /// documents accepted.
    pub fn begin_submit(&mut self) -> Result<SubmissionTicket, BookingError> {
        self.updated_at = Utc::now();
        match self.state {
            FlowState::Submitting => return Err(BookingError::SubmissionInProgress),
            FlowState::Confirmation => {}
            _ => return Err(self.rejected("submit")),
        }

        let report = validator::validate_through(
            &self.draft,
            BookingStep::Confirmation,
            self.context.today(),
        );
        if !report.valid {
            return Err(BookingError::Validation {
                step: BookingStep::Confirmation,
                missing: report.missing,
            });
        }

        let request = BookingRequest::from_draft(&self.draft, &self.context, self.idempotency_key)?;
        self.last_error = None;
        self.transition(FlowState::Submitting, "submit");
        Ok(SubmissionTicket {
            generation: self.generation,
            request,
        })
    }

    /// Apply the dispatcher's answer for `generation`.
    ///
    /// On failure the draft is kept and the flow returns to `Confirmation` so
    /// the visitor can retry.
    pub fn complete_submit(
        &mut self,
        generation: u64,
        result: Result<Ack, DispatchError>,
    ) -> Result<SubmitOutcome, BookingError> {
        if generation != self.generation || self.state != FlowState::Submitting {
            debug!(
                session_id = %self.id,
                ticket = generation,
                current = self.generation,
                "Dropping stale dispatcher response"
            );
            return Ok(SubmitOutcome::Stale);
        }
        self.updated_at = Utc::now();

        match result {
            Ok(ack) => {
                info!(session_id = %self.id, reference = %ack.reference, "Booking request delivered");
                self.discard_draft();
                self.last_ack = Some(ack.clone());
                self.transition(FlowState::Submitted, "dispatch succeeded");
                Ok(SubmitOutcome::Submitted(ack))
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Booking dispatch failed");
                self.last_error = Some(e.to_string());
                self.transition(FlowState::Confirmation, "dispatch failed");
                Err(BookingError::Dispatch(e))
            }
        }
    }

    /// Serializable snapshot for the rendering layer.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            state: self.state,
            step: self.state.step(),
            generation: self.generation,
            language: self.context.language.as_str(),
            draft: self.draft.clone(),
            validation: self.current_report(),
            calendar_link: match self.state {
                FlowState::Confirmation | FlowState::Submitting | FlowState::Submitted => {
                    self.context.calendar_link.clone()
                }
                _ => None,
            },
            last_error: self.last_error.clone(),
            confirmation: self.last_ack.clone(),
            transitions: self.transitions.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn discard_draft(&mut self) {
        self.draft.reset();
        self.generation += 1;
        self.idempotency_key = Uuid::new_v4();
    }

    fn sync_state(&mut self, reason: &str) {
        let target = FlowState::from(self.draft.current_step());
        if target != self.state {
            self.transition(target, reason);
        }
    }

    fn transition(&mut self, to: FlowState, reason: &str) {
        let from = self.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            // Category changes on later steps keep the pointer, so this only
            // fires on a logic error.
            warn!(session_id = %self.id, %from, %to, "Unexpected flow transition");
        }
        info!(session_id = %self.id, %from, %to, reason, "Booking flow transition");
        self.state = to;
        if self.transitions.len() >= MAX_TRANSITIONS {
            let excess = self.transitions.len() + 1 - MAX_TRANSITIONS;
            self.transitions.drain(..excess);
        }
        self.transitions.push(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            reason: Some(reason.to_string()),
        });
    }

    fn rejected(&self, event: &str) -> BookingError {
        BookingError::InvalidTransition {
            from: self.state.to_string(),
            event: event.to_string(),
        }
    }

    fn outcome(&self, field_update: Option<FieldUpdate>) -> EventOutcome {
        EventOutcome {
            state: self.state,
            field_update,
        }
    }
}

/// Snapshot of a session returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<BookingStep>,
    pub generation: u64,
    pub language: &'static str,
    pub draft: BookingDraft,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Ack>,
    pub transitions: Vec<StateTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
