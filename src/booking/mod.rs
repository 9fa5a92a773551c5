//! Booking workflow core: data model, schema registry, draft, validation
//! and the step sequencer. Nothing in here performs I/O.

pub mod context;
pub mod draft;
pub mod model;
pub mod payload;
pub mod schema;
pub mod sequencer;
pub mod validator;

pub use context::{Clock, WorkflowContext};
pub use draft::{BookingDraft, BookingStep, FieldUpdate, FieldValue};
pub use model::{DetailBag, Language, LegalDocument, ServiceCategory};
pub use payload::BookingRequest;
pub use schema::{FieldName, Schema};
pub use sequencer::{BookingSession, FlowEvent, FlowState, SessionView, SubmitOutcome};
pub use validator::ValidationReport;
