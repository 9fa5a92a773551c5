//! Explicit per-session context handed to the workflow at construction.

use chrono::NaiveDate;

use super::model::Language;

/// Source of "today" for date validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Local calendar date of the server.
    System,
    /// A fixed date (tests, previews).
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => chrono::Local::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::System
    }
}

/// Everything a booking session needs from its surroundings.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    /// Language the visitor is browsing in; used for notifications.
    pub language: Language,
    /// External scheduling page shown on confirmation. Opaque to the core.
    pub calendar_link: Option<String>,
    pub clock: Clock,
}

impl WorkflowContext {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
