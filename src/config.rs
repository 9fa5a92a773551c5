//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::booking::context::WorkflowContext;
use crate::booking::model::Language;
use crate::error::ConfigError;
use crate::session::DEFAULT_MAX_SESSIONS;

/// Which dispatcher receives finished booking requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherKind {
    /// Log the request only (development).
    #[default]
    Log,
    Smtp,
    Webhook,
}

impl FromStr for DispatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "smtp" | "email" => Ok(Self::Smtp),
            "webhook" | "http" => Ok(Self::Webhook),
            other => Err(format!("unknown dispatcher '{other}' (expected log, smtp or webhook)")),
        }
    }
}

impl std::fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Log => "log",
            Self::Smtp => "smtp",
            Self::Webhook => "webhook",
        };
        write!(f, "{s}")
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Sessions untouched for this long are pruned.
    pub session_idle_timeout: Duration,
    /// How often the idle sweep runs.
    pub sweep_interval: Duration,
    /// External scheduling page shown on the confirmation step.
    pub calendar_link: Option<String>,
    /// Language used when a session is opened without `lang`.
    pub default_language: Language,
    pub dispatcher: DispatcherKind,
    /// Upper bound on concurrently open sessions.
    pub max_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            session_idle_timeout: Duration::from_secs(30 * 60), // 30 minutes
            sweep_interval: Duration::from_secs(60),
            calendar_link: None,
            default_language: Language::De,
            dispatcher: DispatcherKind::Log,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl AppConfig {
    /// Build config from `BOOKING_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = std::env::var("BOOKING_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = parse_var("BOOKING_PORT")?.unwrap_or(defaults.port);
        let session_idle_timeout = parse_var::<u64>("BOOKING_SESSION_IDLE_MIN")?
            .map(|min| Duration::from_secs(min * 60))
            .unwrap_or(defaults.session_idle_timeout);
        let calendar_link = std::env::var("BOOKING_CALENDAR_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let default_language =
            parse_var::<Language>("BOOKING_DEFAULT_LANG")?.unwrap_or(defaults.default_language);
        let dispatcher =
            parse_var::<DispatcherKind>("BOOKING_DISPATCHER")?.unwrap_or(defaults.dispatcher);
        let max_sessions =
            parse_var::<usize>("BOOKING_MAX_SESSIONS")?.unwrap_or(defaults.max_sessions);

        Ok(Self {
            bind_addr,
            port,
            session_idle_timeout,
            sweep_interval: defaults.sweep_interval,
            calendar_link,
            default_language,
            dispatcher,
            max_sessions,
        })
    }

    /// Context for a new session. `language` overrides the default when the
    /// visitor's page language is known.
    pub fn workflow_context(&self, language: Option<Language>) -> WorkflowContext {
        WorkflowContext {
            language: language.unwrap_or(self.default_language),
            calendar_link: self.calendar_link.clone(),
            ..Default::default()
        }
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
