//! Shared types, errors, validation context, and cancellation for the Vetting pipeline.
//!
//! This crate provides the vocabulary used by every other Vetting crate:
//! - `PipelineError`: unified error taxonomy
//! - `ValidationFailure` / `ValidationOutcome`: what a validator produces
//! - `ValidationContext`: per-invocation state handed to a validator
//! - `CancelSignal`: explicit cancellation handle threaded through every call

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Unified error type for all Vetting subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // === Caller Errors ===
    #[error("Required argument '{name}' was not provided")]
    InvalidArgument { name: String },

    // === Validation ===
    #[error("Validation failed: {}", render_failures(.failures))]
    ValidationFailed { failures: Vec<ValidationFailure> },

    #[error("Operation was canceled")]
    Canceled,

    #[error("Validator '{validator}' faulted: {message}")]
    Validator { validator: String, message: String },

    // === Dispatch ===
    #[error("Handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },

    #[error("No handler registered for request type '{request_type}'")]
    NoHandler { request_type: String },

    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),

    // === Generic ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Build the error raised when a required argument is absent.
    pub fn invalid_argument(name: impl Into<String>) -> Self {
        PipelineError::InvalidArgument { name: name.into() }
    }

    /// Returns `true` for the expected, caller-recoverable validation outcome.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, PipelineError::ValidationFailed { .. })
    }

    /// Returns `true` when the error came from a fired [`CancelSignal`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, PipelineError::Canceled)
    }

    /// The carried failures, if this is a `ValidationFailed` error.
    pub fn failures(&self) -> Option<&[ValidationFailure]> {
        match self {
            PipelineError::ValidationFailed { failures } => Some(failures),
            _ => None,
        }
    }

    /// Maps the error to an HTTP status code for hosts that expose the pipeline over HTTP.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PipelineError::ValidationFailed { .. } | PipelineError::InvalidArgument { .. } => {
                Some(400)
            }
            PipelineError::NoHandler { .. } => Some(404),
            PipelineError::Canceled => Some(499),
            PipelineError::Configuration(_) => Some(500),
            _ => None,
        }
    }
}

fn render_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n -- {f}"))
        .collect::<String>()
}

/// A convenience alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;

// ---------------------------------------------------------------------------
// ValidationFailure: a single rule violation
// ---------------------------------------------------------------------------

/// A single rule violation. The pipeline never interprets it, only collects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub property_name: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_value: Option<serde_json::Value>,
}

impl ValidationFailure {
    pub fn new(property_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            error_message: error_message.into(),
            error_code: None,
            attempted_value: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_attempted_value(mut self, value: serde_json::Value) -> Self {
        self.attempted_value = Some(value);
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property_name, self.error_message)
    }
}

// ---------------------------------------------------------------------------
// ValidationOutcome: what one validator produced
// ---------------------------------------------------------------------------

/// Ordered failure entries produced by one validator.
///
/// An entry may be absent (`None`). Absent entries never count as failures and
/// are skipped by every accessor that hands failures out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    entries: Vec<Option<ValidationFailure>>,
}

impl ValidationOutcome {
    /// An outcome with no entries.
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn from_failures(failures: impl IntoIterator<Item = ValidationFailure>) -> Self {
        Self {
            entries: failures.into_iter().map(Some).collect(),
        }
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.entries.push(Some(failure));
    }

    /// Record an absent entry.
    pub fn push_absent(&mut self) {
        self.entries.push(None);
    }

    /// `true` when no present failure exists.
    pub fn is_valid(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    /// Present failures in recorded order.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.entries.iter().flatten()
    }

    /// Number of present failures.
    pub fn len_present(&self) -> usize {
        self.failures().count()
    }

    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.entries.into_iter().flatten().collect()
    }
}

impl From<Vec<Option<ValidationFailure>>> for ValidationOutcome {
    fn from(entries: Vec<Option<ValidationFailure>>) -> Self {
        Self { entries }
    }
}

impl FromIterator<ValidationFailure> for ValidationOutcome {
    fn from_iter<I: IntoIterator<Item = ValidationFailure>>(iter: I) -> Self {
        Self::from_failures(iter)
    }
}

// ---------------------------------------------------------------------------
// ValidationContext: per-invocation validator state
// ---------------------------------------------------------------------------

/// State handed to exactly one validator invocation.
///
/// Holds a shared handle to the request and a context-local data map the
/// validator may write to. A new context is built for every invocation, so
/// concurrent validators never observe each other's writes.
#[derive(Debug)]
pub struct ValidationContext<Req> {
    request: Arc<Req>,
    root_data: HashMap<String, serde_json::Value>,
}

impl<Req> ValidationContext<Req> {
    pub fn new(request: Arc<Req>) -> Self {
        Self {
            request,
            root_data: HashMap::new(),
        }
    }

    /// The request under validation.
    pub fn request(&self) -> &Req {
        &self.request
    }

    /// Insert or overwrite a context-local value.
    pub fn insert_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.root_data.insert(key.into(), value);
    }

    pub fn data(&self, key: &str) -> Option<&serde_json::Value> {
        self.root_data.get(key)
    }
}

// ---------------------------------------------------------------------------
// CancelSignal: explicit cancellation handle
// ---------------------------------------------------------------------------

/// Cancellation handle passed explicitly through every pipeline call.
///
/// Cloning yields another handle to the **same** signal: cancelling any clone
/// is observed by all of them.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<tokio::sync::watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal in the "not cancelled" state.
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A fresh signal nobody else holds, so it never fires.
    pub fn none() -> Self {
        Self::new()
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn cancel(&self) -> bool {
        let fired = self.sender.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
        if fired {
            tracing::debug!("Cancel signal fired");
        }
        fired
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot observe a closed channel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// `Err(Canceled)` if the signal has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Canceled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
