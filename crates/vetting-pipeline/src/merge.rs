//! Failure merging and the proceed/abort decision shared by every stage.
//!
//! [`validate_single`] drives one validator sequentially. [`validate_all`] fans
//! the request out to every validator on a [`JoinSet`], each task owning a
//! fresh [`ValidationContext`], and joins the results back in validator order
//! before deciding. Both race the work against the [`CancelSignal`].

use std::any::type_name;
use std::sync::Arc;

use tokio::task::JoinSet;

use vetting_types::{
    CancelSignal, PipelineError, Result, ValidationContext, ValidationFailure, ValidationOutcome,
};

use crate::validator::SharedValidator;

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Present failures of one outcome, absent entries dropped.
pub fn collect_failures(outcome: ValidationOutcome) -> Vec<ValidationFailure> {
    outcome.into_failures()
}

/// Concatenate the present failures of every outcome, in the order given.
pub fn merge_outcomes(outcomes: impl IntoIterator<Item = ValidationOutcome>) -> Vec<ValidationFailure> {
    outcomes
        .into_iter()
        .flat_map(ValidationOutcome::into_failures)
        .collect()
}

/// `Ok` when there is nothing to report, `ValidationFailed` otherwise.
pub fn ensure_valid(failures: Vec<ValidationFailure>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::ValidationFailed { failures })
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run at most one validator. `None` means no validation is configured.
pub async fn validate_single<Req>(
    validator: Option<&SharedValidator<Req>>,
    request: &Arc<Req>,
    cancel: &CancelSignal,
) -> Result<()>
where
    Req: Send + Sync + 'static,
{
    let Some(validator) = validator else {
        return Ok(());
    };
    cancel.check()?;

    tracing::debug!(
        request_type = type_name::<Req>(),
        validator = validator.name(),
        "Validating request"
    );

    let mut context = ValidationContext::new(Arc::clone(request));
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(request_type = type_name::<Req>(), "Validation canceled");
            return Err(PipelineError::Canceled);
        }
        outcome = validator.validate(&mut context, cancel) => outcome?,
    };

    report(type_name::<Req>(), collect_failures(outcome))
}

/// Run every validator concurrently and merge all of their failures.
///
/// Validators are spawned onto a `JoinSet`, so this must be called from within a tokio runtime.
pub async fn validate_all<Req>(
    validators: &[SharedValidator<Req>],
    request: &Arc<Req>,
    cancel: &CancelSignal,
) -> Result<()>
where
    Req: Send + Sync + 'static,
{
    if validators.is_empty() {
        return Ok(());
    }
    cancel.check()?;

    tracing::debug!(
        request_type = type_name::<Req>(),
        validators = validators.len(),
        "Validating request"
    );

    let mut tasks = JoinSet::new();
    for (index, validator) in validators.iter().enumerate() {
        let validator = Arc::clone(validator);
        let mut context = ValidationContext::new(Arc::clone(request));
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let outcome = validator.validate(&mut context, &cancel).await;
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<ValidationOutcome>> = (0..validators.len()).map(|_| None).collect();
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                tracing::debug!(request_type = type_name::<Req>(), "Validation canceled");
                return Err(PipelineError::Canceled);
            }
            joined = tasks.join_next() => joined,
        };
        let Some(joined) = joined else {
            break;
        };
        let (index, outcome) = joined.map_err(|err| PipelineError::Validator {
            validator: format!("validator task for {}", type_name::<Req>()),
            message: err.to_string(),
        })?;
        slots[index] = Some(outcome?);
    }

    report(type_name::<Req>(), merge_outcomes(slots.into_iter().flatten()))
}

fn report(request_type: &str, failures: Vec<ValidationFailure>) -> Result<()> {
    if !failures.is_empty() {
        tracing::warn!(request_type, failures = failures.len(), "Validation failed");
    }
    ensure_valid(failures)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
