//! Validator capability, shared handle alias, and built-in adapters.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use vetting_types::{CancelSignal, Result, ValidationContext, ValidationOutcome};

// ---------------------------------------------------------------------------
// Validator trait
// ---------------------------------------------------------------------------

/// Produces a [`ValidationOutcome`] for one request.
///
/// Rule violations belong in the returned outcome. An `Err` is reserved for
/// programming errors and for observing a fired [`CancelSignal`].
#[async_trait]
pub trait Validator<Req>: Send + Sync
where
    Req: Send + Sync + 'static,
{
    /// Name used in logs and fault reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn validate(
        &self,
        context: &mut ValidationContext<Req>,
        cancel: &CancelSignal,
    ) -> Result<ValidationOutcome>;
}

/// Validators are supplied to stages by shared reference; stages never own their lifecycle.
pub type SharedValidator<Req> = Arc<dyn Validator<Req>>;

/// Wrap a validator into a [`SharedValidator`].
pub fn shared<Req, V>(validator: V) -> SharedValidator<Req>
where
    Req: Send + Sync + 'static,
    V: Validator<Req> + 'static,
{
    Arc::new(validator)
}

// ---------------------------------------------------------------------------
// FnValidator: closure adapter
// ---------------------------------------------------------------------------

/// Adapts a synchronous closure into a [`Validator`].
pub struct FnValidator<Req, F> {
    name: String,
    check: F,
    _request: PhantomData<fn(&Req)>,
}

impl<Req, F> FnValidator<Req, F>
where
    F: Fn(&Req) -> ValidationOutcome + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<Req, F> Validator<Req> for FnValidator<Req, F>
where
    Req: Send + Sync + 'static,
    F: Fn(&Req) -> ValidationOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(
        &self,
        context: &mut ValidationContext<Req>,
        cancel: &CancelSignal,
    ) -> Result<ValidationOutcome> {
        cancel.check()?;
        Ok((self.check)(context.request()))
    }
}

// ---------------------------------------------------------------------------
// NullValidator
// ---------------------------------------------------------------------------

/// Accepts every request.
pub struct NullValidator;

#[async_trait]
impl<Req> Validator<Req> for NullValidator
where
    Req: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "null"
    }

    async fn validate(
        &self,
        _context: &mut ValidationContext<Req>,
        _cancel: &CancelSignal,
    ) -> Result<ValidationOutcome> {
        Ok(ValidationOutcome::valid())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
