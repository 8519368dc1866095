//! Stage bound to at most one validator.

use std::sync::Arc;

use async_trait::async_trait;

use vetting_types::{CancelSignal, Result};

use crate::behavior::{require_next, Next, PipelineBehavior};
use crate::merge::validate_single;
use crate::validator::SharedValidator;

/// Validates with a single optional validator, then proceeds.
///
/// Without a validator the stage is a pass-through to `next`.
pub struct ValidationBehavior<Req> {
    validator: Option<SharedValidator<Req>>,
}

impl<Req> ValidationBehavior<Req> {
    pub fn new(validator: Option<SharedValidator<Req>>) -> Self {
        Self { validator }
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }
}

#[async_trait]
impl<Req, Res> PipelineBehavior<Req, Res> for ValidationBehavior<Req>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    async fn handle(
        &self,
        request: Arc<Req>,
        cancel: &CancelSignal,
        next: Option<Next<Res>>,
    ) -> Result<Res> {
        let next = require_next(next)?;
        validate_single(self.validator.as_ref(), &request, cancel).await?;
        next().await
    }
}
