//! Streaming stage running an ordered collection of validators.

use std::sync::Arc;

use futures_core::stream::BoxStream;

use vetting_types::{CancelSignal, Result};

use crate::behavior::{require_next, StreamNext, StreamPipelineBehavior};
use crate::merge::validate_all;
use crate::stages::ValidatedStream;
use crate::validator::SharedValidator;

/// Streaming counterpart of [`CollectionValidationBehavior`](crate::stages::CollectionValidationBehavior).
pub struct CollectionStreamValidationBehavior<Req> {
    validators: Arc<[SharedValidator<Req>]>,
}

impl<Req> CollectionStreamValidationBehavior<Req> {
    pub fn new(validators: impl IntoIterator<Item = SharedValidator<Req>>) -> Self {
        Self {
            validators: validators.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<Req, Res> StreamPipelineBehavior<Req, Res> for CollectionStreamValidationBehavior<Req>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn handle(
        &self,
        request: Arc<Req>,
        cancel: &CancelSignal,
        next: Option<StreamNext<Res>>,
    ) -> Result<BoxStream<'static, Result<Res>>> {
        let next = require_next(next)?;
        let validators = Arc::clone(&self.validators);
        let signal = cancel.clone();
        let validation =
            Box::pin(async move { validate_all(&validators, &request, &signal).await });
        Ok(Box::pin(ValidatedStream::new(validation, next, cancel)))
    }
}
