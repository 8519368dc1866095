//! Streaming stage bound to at most one validator.

use std::sync::Arc;

use futures_core::stream::BoxStream;

use vetting_types::{CancelSignal, Result};

use crate::behavior::{require_next, StreamNext, StreamPipelineBehavior};
use crate::merge::validate_single;
use crate::stages::ValidatedStream;
use crate::validator::SharedValidator;

/// Streaming counterpart of [`ValidationBehavior`](crate::stages::ValidationBehavior).
pub struct StreamValidationBehavior<Req> {
    validator: Option<SharedValidator<Req>>,
}

impl<Req> StreamValidationBehavior<Req> {
    pub fn new(validator: Option<SharedValidator<Req>>) -> Self {
        Self { validator }
    }
}

impl<Req, Res> StreamPipelineBehavior<Req, Res> for StreamValidationBehavior<Req>
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
        let validator = self.validator.clone();
        let signal = cancel.clone();
        let validation = Box::pin(async move {
            validate_single(validator.as_ref(), &request, &signal).await
        });
        Ok(Box::pin(ValidatedStream::new(validation, next, cancel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_stream::StreamExt;
    use vetting_types::{PipelineError, ValidationFailure, ValidationOutcome};

    use crate::behavior::stream_next_fn;
    use crate::validator::{shared, FnValidator};

    #[derive(Default)]
    struct SampleStreamRequest {
        id: i32,
    }

    fn id_greater_than_zero() -> SharedValidator<SampleStreamRequest> {
        shared(FnValidator::new("id", |r: &SampleStreamRequest| {
            if r.id > 0 {
                ValidationOutcome::valid()
            } else {
                ValidationOutcome::from_failures([ValidationFailure::new(
                    "Id",
                    "'Id' must be greater than '0'.",
                )])
            }
        }))
    }

    fn results(invocations: Arc<AtomicUsize>) -> StreamNext<String> {
        stream_next_fn(move || {
            invocations.fetch_add(1, Ordering::SeqCst);
            tokio_stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())])
        })
    }

    fn counting_rejector(calls: Arc<AtomicUsize>) -> SharedValidator<SampleStreamRequest> {
        shared(FnValidator::new("counting_rejector", move |_: &SampleStreamRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            ValidationOutcome::from_failures([ValidationFailure::new("Id", "rejected")])
        }))
    }

    #[tokio::test]
    async fn absent_next_is_reported_before_streaming() {
        let validator_calls = Arc::new(AtomicUsize::new(0));
        let stage = StreamValidationBehavior::new(Some(counting_rejector(validator_calls.clone())));
        let result = StreamPipelineBehavior::<SampleStreamRequest, String>::handle(
            &stage,
            Arc::new(SampleStreamRequest::default()),
            &CancelSignal::none(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::InvalidArgument { .. })));
        tokio::task::yield_now().await;
        assert_eq!(validator_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_validator_streams_everything() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let stage = StreamValidationBehavior::<SampleStreamRequest>::new(None);
        let stream = stage
            .handle(
                Arc::new(SampleStreamRequest::default()),
                &CancelSignal::none(),
                Some(results(invocations.clone())),
            )
            .unwrap();
        let items: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec!["a", "b"]);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_request_yields_no_elements() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let stage = StreamValidationBehavior::new(Some(id_greater_than_zero()));
        let items: Vec<_> = stage
            .handle(
                Arc::new(SampleStreamRequest { id: 0 }),
                &CancelSignal::none(),
                Some(results(invocations.clone())),
            )
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.failures().unwrap().len(), 1);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_waits_for_first_poll() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let stage = StreamValidationBehavior::new(Some(id_greater_than_zero()));
        let stream = stage
            .handle(
                Arc::new(SampleStreamRequest { id: 4 }),
                &CancelSignal::none(),
                Some(results(invocations.clone())),
            )
            .unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }
}
