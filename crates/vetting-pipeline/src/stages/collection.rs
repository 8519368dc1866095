//! Stage running an ordered collection of validators.

use std::sync::Arc;

use async_trait::async_trait;

use vetting_types::{CancelSignal, Result};

use crate::behavior::{require_next, Next, PipelineBehavior};
use crate::merge::validate_all;
use crate::validator::SharedValidator;

/// Runs every validator concurrently, merges all failures, then proceeds.
pub struct CollectionValidationBehavior<Req> {
    validators: Vec<SharedValidator<Req>>,
}

impl<Req> CollectionValidationBehavior<Req> {
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

#[async_trait]
impl<Req, Res> PipelineBehavior<Req, Res> for CollectionValidationBehavior<Req>
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
        validate_all(&self.validators, &request, cancel).await?;
        next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vetting_types::{PipelineError, ValidationFailure, ValidationOutcome};

    use crate::behavior::next_fn;
    use crate::validator::{shared, FnValidator, NullValidator};

    #[derive(Default)]
    struct SampleRequest {
        id: i32,
        name: Option<String>,
    }

    fn rule(
        name: &'static str,
        check: fn(&SampleRequest) -> Vec<ValidationFailure>,
    ) -> SharedValidator<SampleRequest> {
        shared(FnValidator::new(name, move |r: &SampleRequest| {
            ValidationOutcome::from_failures(check(r))
        }))
    }

    fn id_greater_than_zero() -> SharedValidator<SampleRequest> {
        rule("id", |r| {
            if r.id > 0 {
                vec![]
            } else {
                vec![ValidationFailure::new("Id", "'Id' must be greater than '0'.")]
            }
        })
    }

    fn name_not_empty() -> SharedValidator<SampleRequest> {
        rule("name", |r| match r.name.as_deref() {
            Some(n) if !n.is_empty() => vec![],
            _ => vec![ValidationFailure::new("Name", "'Name' must not be empty.")],
        })
    }

    fn counted_next(calls: Arc<AtomicUsize>) -> Next<&'static str> {
        next_fn(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok")
        })
    }

    fn counting_rejector(calls: Arc<AtomicUsize>) -> SharedValidator<SampleRequest> {
        shared(FnValidator::new("counting_rejector", move |_: &SampleRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            ValidationOutcome::from_failures([ValidationFailure::new("Id", "rejected")])
        }))
    }

    #[tokio::test]
    async fn absent_next_is_invalid_argument() {
        let validator_calls = Arc::new(AtomicUsize::new(0));
        let stage = CollectionValidationBehavior::new([
            counting_rejector(validator_calls.clone()),
            counting_rejector(validator_calls.clone()),
        ]);
        let err = PipelineBehavior::<SampleRequest, &'static str>::handle(
            &stage,
            Arc::new(SampleRequest::default()),
            &CancelSignal::none(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { ref name } if name == "next"));
        assert_eq!(validator_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_validators_returns_next_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CollectionValidationBehavior::<SampleRequest>::new(Vec::new());
        assert!(stage.is_empty());
        let result = stage
            .handle(
                Arc::new(SampleRequest::default()),
                &CancelSignal::none(),
                Some(counted_next(calls.clone())),
            )
            .await
            .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn null_validator_returns_next_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CollectionValidationBehavior::new(vec![shared(NullValidator)]);
        let result = stage
            .handle(
                Arc::new(SampleRequest::default()),
                &CancelSignal::none(),
                Some(counted_next(calls.clone())),
            )
            .await
            .unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn passing_and_failing_validator_reports_only_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fails_twice = rule("twice", |_| {
            vec![
                ValidationFailure::new("Id", "f1"),
                ValidationFailure::new("Name", "f2"),
            ]
        });
        let stage = CollectionValidationBehavior::new(vec![shared(NullValidator), fails_twice]);
        let err = stage
            .handle(
                Arc::new(SampleRequest::default()),
                &CancelSignal::none(),
                Some(counted_next(calls.clone())),
            )
            .await
            .unwrap_err();
        let messages: Vec<_> = err
            .failures()
            .unwrap()
            .iter()
            .map(|f| f.error_message.as_str())
            .collect();
        assert_eq!(messages, vec!["f1", "f2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_from_every_validator_are_merged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CollectionValidationBehavior::new(vec![id_greater_than_zero(), name_not_empty()]);
        assert_eq!(stage.len(), 2);
        let err = stage
            .handle(
                Arc::new(SampleRequest::default()),
                &CancelSignal::none(),
                Some(counted_next(calls.clone())),
            )
            .await
            .unwrap_err();
        let properties: Vec<_> = err
            .failures()
            .unwrap()
            .iter()
            .map(|f| f.property_name.as_str())
            .collect();
        assert_eq!(properties, vec!["Id", "Name"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_request_reaches_next_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CollectionValidationBehavior::new(vec![id_greater_than_zero(), name_not_empty()]);
        let request = SampleRequest {
            id: 9,
            name: Some("nine".into()),
        };
        let result = stage
            .handle(
                Arc::new(request),
                &CancelSignal::none(),
                Some(counted_next(calls.clone())),
            )
            .await
            .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
