//! Sample requests, validators, and handlers wired into a [`Mediator`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde::Serialize;
use tokio_stream::StreamExt;

use vetting_pipeline::{
    FnValidator, Mediator, MediatorConfig, Request, RequestHandler, StreamRequest,
    StreamRequestHandler, ValidationMode, Validator,
};
use vetting_types::{
    CancelSignal, Result, ValidationContext, ValidationFailure, ValidationOutcome,
};

const MAX_ID: i32 = 10;
const STREAM_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SampleRequest {
    pub id: i32,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResponse {
    pub id: i32,
    pub name: Option<String>,
}

impl Request for SampleRequest {
    type Response = SampleResponse;
}

#[derive(Debug, Clone)]
pub struct SampleStreamRequest {
    pub id: i32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStreamResponse {
    pub id: i32,
    pub sequence: u32,
}

impl StreamRequest for SampleStreamRequest {
    type Item = SampleStreamResponse;
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

pub struct IdGreaterThanZero;

#[async_trait]
impl Validator<SampleRequest> for IdGreaterThanZero {
    fn name(&self) -> &str {
        "id_greater_than_zero"
    }

    async fn validate(
        &self,
        context: &mut ValidationContext<SampleRequest>,
        _cancel: &CancelSignal,
    ) -> Result<ValidationOutcome> {
        let id = context.request().id;
        let mut outcome = ValidationOutcome::valid();
        if id <= 0 {
            outcome.push(
                ValidationFailure::new("Id", "'Id' must be greater than '0'.")
                    .with_code("GreaterThanValidator")
                    .with_attempted_value(serde_json::json!(id)),
            );
        }
        Ok(outcome)
    }
}

pub struct IdLessThanMax;

#[async_trait]
impl Validator<SampleRequest> for IdLessThanMax {
    fn name(&self) -> &str {
        "id_less_than_max"
    }

    async fn validate(
        &self,
        context: &mut ValidationContext<SampleRequest>,
        _cancel: &CancelSignal,
    ) -> Result<ValidationOutcome> {
        let id = context.request().id;
        let mut outcome = ValidationOutcome::valid();
        if id >= MAX_ID {
            outcome.push(
                ValidationFailure::new("Id", format!("'Id' must be less than '{MAX_ID}'."))
                    .with_code("LessThanValidator")
                    .with_attempted_value(serde_json::json!(id)),
            );
        }
        Ok(outcome)
    }
}

/// Checks the address only when one was supplied.
pub struct EmailFormat;

#[async_trait]
impl Validator<SampleRequest> for EmailFormat {
    fn name(&self) -> &str {
        "email_format"
    }

    async fn validate(
        &self,
        context: &mut ValidationContext<SampleRequest>,
        _cancel: &CancelSignal,
    ) -> Result<ValidationOutcome> {
        let mut outcome = ValidationOutcome::valid();
        if let Some(email) = context.request().email.as_deref() {
            if !email.contains('@') {
                outcome.push(
                    ValidationFailure::new("Email", "'Email' must contain '@' symbol.")
                        .with_attempted_value(serde_json::json!(email)),
                );
            }
        }
        Ok(outcome)
    }
}

fn stream_id_positive(request: &SampleStreamRequest) -> ValidationOutcome {
    if request.id > 0 {
        ValidationOutcome::valid()
    } else {
        ValidationOutcome::from_failures([ValidationFailure::new(
            "Id",
            "'Id' must be greater than '0'.",
        )])
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub struct SampleRequestHandler;

#[async_trait]
impl RequestHandler<SampleRequest> for SampleRequestHandler {
    async fn handle(&self, request: &SampleRequest, cancel: &CancelSignal) -> Result<SampleResponse> {
        cancel.check()?;
        tracing::info!(id = request.id, "Handling sample request");
        Ok(SampleResponse {
            id: request.id,
            name: request.name.clone(),
        })
    }
}

pub struct SampleStreamHandler {
    interval: Duration,
}

impl StreamRequestHandler<SampleStreamRequest> for SampleStreamHandler {
    fn handle(
        &self,
        request: Arc<SampleStreamRequest>,
        _cancel: &CancelSignal,
    ) -> BoxStream<'static, Result<SampleStreamResponse>> {
        tracing::info!(id = request.id, count = request.count, "Streaming sample responses");
        let id = request.id;
        Box::pin(
            tokio_stream::iter(0..request.count)
                .throttle(self.interval)
                .map(move |sequence| Ok(SampleStreamResponse { id, sequence })),
        )
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Build the sample mediator.
///
/// Collection mode registers both id bounds and the email check; single mode
/// binds only the lower bound, since a one-to-one binding cannot hold more.
pub fn mediator(config: MediatorConfig) -> Result<Mediator> {
    build(config, STREAM_INTERVAL)
}

fn build(config: MediatorConfig, interval: Duration) -> Result<Mediator> {
    let mode = config.mode;
    let mut builder = Mediator::builder(config)
        .validator::<SampleRequest>(IdGreaterThanZero)
        .handler::<SampleRequest>(SampleRequestHandler)
        .stream_validator::<SampleStreamRequest>(FnValidator::new("stream_id_positive", stream_id_positive))
        .stream_handler::<SampleStreamRequest>(SampleStreamHandler { interval });
    if mode == ValidationMode::Collection {
        builder = builder
            .validator::<SampleRequest>(IdLessThanMax)
            .validator::<SampleRequest>(EmailFormat);
    }
    builder.build()
}
