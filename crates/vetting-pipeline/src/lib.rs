//! Validation stage for a request/response dispatch pipeline.
//!
//! This crate decides whether a request may proceed to its handler. Zero or
//! more validators inspect the request; their failures are merged and either
//! the pipeline aborts with `ValidationFailed` or the continuation runs.
//! Single-result and streaming variants share the same merge logic, and an
//! explicit registration table wires request types to validators and handlers.

pub mod behavior;
pub mod merge;
pub mod registry;
pub mod stages;
pub mod validator;

pub use behavior::{
    next_fn, require_next, stream_next_fn, Next, PipelineBehavior, StreamNext,
    StreamPipelineBehavior,
};
pub use merge::{collect_failures, ensure_valid, merge_outcomes, validate_all, validate_single};
pub use registry::{
    Mediator, MediatorBuilder, MediatorConfig, Request, RequestHandler, StreamRequest,
    StreamRequestHandler, ValidationMode,
};
pub use stages::{
    CollectionStreamValidationBehavior, CollectionValidationBehavior, StreamValidationBehavior,
    ValidatedStream, ValidationBehavior,
};
pub use validator::{shared, FnValidator, NullValidator, SharedValidator, Validator};
