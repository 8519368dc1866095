//! Explicit registration table and request dispatcher.
//!
//! Request types, their ordered validators, and their handlers are registered
//! up front on a [`MediatorBuilder`]. The resulting [`Mediator`] looks a
//! request type up by [`TypeId`], wraps its handler in the validation stage
//! selected by [`ValidationMode`], and runs the chain.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize};

use vetting_types::{CancelSignal, PipelineError, Result};

use crate::behavior::{next_fn, stream_next_fn, PipelineBehavior, StreamPipelineBehavior};
use crate::stages::{
    CollectionStreamValidationBehavior, CollectionValidationBehavior, StreamValidationBehavior,
    ValidationBehavior,
};
use crate::validator::{SharedValidator, Validator};

// ---------------------------------------------------------------------------
// Request and handler contracts
// ---------------------------------------------------------------------------

/// A request answered by exactly one response.
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
}

/// A request answered by a stream of items.
pub trait StreamRequest: Send + Sync + 'static {
    type Item: Send + 'static;
}

/// Terminal handler for a [`Request`].
#[async_trait]
pub trait RequestHandler<Req: Request>: Send + Sync {
    async fn handle(&self, request: &Req, cancel: &CancelSignal) -> Result<Req::Response>;
}

/// Terminal handler for a [`StreamRequest`].
pub trait StreamRequestHandler<Req: StreamRequest>: Send + Sync {
    fn handle(&self, request: Arc<Req>, cancel: &CancelSignal)
        -> BoxStream<'static, Result<Req::Item>>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which validation stage wraps every handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// One validator per request type, bound one-to-one.
    Single,
    /// Every registered validator runs and all failures are merged.
    #[default]
    Collection,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Single => f.write_str("single"),
            ValidationMode::Collection => f.write_str("collection"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ValidationMode::Single),
            "collection" => Ok(ValidationMode::Collection),
            other => Err(PipelineError::Configuration(format!(
                "unknown validation mode '{other}', expected 'single' or 'collection'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatorConfig {
    #[serde(default)]
    pub mode: ValidationMode,
}

impl MediatorConfig {
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

// ---------------------------------------------------------------------------
// Registration entries
// ---------------------------------------------------------------------------

trait RegisteredEntry: Send + Sync {
    fn request_type(&self) -> &'static str;
    fn validator_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct RequestEntry<Req: Request> {
    validators: Vec<SharedValidator<Req>>,
    handler: Option<Arc<dyn RequestHandler<Req>>>,
}

struct StreamEntry<Req: StreamRequest> {
    validators: Vec<SharedValidator<Req>>,
    handler: Option<Arc<dyn StreamRequestHandler<Req>>>,
}

impl<Req: Request> RegisteredEntry for RequestEntry<Req> {
    fn request_type(&self) -> &'static str {
        type_name::<Req>()
    }

    fn validator_count(&self) -> usize {
        self.validators.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<Req: StreamRequest> RegisteredEntry for StreamEntry<Req> {
    fn request_type(&self) -> &'static str {
        type_name::<Req>()
    }

    fn validator_count(&self) -> usize {
        self.validators.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type EntryTable = HashMap<TypeId, Box<dyn RegisteredEntry>>;

fn entry_mut<E: RegisteredEntry + 'static>(
    table: &mut EntryTable,
    id: TypeId,
    init: impl FnOnce() -> E,
) -> &mut E {
    let entry = table.entry(id).or_insert_with(|| Box::new(init()));
    match entry.as_any_mut().downcast_mut::<E>() {
        Some(entry) => entry,
        None => unreachable!("registration entries are keyed by their own request TypeId"),
    }
}

fn entry_ref<E: RegisteredEntry + 'static>(table: &EntryTable, id: TypeId) -> Option<&E> {
    table.get(&id).and_then(|entry| entry.as_any().downcast_ref::<E>())
}

// ---------------------------------------------------------------------------
// MediatorBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MediatorBuilder {
    config: MediatorConfig,
    requests: EntryTable,
    streams: EntryTable,
}

impl MediatorBuilder {
    pub fn new(config: MediatorConfig) -> Self {
        Self {
            config,
            requests: HashMap::new(),
            streams: HashMap::new(),
        }
    }

    fn request_entry<Req: Request>(&mut self) -> &mut RequestEntry<Req> {
        entry_mut(&mut self.requests, TypeId::of::<Req>(), || RequestEntry {
            validators: Vec::new(),
            handler: None,
        })
    }

    fn stream_entry<Req: StreamRequest>(&mut self) -> &mut StreamEntry<Req> {
        entry_mut(&mut self.streams, TypeId::of::<Req>(), || StreamEntry {
            validators: Vec::new(),
            handler: None,
        })
    }

    /// Append a validator for `Req`. Validators run in registration order.
    pub fn validator<Req: Request>(mut self, validator: impl Validator<Req> + 'static) -> Self {
        self.request_entry::<Req>().validators.push(Arc::new(validator));
        self
    }

    /// Register the handler for `Req`, replacing any earlier one.
    pub fn handler<Req: Request>(mut self, handler: impl RequestHandler<Req> + 'static) -> Self {
        self.request_entry::<Req>().handler = Some(Arc::new(handler));
        self
    }

    pub fn stream_validator<Req: StreamRequest>(
        mut self,
        validator: impl Validator<Req> + 'static,
    ) -> Self {
        self.stream_entry::<Req>().validators.push(Arc::new(validator));
        self
    }

    pub fn stream_handler<Req: StreamRequest>(
        mut self,
        handler: impl StreamRequestHandler<Req> + 'static,
    ) -> Self {
        self.stream_entry::<Req>().handler = Some(Arc::new(handler));
        self
    }

    /// Freeze the table. Fails in `Single` mode if any request type has more than one validator.
    pub fn build(self) -> Result<Mediator> {
        if self.config.mode == ValidationMode::Single {
            if let Some(entry) = self
                .requests
                .values()
                .chain(self.streams.values())
                .find(|entry| entry.validator_count() > 1)
            {
                return Err(PipelineError::Configuration(format!(
                    "request type '{}' has {} validators but validation mode is '{}'",
                    entry.request_type(),
                    entry.validator_count(),
                    self.config.mode
                )));
            }
        }

        tracing::debug!(
            mode = %self.config.mode,
            requests = self.requests.len(),
            streams = self.streams.len(),
            "Mediator built"
        );

        Ok(Mediator {
            config: self.config,
            requests: self.requests,
            streams: self.streams,
        })
    }
}

// ---------------------------------------------------------------------------
// Mediator
// ---------------------------------------------------------------------------

/// Dispatches requests through their validation stage to their handler.
pub struct Mediator {
    config: MediatorConfig,
    requests: EntryTable,
    streams: EntryTable,
}

impl Mediator {
    pub fn builder(config: MediatorConfig) -> MediatorBuilder {
        MediatorBuilder::new(config)
    }

    pub fn mode(&self) -> ValidationMode {
        self.config.mode
    }

    /// Validate `request` and, if it passes, hand it to its handler.
    pub async fn send<Req: Request>(
        &self,
        request: Req,
        cancel: &CancelSignal,
    ) -> Result<Req::Response> {
        let entry = entry_ref::<RequestEntry<Req>>(&self.requests, TypeId::of::<Req>());
        let handler = entry
            .and_then(|entry| entry.handler.clone())
            .ok_or_else(|| PipelineError::NoHandler {
                request_type: type_name::<Req>().to_string(),
            })?;
        let validators = entry.map(|entry| entry.validators.clone()).unwrap_or_default();

        let stage: Box<dyn PipelineBehavior<Req, Req::Response>> = match self.config.mode {
            ValidationMode::Single => Box::new(ValidationBehavior::new(validators.first().cloned())),
            ValidationMode::Collection => Box::new(CollectionValidationBehavior::new(validators)),
        };

        let request = Arc::new(request);
        let handler_request = Arc::clone(&request);
        let handler_cancel = cancel.clone();
        let next = next_fn(move || async move {
            handler.handle(&handler_request, &handler_cancel).await
        });

        tracing::debug!(request_type = type_name::<Req>(), mode = %self.config.mode, "Dispatching request");
        stage.handle(request, cancel, Some(next)).await
    }

    /// Validate `request` lazily and stream its handler's items.
    pub fn create_stream<Req: StreamRequest>(
        &self,
        request: Req,
        cancel: &CancelSignal,
    ) -> Result<BoxStream<'static, Result<Req::Item>>> {
        let entry = entry_ref::<StreamEntry<Req>>(&self.streams, TypeId::of::<Req>());
        let handler = entry
            .and_then(|entry| entry.handler.clone())
            .ok_or_else(|| PipelineError::NoHandler {
                request_type: type_name::<Req>().to_string(),
            })?;
        let validators = entry.map(|entry| entry.validators.clone()).unwrap_or_default();

        let stage: Box<dyn StreamPipelineBehavior<Req, Req::Item>> = match self.config.mode {
            ValidationMode::Single => {
                Box::new(StreamValidationBehavior::new(validators.first().cloned()))
            }
            ValidationMode::Collection => {
                Box::new(CollectionStreamValidationBehavior::new(validators))
            }
        };

        let request = Arc::new(request);
        let handler_request = Arc::clone(&request);
        let handler_cancel = cancel.clone();
        let next = stream_next_fn(move || handler.handle(handler_request, &handler_cancel));

        tracing::debug!(request_type = type_name::<Req>(), mode = %self.config.mode, "Dispatching stream request");
        stage.handle(request, cancel, Some(next))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
