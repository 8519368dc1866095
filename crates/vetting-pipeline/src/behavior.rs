//! Pipeline behavior traits and continuation types.
//!
//! A behavior is one composable unit in a request-handling chain. It receives
//! the request, the cancel signal, and `next` (the rest of the chain) and
//! decides whether to proceed. `next` is optional so an absent continuation is
//! reported as `InvalidArgument` instead of being unrepresentable.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use futures_core::Stream;

use vetting_types::{CancelSignal, PipelineError, Result};

/// The remainder of a single-result pipeline.
pub type Next<Res> = Box<dyn FnOnce() -> BoxFuture<'static, Result<Res>> + Send>;

/// The remainder of a streaming pipeline.
pub type StreamNext<Res> = Box<dyn FnOnce() -> BoxStream<'static, Result<Res>> + Send>;

pub fn next_fn<Res, F, Fut>(f: F) -> Next<Res>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Res>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

pub fn stream_next_fn<Res, F, S>(f: F) -> StreamNext<Res>
where
    F: FnOnce() -> S + Send + 'static,
    S: Stream<Item = Result<Res>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Unwrap a continuation or fail with `InvalidArgument`.
pub fn require_next<T>(next: Option<T>) -> Result<T> {
    next.ok_or_else(|| PipelineError::invalid_argument("next"))
}

// ---------------------------------------------------------------------------
// Behavior traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PipelineBehavior<Req, Res>: Send + Sync
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    /// Run this stage. `next` is invoked at most once.
    async fn handle(
        &self,
        request: Arc<Req>,
        cancel: &CancelSignal,
        next: Option<Next<Res>>,
    ) -> Result<Res>;
}

pub trait StreamPipelineBehavior<Req, Res>: Send + Sync
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    /// Run this stage over a streaming continuation.
    ///
    /// The outer `Result` only reports an absent continuation. Everything else,
    /// validation included, happens lazily once the returned stream is polled.
    fn handle(
        &self,
        request: Arc<Req>,
        cancel: &CancelSignal,
        next: Option<StreamNext<Res>>,
    ) -> Result<BoxStream<'static, Result<Res>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn require_next_rejects_absent_continuation() {
        let err = require_next::<Next<u8>>(None)
            .err()
            .expect("absent next must fail");
        assert!(matches!(err, PipelineError::InvalidArgument { ref name } if name == "next"));
    }

    #[tokio::test]
    async fn next_fn_defers_until_invoked() {
        let next = next_fn(|| async { Ok::<_, PipelineError>(5_u8) });
        let next = require_next(Some(next)).unwrap();
        assert_eq!(next().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn stream_next_fn_yields_elements() {
        let next = stream_next_fn(|| tokio_stream::iter(vec![Ok(1_u8), Ok(2)]));
        let items: Vec<_> = next().collect().await;
        assert_eq!(items.len(), 2);
    }
}
