//! Stream adapter that validates before yielding anything.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use futures_core::Stream;

use vetting_types::{CancelSignal, PipelineError, Result};

use crate::behavior::StreamNext;

enum State<Res> {
    Validating {
        validation: BoxFuture<'static, Result<()>>,
        next: Option<StreamNext<Res>>,
    },
    Streaming(BoxStream<'static, Result<Res>>),
    Done,
}

/// Runs a validation future to completion, then forwards the continuation's stream.
///
/// - Nothing runs until the first poll.
/// - A validation error is yielded as the only item; the continuation is never invoked.
/// - A fired cancel signal yields one `Err(Canceled)`, drops whatever is in
///   flight, and ends the stream.
pub struct ValidatedStream<Res> {
    state: State<Res>,
    cancelled: BoxFuture<'static, ()>,
}

impl<Res> ValidatedStream<Res> {
    pub fn new(
        validation: BoxFuture<'static, Result<()>>,
        next: StreamNext<Res>,
        cancel: &CancelSignal,
    ) -> Self {
        let signal = cancel.clone();
        Self {
            state: State::Validating {
                validation,
                next: Some(next),
            },
            cancelled: Box::pin(async move { signal.cancelled().await }),
        }
    }
}

impl<Res> Stream for ValidatedStream<Res> {
    type Item = Result<Res>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, State::Done) {
                return Poll::Ready(None);
            }
            if this.cancelled.as_mut().poll(cx).is_ready() {
                this.state = State::Done;
                tracing::debug!("Validated stream canceled");
                return Poll::Ready(Some(Err(PipelineError::Canceled)));
            }

            match &mut this.state {
                State::Validating { validation, next } => match validation.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(err)) => {
                        this.state = State::Done;
                        return Poll::Ready(Some(Err(err)));
                    }
                    Poll::Ready(Ok(())) => match next.take() {
                        Some(next) => this.state = State::Streaming(next()),
                        None => this.state = State::Done,
                    },
                },
                State::Streaming(stream) => match stream.as_mut().poll_next(cx) {
                    Poll::Ready(None) => {
                        this.state = State::Done;
                        return Poll::Ready(None);
                    }
                    polled => return polled,
                },
                State::Done => return Poll::Ready(None),
            }
        }
    }
}
