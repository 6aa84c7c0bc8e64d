//! Stream events and the per-consumer subscription handle.
//!
//! Every pin stream in this crate multicasts [`StreamEvent`]s through a
//! bounded `tokio::sync::broadcast` ring. [`Subscription`] is the consumer
//! side: it resolves lag by skipping to the newest retained sample
//! (latest-value backpressure) and latches after the first terminal event so
//! a consumer observes exactly one error-or-completion per subscription,
//! never a value afterwards.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::error::{PinError, PinResult};

/// An event multicast to the subscribers of a pin stream.
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    /// A sampled or accepted value.
    Value(T),
    /// Terminal failure; no further events follow.
    Error(PinError),
    /// Clean termination; no further events follow.
    Complete,
}

/// A consumer's handle on a multicast pin stream.
///
/// Yields `Ok(value)` for each received value and at most one terminal
/// `Err` before ending. Implements [`futures::Stream`], so a sampled input
/// can be piped straight into an output operator.
///
/// Dropping a subscription cancels it; the producer observes the
/// cancellation on its next pass.
pub struct Subscription<T> {
    inner: BroadcastStream<StreamEvent<T>>,
    done: bool,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub(crate) fn new(rx: broadcast::Receiver<StreamEvent<T>>) -> Self {
        Self {
            inner: BroadcastStream::new(rx),
            done: false,
        }
    }

    /// Receives the next value, or `None` once the stream has terminated.
    ///
    /// A lagging consumer silently resumes at the newest retained sample;
    /// the number of dropped samples is traced.
    pub async fn recv(&mut self) -> Option<PinResult<T>> {
        futures::StreamExt::next(self).await
    }
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = PinResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(StreamEvent::Value(value))) => return Poll::Ready(Some(Ok(value))),
                Some(Ok(StreamEvent::Error(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Some(Ok(StreamEvent::Complete)) | None => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                    trace!(missed, "subscriber lagged, resuming at newest sample");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_then_terminal_error_then_silence() {
        let (tx, rx) = broadcast::channel::<StreamEvent<u8>>(16);
        let mut sub = Subscription::new(rx);

        tx.send(StreamEvent::Value(1u8)).ok();
        tx.send(StreamEvent::Error(PinError::ConnectionLost)).ok();
        tx.send(StreamEvent::Value(2u8)).ok();

        assert_eq!(sub.recv().await, Some(Ok(1)));
        assert_eq!(sub.recv().await, Some(Err(PinError::ConnectionLost)));
        // the latch holds even though a value was broadcast after the error
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn complete_ends_the_stream() {
        let (tx, rx) = broadcast::channel::<StreamEvent<u8>>(16);
        let mut sub = Subscription::new(rx);

        tx.send(StreamEvent::Value(7u8)).ok();
        tx.send(StreamEvent::Complete).ok();

        assert_eq!(sub.recv().await, Some(Ok(7)));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn sender_drop_counts_as_completion() {
        let (tx, rx) = broadcast::channel::<StreamEvent<u8>>(16);
        let mut sub = Subscription::new(rx);
        drop(tx);
        assert_eq!(sub.recv().await, None);
    }
}
