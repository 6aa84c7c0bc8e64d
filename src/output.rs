//! Output operator.
//!
//! A stream transformer that writes every commanded value to hardware
//! before forwarding it downstream. Construction is pure; the output handle
//! is acquired on the first poll of the applied stream and released on
//! upstream completion or cancellation. Because each applied stream is
//! driven by a single sequential `poll_next` path, writes happen strictly in
//! upstream order with at most one value in flight, and never concurrently
//! with each other.
//!
//! A write or open failure terminates the stream with a single
//! `ConnectionLost` error. The handle is deliberately not closed on that
//! path: the connection behind it is already dead and a close would fail
//! spuriously. Every other exit closes the handle exactly once.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tracing::{debug, warn};

use crate::controller::{Controller, PinHandle, PinValue};
use crate::error::{self, PinResult};
use crate::spec::DigitalOutputSpec;

/// Transformer from a commanded-value stream to a write-through stream.
///
/// Produced by [`PinBridge::digital_output`](crate::bridge::PinBridge::digital_output);
/// apply it to any `Stream<Item = bool>` to obtain the pass-through sequence.
pub struct OutputOperator {
    controller: Arc<dyn Controller>,
    spec: DigitalOutputSpec,
    start_value: bool,
}

impl OutputOperator {
    pub(crate) fn new(
        controller: Arc<dyn Controller>,
        spec: DigitalOutputSpec,
        start_value: bool,
    ) -> Self {
        Self {
            controller,
            spec,
            start_value,
        }
    }

    /// Applies the operator to `upstream`.
    ///
    /// The returned stream yields each upstream value after it has been
    /// written to the pin, and terminates with at most one error.
    pub fn apply<S>(self, upstream: S) -> OutputStream<S>
    where
        S: Stream<Item = bool> + Unpin,
    {
        OutputStream {
            controller: self.controller,
            spec: self.spec,
            start_value: self.start_value,
            upstream,
            state: OutputState::Unopened,
        }
    }
}

enum OutputState {
    Unopened,
    Open(Box<dyn PinHandle>),
    Terminated,
}

/// A commanded-value stream with hardware write-through.
///
/// State machine per applied stream: `Unopened` until the first poll, then
/// `Open` while values flow, then `Terminated` on completion, error, or
/// drop.
pub struct OutputStream<S> {
    controller: Arc<dyn Controller>,
    spec: DigitalOutputSpec,
    start_value: bool,
    upstream: S,
    state: OutputState,
}

impl<S> Stream for OutputStream<S>
where
    S: Stream<Item = bool> + Unpin,
{
    type Item = PinResult<bool>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, OutputState::Terminated) {
                OutputState::Terminated => return Poll::Ready(None),
                OutputState::Unopened => {
                    match this
                        .controller
                        .open_digital_output(&this.spec, this.start_value)
                    {
                        Ok(handle) => {
                            debug!(pin = this.spec.pin, "output handle opened");
                            this.state = OutputState::Open(handle);
                        }
                        Err(err) => {
                            return Poll::Ready(Some(Err(error::as_stream_error(err))));
                        }
                    }
                }
                OutputState::Open(mut handle) => {
                    match Pin::new(&mut this.upstream).poll_next(cx) {
                        Poll::Pending => {
                            this.state = OutputState::Open(handle);
                            return Poll::Pending;
                        }
                        Poll::Ready(Some(value)) => {
                            match handle.write(PinValue::Digital(value)) {
                                Ok(()) => {
                                    this.state = OutputState::Open(handle);
                                    return Poll::Ready(Some(Ok(value)));
                                }
                                Err(err) => {
                                    // the connection behind the handle is
                                    // dead; closing it would fail spuriously
                                    return Poll::Ready(Some(Err(error::as_stream_error(err))));
                                }
                            }
                        }
                        Poll::Ready(None) => {
                            return match handle.close() {
                                Ok(()) => {
                                    debug!(pin = this.spec.pin, "output handle closed");
                                    Poll::Ready(None)
                                }
                                Err(err) => {
                                    Poll::Ready(Some(Err(error::as_close_failure(err))))
                                }
                            };
                        }
                    }
                }
            }
        }
    }
}

impl<S> Drop for OutputStream<S> {
    fn drop(&mut self) {
        // cancellation while open: cease writes and release the pin
        if let OutputState::Open(handle) = &mut self.state {
            if let Err(err) = handle.close() {
                warn!(pin = self.spec.pin, %err, "closing cancelled output handle failed");
            }
        }
    }
}
