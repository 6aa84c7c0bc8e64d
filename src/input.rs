//! Polling input source.
//!
//! Turns the controller's blocking read primitives into a shared, lazily
//! started push sequence. One poll loop and one pin handle serve all
//! subscribers of a [`SampledStream`]: the loop starts when the first
//! subscriber arrives and the handle closes when the loop exits, not when an
//! individual consumer cancels. After the loop has exited, a later
//! subscriber starts a fresh loop with a freshly opened handle.
//!
//! The loop checks the connection state and the subscriber count on every
//! pass, so both disconnects and a cooperative cancellation by the last
//! subscriber are observed within one iteration. A zero interval polls with
//! the hardware's fresh-read primitive as fast as it allows; a positive
//! interval paces the cached read with a timed yield.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::controller::{Controller, PinHandle, PinSample};
use crate::error::{self, PinError};
use crate::stream::{StreamEvent, Subscription};

/// Ring capacity for sample fan-out. Lagging consumers drop the oldest
/// retained samples and resume at the newest one (latest-value
/// backpressure); hardware samples are perishable.
const SAMPLE_CHANNEL_CAPACITY: usize = 16;

type HandleOpener = dyn Fn(&dyn Controller) -> crate::error::PinResult<Box<dyn PinHandle>>
    + Send
    + Sync;

/// A shared, lazily-started sequence of sampled pin values.
///
/// Clones share the same underlying poll loop and handle. Construction does
/// not touch the hardware; the input handle is opened when the first
/// [`subscribe`](SampledStream::subscribe) starts the loop.
#[derive(Clone)]
pub struct SampledStream<T: PinSample> {
    shared: Arc<SourceShared<T>>,
}

struct SourceShared<T: PinSample> {
    controller: Arc<dyn Controller>,
    open: Box<HandleOpener>,
    interval: Duration,
    inner: Mutex<SourceInner<T>>,
}

struct SourceInner<T> {
    sender: broadcast::Sender<StreamEvent<T>>,
    running: bool,
}

impl<T: PinSample> SampledStream<T> {
    pub(crate) fn new(
        controller: Arc<dyn Controller>,
        open: Box<HandleOpener>,
        interval: Duration,
    ) -> Self {
        let (sender, _) = broadcast::channel(SAMPLE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(SourceShared {
                controller,
                open,
                interval,
                inner: Mutex::new(SourceInner {
                    sender,
                    running: false,
                }),
            }),
        }
    }

    /// Subscribes to the sampled sequence, starting the poll loop if it is
    /// not already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.shared.inner.lock();
        let rx = inner.sender.subscribe();
        if !inner.running {
            inner.running = true;
            tokio::spawn(poll_loop(Arc::clone(&self.shared)));
        }
        Subscription::new(rx)
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.inner.lock().sender.receiver_count()
    }
}

#[derive(Debug)]
enum LoopExit {
    /// Connection left the `Connected` state.
    Disconnected,
    /// The last subscriber cancelled.
    Cancelled,
    /// A read failed.
    Failed(PinError),
}

async fn poll_loop<T: PinSample>(shared: Arc<SourceShared<T>>) {
    debug!(interval = ?shared.interval, "poll loop starting");

    let mut handle = match (shared.open)(shared.controller.as_ref()) {
        Ok(handle) => handle,
        Err(err) => {
            let err = error::as_stream_error(err);
            finish(&shared, Some(StreamEvent::Error(err)));
            return;
        }
    };

    let fresh = shared.interval.is_zero();
    let mut samples = 0u64;
    let exit = loop {
        // both checks run every pass, before the read, so cancellation and
        // disconnects are observed within one iteration
        if !shared.controller.state().is_connected() {
            break LoopExit::Disconnected;
        }
        if shared.inner.lock().sender.receiver_count() == 0 {
            break LoopExit::Cancelled;
        }

        let raw = if fresh {
            handle.read_fresh()
        } else {
            handle.read()
        };
        match raw {
            Ok(value) => match T::from_pin_value(value) {
                Some(sample) => {
                    samples += 1;
                    // subscribers may have vanished between the check and
                    // the send; the next pass will notice
                    let _ = shared
                        .inner
                        .lock()
                        .sender
                        .send(StreamEvent::Value(sample));
                }
                None => {
                    break LoopExit::Failed(PinError::InvalidArgument(format!(
                        "handle produced incompatible sample {value:?}"
                    )));
                }
            },
            Err(err) => break LoopExit::Failed(error::as_stream_error(err)),
        }

        if fresh {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(shared.interval).await;
        }
    };
    trace!(samples, exit = ?exit, "poll loop exiting");

    // the handle closes exactly once, on every exit path
    let close_result = handle.close().map_err(error::as_close_failure);
    let terminal = match (exit, close_result) {
        (LoopExit::Cancelled, Ok(())) => None,
        (LoopExit::Cancelled, Err(close_err)) => {
            warn!(%close_err, "handle close failed after cancellation");
            None
        }
        (LoopExit::Disconnected, Ok(())) => Some(StreamEvent::Complete),
        (LoopExit::Disconnected, Err(close_err)) => Some(StreamEvent::Error(close_err)),
        (LoopExit::Failed(err), Ok(())) => Some(StreamEvent::Error(err)),
        (LoopExit::Failed(err), Err(close_err)) => {
            Some(StreamEvent::Error(PinError::compose(err, close_err)))
        }
    };
    finish(&shared, terminal);
}

/// Publishes the terminal event (if any) and marks the loop stopped, under
/// one lock acquisition so a racing subscriber either receives this terminal
/// or restarts a fresh loop.
///
/// A cancellation exit carries no terminal; a subscriber that attached after
/// the loop's last count check would otherwise wait on a channel nobody
/// feeds, so the loop is restarted for it instead.
fn finish<T: PinSample>(shared: &Arc<SourceShared<T>>, terminal: Option<StreamEvent<T>>) {
    let mut inner = shared.inner.lock();
    match terminal {
        Some(event) => {
            let _ = inner.sender.send(event);
            inner.running = false;
        }
        None if inner.sender.receiver_count() > 0 => {
            debug!("subscriber raced the cancellation exit, restarting poll loop");
            tokio::spawn(poll_loop(Arc::clone(shared)));
        }
        None => inner.running = false,
    }
}
