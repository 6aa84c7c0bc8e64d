//! Output subject: a hot, multicast sink over one output pin.
//!
//! Where the [`OutputOperator`](crate::output::OutputOperator) lives and
//! dies with one upstream, the subject is created once per process and fed
//! directly: [`accept`](OutputSubject::accept) pushes a commanded value,
//! [`signal_error`](OutputSubject::signal_error) and
//! [`signal_complete`](OutputSubject::signal_complete) terminate. All
//! current observers see every accepted value and the same single terminal
//! event; late observers receive no history (the subject multicasts, it does
//! not replay).
//!
//! The handle is opened lazily on the first accepted value and lives one
//! connection: after a terminal event, [`reopen`](OutputSubject::reopen)
//! re-arms the state machine so the next accepted value opens a fresh handle
//! on the new connection. That is how one process-lifetime subject survives
//! hardware reconnects.
//!
//! Cleanup on a terminal error is deliberately asymmetric: a lost-connection
//! error skips the close attempt (closing a handle whose connection died
//! fails spuriously), while any other error closes the handle and folds a
//! close failure into a composite so neither error is lost.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::controller::{Controller, PinHandle, PinValue};
use crate::error::{self, PinError};
use crate::spec::DigitalOutputSpec;
use crate::stream::{StreamEvent, Subscription};

/// Ring capacity for observer fan-out. Commanded values are few and
/// bursty; a lagging observer drops the oldest entries.
const OBSERVER_CHANNEL_CAPACITY: usize = 64;

/// State machine wrapping the subject's one owned handle.
enum SinkState {
    Unopened,
    Open(Box<dyn PinHandle>),
    Closed,
    Failed,
}

struct SubjectCtl {
    state: SinkState,
    disposed: bool,
    driver: Option<JoinHandle<()>>,
}

struct SubjectInner {
    controller: Arc<dyn Controller>,
    spec: DigitalOutputSpec,
    start_value: bool,
    sender: broadcast::Sender<StreamEvent<bool>>,
    ctl: Mutex<SubjectCtl>,
}

/// A multicast commanded-value sink bound to one output pin.
///
/// Clones share the same sink; observers are attached with
/// [`subscribe`](OutputSubject::subscribe).
#[derive(Clone)]
pub struct OutputSubject {
    inner: Arc<SubjectInner>,
}

impl OutputSubject {
    pub(crate) fn new(
        controller: Arc<dyn Controller>,
        spec: DigitalOutputSpec,
        start_value: bool,
    ) -> Self {
        let (sender, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SubjectInner {
                controller,
                spec,
                start_value,
                sender,
                ctl: Mutex::new(SubjectCtl {
                    state: SinkState::Unopened,
                    disposed: false,
                    driver: None,
                }),
            }),
        }
    }

    /// Attaches an observer. The observer sees every value accepted from
    /// now on and the subject's terminal event; no history is replayed.
    pub fn subscribe(&self) -> Subscription<bool> {
        Subscription::new(self.inner.sender.subscribe())
    }

    /// Pushes one commanded value: opens the handle if this is the first
    /// value, writes it to the pin, then broadcasts it to all observers.
    ///
    /// After a terminal event the value is ignored (no write, no
    /// broadcast).
    pub fn accept(&self, value: bool) {
        let mut ctl = self.inner.ctl.lock();

        if matches!(ctl.state, SinkState::Unopened) {
            match self
                .inner
                .controller
                .open_digital_output(&self.inner.spec, self.inner.start_value)
            {
                Ok(handle) => {
                    debug!(pin = self.inner.spec.pin, "output subject handle opened");
                    ctl.state = SinkState::Open(handle);
                }
                Err(err) => {
                    ctl.state = SinkState::Failed;
                    let err = error::as_stream_error(err);
                    warn!(pin = self.inner.spec.pin, %err, "output subject open failed");
                    let _ = self.inner.sender.send(StreamEvent::Error(err));
                    return;
                }
            }
        }

        let write_err = match &mut ctl.state {
            SinkState::Open(handle) => handle.write(PinValue::Digital(value)).err(),
            _ => {
                trace!(
                    pin = self.inner.spec.pin,
                    value,
                    "value accepted after terminal event, ignoring"
                );
                return;
            }
        };
        match write_err {
            None => {
                let _ = self.inner.sender.send(StreamEvent::Value(value));
            }
            Some(err) => {
                // a failed write means the link is gone; skip the close
                let err = error::as_stream_error(err);
                ctl.state = SinkState::Failed;
                warn!(pin = self.inner.spec.pin, %err, "output subject write failed");
                let _ = self.inner.sender.send(StreamEvent::Error(err));
            }
        }
    }

    /// Terminates the subject with `err`, applying the cleanup policy:
    /// a lost-connection error skips the close attempt; any other error
    /// closes the handle, folding a close failure into a composite.
    ///
    /// A second terminal signal is a no-op (observers see exactly one
    /// terminal event).
    pub fn signal_error(&self, err: PinError) {
        let mut ctl = self.inner.ctl.lock();
        let handle = match std::mem::replace(&mut ctl.state, SinkState::Failed) {
            SinkState::Open(handle) => Some(handle),
            SinkState::Unopened => None,
            prev @ (SinkState::Closed | SinkState::Failed) => {
                ctl.state = prev;
                trace!(pin = self.inner.spec.pin, "already terminated, ignoring error signal");
                return;
            }
        };
        let err = cleanup_after_error(err, handle);
        warn!(pin = self.inner.spec.pin, %err, "output subject terminated with error");
        let _ = self.inner.sender.send(StreamEvent::Error(err));
    }

    /// Terminates the subject cleanly, closing the handle. A close failure
    /// turns the completion into a terminal error; it is never dropped.
    pub fn signal_complete(&self) {
        let mut ctl = self.inner.ctl.lock();
        let handle = match std::mem::replace(&mut ctl.state, SinkState::Closed) {
            SinkState::Open(handle) => Some(handle),
            SinkState::Unopened => None,
            prev @ (SinkState::Closed | SinkState::Failed) => {
                ctl.state = prev;
                trace!(pin = self.inner.spec.pin, "already terminated, ignoring completion");
                return;
            }
        };
        if let Some(mut handle) = handle {
            if let Err(close_err) = handle.close() {
                ctl.state = SinkState::Failed;
                let err = error::as_close_failure(close_err);
                warn!(pin = self.inner.spec.pin, %err, "close on completion failed");
                let _ = self.inner.sender.send(StreamEvent::Error(err));
                return;
            }
            debug!(pin = self.inner.spec.pin, "output subject handle closed");
        }
        let _ = self.inner.sender.send(StreamEvent::Complete);
    }

    /// Feeds the subject from `upstream` on a spawned task, signalling
    /// completion when the upstream ends. [`dispose`](OutputSubject::dispose)
    /// cancels the task without a terminal event.
    ///
    /// A previously attached upstream is cancelled and replaced.
    pub fn drive<S>(&self, upstream: S)
    where
        S: Stream<Item = bool> + Send + Unpin + 'static,
    {
        let subject = self.clone();
        let task = tokio::spawn(async move {
            let mut upstream = upstream;
            while let Some(value) = upstream.next().await {
                subject.accept(value);
            }
            subject.signal_complete();
        });

        let mut ctl = self.inner.ctl.lock();
        if ctl.disposed {
            task.abort();
            return;
        }
        if let Some(prev) = ctl.driver.replace(task) {
            prev.abort();
        }
    }

    /// Detaches the upstream write path without issuing any terminal event
    /// to observers. Idempotent: repeated calls are no-ops. Direct
    /// [`accept`](OutputSubject::accept) remains possible afterwards.
    pub fn dispose(&self) {
        let mut ctl = self.inner.ctl.lock();
        if ctl.disposed {
            trace!(pin = self.inner.spec.pin, "subject already disposed");
            return;
        }
        ctl.disposed = true;
        if let Some(driver) = ctl.driver.take() {
            driver.abort();
        }
        debug!(pin = self.inner.spec.pin, "output subject disposed");
    }

    /// Whether [`dispose`](OutputSubject::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.ctl.lock().disposed
    }

    /// Re-arms a terminated subject for a freshly established connection:
    /// the next accepted value opens a new handle. Has no effect while the
    /// subject is live.
    pub fn reopen(&self) {
        let mut ctl = self.inner.ctl.lock();
        if matches!(ctl.state, SinkState::Closed | SinkState::Failed) {
            ctl.state = SinkState::Unopened;
            debug!(pin = self.inner.spec.pin, "output subject re-armed");
        }
    }

    /// Number of currently attached observers.
    pub fn observer_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Whether any observer is currently attached.
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }
}

/// Only try to close the handle if the terminal error is not a lost
/// connection: a close against a dead connection fails spuriously. When the
/// close itself fails, both errors are preserved in a composite.
fn cleanup_after_error(err: PinError, handle: Option<Box<dyn PinHandle>>) -> PinError {
    match handle {
        Some(mut handle) if !err.is_connection_lost() => match handle.close() {
            Ok(()) => err,
            Err(close_err) => PinError::compose(err, error::as_close_failure(close_err)),
        },
        _ => err,
    }
}
