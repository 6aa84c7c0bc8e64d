//! Mock controller for testing without physical hardware.
//!
//! [`MockController`] implements the [`Controller`] contract against
//! scripted data: reads pop from a per-pin script (repeating the last value
//! once exhausted), writes are recorded in order, and failures can be
//! injected at chosen points. Every hardware call is counted so tests can
//! assert open/close pairing and zero-hardware-access guarantees.
//!
//! The connection state is settable from the test side; all open, read, and
//! write calls fail with `ConnectionLost` while the controller is not
//! `Connected`, matching the behavior of a real link.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::{ConnectionState, Controller, PinHandle, PinValue};
use crate::error::{PinError, PinResult};
use crate::spec::{DigitalInputSpec, DigitalOutputSpec, PinNumber};

#[derive(Default)]
struct PinRecord {
    opens: usize,
    closes: usize,
    reads: usize,
    fresh_reads: usize,
    writes: Vec<bool>,
    start_values: Vec<bool>,
    script: VecDeque<PinValue>,
    last: Option<PinValue>,
    fail_writes_after: Option<usize>,
    fail_reads_after: Option<usize>,
    fail_close: bool,
    disconnect_after_reads: Option<usize>,
}

struct MockShared {
    state: Mutex<ConnectionState>,
    pins: Mutex<HashMap<PinNumber, PinRecord>>,
}

impl MockShared {
    fn connected(&self) -> bool {
        self.state.lock().is_connected()
    }

    fn with_record<R>(&self, pin: PinNumber, f: impl FnOnce(&mut PinRecord) -> R) -> R {
        let mut pins = self.pins.lock();
        f(pins.entry(pin).or_default())
    }
}

/// Simulated I/O controller. Clones share the same state and records.
#[derive(Clone)]
pub struct MockController {
    shared: Arc<MockShared>,
}

impl MockController {
    /// Creates a mock controller in the `Connected` state.
    pub fn new() -> Self {
        Self::with_state(ConnectionState::Connected)
    }

    /// Creates a mock controller in an explicit state.
    pub fn with_state(state: ConnectionState) -> Self {
        Self {
            shared: Arc::new(MockShared {
                state: Mutex::new(state),
                pins: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Moves the simulated connection to `state`.
    pub fn set_state(&self, state: ConnectionState) {
        *self.shared.state.lock() = state;
    }

    /// Queues values to be returned by reads on `pin`. Once the script is
    /// exhausted, reads repeat the last value.
    pub fn script_reads(&self, pin: PinNumber, values: impl IntoIterator<Item = PinValue>) {
        self.shared
            .with_record(pin, |rec| rec.script.extend(values));
    }

    /// Queues digital levels to be returned by reads on `pin`.
    pub fn script_digital_reads(&self, pin: PinNumber, levels: impl IntoIterator<Item = bool>) {
        self.script_reads(pin, levels.into_iter().map(PinValue::Digital));
    }

    /// Queues analog readings to be returned by reads on `pin`.
    pub fn script_analog_reads(&self, pin: PinNumber, readings: impl IntoIterator<Item = f32>) {
        self.script_reads(pin, readings.into_iter().map(PinValue::Analog));
    }

    /// Lets the first `count` writes on `pin` succeed and fails the rest
    /// with `ConnectionLost`.
    pub fn fail_writes_after(&self, pin: PinNumber, count: usize) {
        self.shared
            .with_record(pin, |rec| rec.fail_writes_after = Some(count));
    }

    /// Lets the first `count` reads on `pin` succeed and fails the rest
    /// with `ConnectionLost`.
    pub fn fail_reads_after(&self, pin: PinNumber, count: usize) {
        self.shared
            .with_record(pin, |rec| rec.fail_reads_after = Some(count));
    }

    /// Makes every close on `pin` fail.
    pub fn fail_close(&self, pin: PinNumber) {
        self.shared.with_record(pin, |rec| rec.fail_close = true);
    }

    /// Drops the simulated connection once `count` reads have completed on
    /// `pin`.
    pub fn disconnect_after_reads(&self, pin: PinNumber, count: usize) {
        self.shared
            .with_record(pin, |rec| rec.disconnect_after_reads = Some(count));
    }

    /// Successful opens on `pin`.
    pub fn open_count(&self, pin: PinNumber) -> usize {
        self.shared.with_record(pin, |rec| rec.opens)
    }

    /// Close attempts on `pin` (failed attempts included).
    pub fn close_count(&self, pin: PinNumber) -> usize {
        self.shared.with_record(pin, |rec| rec.closes)
    }

    /// Completed reads on `pin`.
    pub fn read_count(&self, pin: PinNumber) -> usize {
        self.shared.with_record(pin, |rec| rec.reads)
    }

    /// Completed fresh reads on `pin` (also counted in
    /// [`read_count`](MockController::read_count)).
    pub fn fresh_read_count(&self, pin: PinNumber) -> usize {
        self.shared.with_record(pin, |rec| rec.fresh_reads)
    }

    /// Levels written to `pin`, in order.
    pub fn writes(&self, pin: PinNumber) -> Vec<bool> {
        self.shared.with_record(pin, |rec| rec.writes.clone())
    }

    /// Initial levels passed to opens of `pin`, in order.
    pub fn start_values(&self, pin: PinNumber) -> Vec<bool> {
        self.shared.with_record(pin, |rec| rec.start_values.clone())
    }

    /// Total hardware calls across all pins, for zero-access assertions.
    pub fn total_hardware_calls(&self) -> usize {
        let pins = self.shared.pins.lock();
        pins.values()
            .map(|rec| rec.opens + rec.closes + rec.reads + rec.writes.len())
            .sum()
    }

    fn open(&self, pin: PinNumber, kind: HandleKind) -> PinResult<Box<dyn PinHandle>> {
        if !self.shared.connected() {
            return Err(PinError::ConnectionLost);
        }
        self.shared.with_record(pin, |rec| rec.opens += 1);
        Ok(Box::new(MockHandle {
            pin,
            kind,
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl Default for MockController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for MockController {
    fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    fn open_digital_input(&self, spec: &DigitalInputSpec) -> PinResult<Box<dyn PinHandle>> {
        self.open(spec.pin, HandleKind::DigitalIn)
    }

    fn open_digital_output(
        &self,
        spec: &DigitalOutputSpec,
        start_value: bool,
    ) -> PinResult<Box<dyn PinHandle>> {
        if !self.shared.connected() {
            return Err(PinError::ConnectionLost);
        }
        self.shared
            .with_record(spec.pin, |rec| rec.start_values.push(start_value));
        self.open(spec.pin, HandleKind::DigitalOut)
    }

    fn open_analog_input(&self, pin: PinNumber) -> PinResult<Box<dyn PinHandle>> {
        self.open(pin, HandleKind::AnalogIn)
    }
}

#[derive(Clone, Copy)]
enum HandleKind {
    DigitalIn,
    DigitalOut,
    AnalogIn,
}

impl HandleKind {
    fn default_value(self) -> PinValue {
        match self {
            HandleKind::DigitalIn | HandleKind::DigitalOut => PinValue::Digital(false),
            HandleKind::AnalogIn => PinValue::Analog(0.0),
        }
    }
}

struct MockHandle {
    pin: PinNumber,
    kind: HandleKind,
    shared: Arc<MockShared>,
}

impl MockHandle {
    fn sample(&mut self, fresh: bool) -> PinResult<PinValue> {
        if !self.shared.connected() {
            return Err(PinError::ConnectionLost);
        }
        let default = self.kind.default_value();
        let mut disconnect = false;
        let value = {
            let mut pins = self.shared.pins.lock();
            let rec = pins.entry(self.pin).or_default();
            if let Some(limit) = rec.fail_reads_after {
                if rec.reads >= limit {
                    return Err(PinError::ConnectionLost);
                }
            }
            rec.reads += 1;
            if fresh {
                rec.fresh_reads += 1;
            }
            let value = rec.script.pop_front().or(rec.last).unwrap_or(default);
            rec.last = Some(value);
            if let Some(count) = rec.disconnect_after_reads {
                if rec.reads >= count {
                    disconnect = true;
                }
            }
            value
        };
        // flip the state after releasing the pin table lock
        if disconnect {
            *self.shared.state.lock() = ConnectionState::Disconnected;
        }
        Ok(value)
    }
}

impl PinHandle for MockHandle {
    fn read(&mut self) -> PinResult<PinValue> {
        self.sample(false)
    }

    fn read_fresh(&mut self) -> PinResult<PinValue> {
        self.sample(true)
    }

    fn write(&mut self, value: PinValue) -> PinResult<()> {
        if !self.shared.connected() {
            return Err(PinError::ConnectionLost);
        }
        let level = value.as_digital().ok_or_else(|| {
            PinError::InvalidArgument("mock outputs carry digital levels".into())
        })?;
        self.shared.with_record(self.pin, |rec| {
            if let Some(limit) = rec.fail_writes_after {
                if rec.writes.len() >= limit {
                    return Err(PinError::ConnectionLost);
                }
            }
            rec.writes.push(level);
            Ok(())
        })
    }

    fn close(&mut self) -> PinResult<()> {
        self.shared.with_record(self.pin, |rec| {
            rec.closes += 1;
            if rec.fail_close {
                Err(PinError::HandleCloseFailure(
                    "simulated close failure".into(),
                ))
            } else {
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads_repeat_last_value() {
        let controller = MockController::new();
        controller.script_digital_reads(2, [true, false]);
        let mut handle = controller
            .open_digital_input(&DigitalInputSpec::new(2))
            .unwrap();

        assert_eq!(handle.read().unwrap(), PinValue::Digital(true));
        assert_eq!(handle.read().unwrap(), PinValue::Digital(false));
        // script exhausted: last value repeats
        assert_eq!(handle.read().unwrap(), PinValue::Digital(false));
        assert_eq!(controller.read_count(2), 3);
    }

    #[test]
    fn opens_fail_while_not_connected() {
        let controller = MockController::with_state(ConnectionState::Connecting);
        assert_eq!(
            controller
                .open_digital_input(&DigitalInputSpec::new(0))
                .err(),
            Some(PinError::ConnectionLost)
        );
        assert_eq!(controller.open_count(0), 0);
    }

    #[test]
    fn write_failure_injection_counts_writes() {
        let controller = MockController::new();
        controller.fail_writes_after(1, 1);
        let mut handle = controller
            .open_digital_output(&DigitalOutputSpec::new(1), false)
            .unwrap();

        assert!(handle.write(PinValue::Digital(true)).is_ok());
        assert_eq!(
            handle.write(PinValue::Digital(false)).err(),
            Some(PinError::ConnectionLost)
        );
        assert_eq!(controller.writes(1), vec![true]);
        assert_eq!(controller.start_values(1), vec![false]);
    }

    #[test]
    fn disconnect_after_reads_flips_state() {
        let controller = MockController::new();
        controller.disconnect_after_reads(3, 1);
        let mut handle = controller
            .open_digital_input(&DigitalInputSpec::new(3))
            .unwrap();

        assert!(handle.read().is_ok());
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert_eq!(handle.read().err(), Some(PinError::ConnectionLost));
    }
}
