//! The I/O controller collaborator contract.
//!
//! The bridge does not implement the hardware wire protocol; it binds to an
//! externally-owned connection represented by the [`Controller`] trait. A
//! controller exposes its current [`ConnectionState`] and factory calls that
//! open typed pin handles. Each opened [`PinHandle`] is a live,
//! exclusively-owned resource bound to one pin for one connection lifetime:
//! it is created while the connection is `Connected`, invalidated the
//! instant the connection leaves that state or an explicit close is issued,
//! and never reused afterwards.
//!
//! All calls here are synchronous by contract: a read blocks until a sample
//! is available (the cached variant returns immediately), and a write either
//! completes or fails immediately. The reactive layer above schedules these
//! calls on dedicated tasks; the controller never needs to know about the
//! stream model.
//!
//! The handle surface is one interface over a closed set of capability
//! variants (digital in/out, analog in), selected at construction time by
//! which open call produced the handle. Default method implementations
//! reject the capabilities a handle does not carry, so a controller only
//! implements what its handle actually supports.

use crate::error::{PinError, PinResult};
use crate::spec::{DigitalInputSpec, DigitalOutputSpec, PinNumber};

/// State machine of the hardware connection, owned by the controller.
///
/// Core components only ever observe this value; they never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Link negotiation in progress.
    Connecting,
    /// Link established; pin handles may be opened.
    Connected,
    /// Link lost; all previously opened handles are invalid.
    Disconnected,
    /// The attached hardware speaks an unsupported protocol version.
    Incompatible,
}

impl ConnectionState {
    /// Returns `true` while pin handles are usable.
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// A value carried by a pin, covering the closed set of pin kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinValue {
    /// Logic level of a digital pin.
    Digital(bool),
    /// Normalized reading of an analog pin, 0.0 to 1.0.
    Analog(f32),
}

impl PinValue {
    /// Returns the digital level, if this is a digital value.
    pub fn as_digital(self) -> Option<bool> {
        match self {
            PinValue::Digital(level) => Some(level),
            PinValue::Analog(_) => None,
        }
    }

    /// Returns the analog reading, if this is an analog value.
    pub fn as_analog(self) -> Option<f32> {
        match self {
            PinValue::Analog(reading) => Some(reading),
            PinValue::Digital(_) => None,
        }
    }
}

impl From<bool> for PinValue {
    fn from(level: bool) -> Self {
        PinValue::Digital(level)
    }
}

impl From<f32> for PinValue {
    fn from(reading: f32) -> Self {
        PinValue::Analog(reading)
    }
}

/// Conversion from a raw [`PinValue`] to the typed sample of a stream.
///
/// Implemented for `bool` (digital pins) and `f32` (analog pins); the
/// polling source uses it to produce typed sequences from the untyped
/// handle interface.
pub trait PinSample: Clone + Send + 'static {
    /// Extracts the typed sample, or `None` when the value kind does not
    /// match (a controller contract violation).
    fn from_pin_value(value: PinValue) -> Option<Self>;
}

impl PinSample for bool {
    fn from_pin_value(value: PinValue) -> Option<Self> {
        value.as_digital()
    }
}

impl PinSample for f32 {
    fn from_pin_value(value: PinValue) -> Option<Self> {
        value.as_analog()
    }
}

/// An open pin resource.
///
/// Exclusively owned by exactly one component (poll task, output stream, or
/// subject) for its whole lifetime. Every operation can fail with
/// [`PinError::ConnectionLost`] when the link drops mid-call.
pub trait PinHandle: Send {
    /// Reads the most recent sample the controller holds for this pin.
    ///
    /// May be stale by up to one hardware update period.
    fn read(&mut self) -> PinResult<PinValue> {
        Err(PinError::InvalidArgument(
            "pin handle does not support reads".into(),
        ))
    }

    /// Blocks until a fresh sample has been acquired from the hardware.
    ///
    /// Handles without a dedicated fresh-read path fall back to the cached
    /// read.
    fn read_fresh(&mut self) -> PinResult<PinValue> {
        self.read()
    }

    /// Drives the pin to `value`. Completes or fails immediately.
    fn write(&mut self, value: PinValue) -> PinResult<()> {
        let _ = value;
        Err(PinError::InvalidArgument(
            "pin handle does not support writes".into(),
        ))
    }

    /// Releases the pin back to the controller.
    fn close(&mut self) -> PinResult<()>;
}

/// The external connection collaborator.
///
/// One instance represents one physical link and its state machine. The
/// bridge holds it behind an `Arc` and only ever calls the operations below;
/// connection negotiation, discovery, and the reconnect loop live outside
/// this crate.
pub trait Controller: Send + Sync {
    /// Current state of the connection state machine.
    fn state(&self) -> ConnectionState;

    /// Opens a digital input handle for `spec`.
    fn open_digital_input(&self, spec: &DigitalInputSpec) -> PinResult<Box<dyn PinHandle>>;

    /// Opens a digital output handle for `spec`, driving `start_value` as
    /// the initial level.
    fn open_digital_output(
        &self,
        spec: &DigitalOutputSpec,
        start_value: bool,
    ) -> PinResult<Box<dyn PinHandle>>;

    /// Opens an analog input handle for `pin`.
    fn open_analog_input(&self, pin: PinNumber) -> PinResult<Box<dyn PinHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_value_accessors() {
        assert_eq!(PinValue::Digital(true).as_digital(), Some(true));
        assert_eq!(PinValue::Digital(true).as_analog(), None);
        assert_eq!(PinValue::Analog(0.5).as_analog(), Some(0.5));
        assert_eq!(PinValue::Analog(0.5).as_digital(), None);
    }

    #[test]
    fn typed_sample_conversion() {
        assert_eq!(bool::from_pin_value(PinValue::Digital(true)), Some(true));
        assert_eq!(bool::from_pin_value(PinValue::Analog(0.1)), None);
        assert_eq!(f32::from_pin_value(PinValue::Analog(0.25)), Some(0.25));
        assert_eq!(f32::from_pin_value(PinValue::Digital(false)), None);
    }

    #[test]
    fn only_connected_counts_as_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Incompatible.is_connected());
    }
}
