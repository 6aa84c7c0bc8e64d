//! Immutable pin specifications.
//!
//! A specification identifies a pin number and a direction-specific mode.
//! Direction/mode compatibility is enforced by the type system: an input
//! spec cannot carry an output mode and vice versa. The initial level of an
//! output pin is not part of the spec; it is passed alongside it when the
//! handle is opened, matching the hardware's own open semantics.

use serde::{Deserialize, Serialize};

/// Identifies a pin on the I/O controller.
///
/// Non-negativity is guaranteed by the type; whether the number is valid for
/// the target hardware is checked by the controller at open time.
pub type PinNumber = u32;

/// Termination mode for a digital input pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalInputMode {
    /// No internal resistor; the pin floats when undriven.
    #[default]
    Floating,
    /// Weak internal pull-up resistor.
    PullUp,
    /// Weak internal pull-down resistor.
    PullDown,
}

/// Drive mode for a digital output pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalOutputMode {
    /// Push-pull drive.
    #[default]
    Normal,
    /// Open-drain drive; the pin only sinks current.
    OpenDrain,
}

/// Specification of a digital input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalInputSpec {
    /// Pin number on the controller.
    pub pin: PinNumber,
    /// Input termination mode.
    #[serde(default)]
    pub mode: DigitalInputMode,
}

impl DigitalInputSpec {
    /// Creates a floating input spec for `pin`.
    pub fn new(pin: PinNumber) -> Self {
        Self {
            pin,
            mode: DigitalInputMode::default(),
        }
    }

    /// Creates an input spec with an explicit termination mode.
    pub fn with_mode(pin: PinNumber, mode: DigitalInputMode) -> Self {
        Self { pin, mode }
    }
}

/// Specification of a digital output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalOutputSpec {
    /// Pin number on the controller.
    pub pin: PinNumber,
    /// Output drive mode.
    #[serde(default)]
    pub mode: DigitalOutputMode,
}

impl DigitalOutputSpec {
    /// Creates a push-pull output spec for `pin`.
    pub fn new(pin: PinNumber) -> Self {
        Self {
            pin,
            mode: DigitalOutputMode::default(),
        }
    }

    /// Creates an output spec with an explicit drive mode.
    pub fn with_mode(pin: PinNumber, mode: DigitalOutputMode) -> Self {
        Self { pin, mode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modes_match_hardware_defaults() {
        assert_eq!(DigitalInputSpec::new(3).mode, DigitalInputMode::Floating);
        assert_eq!(DigitalOutputSpec::new(3).mode, DigitalOutputMode::Normal);
    }

    #[test]
    fn explicit_modes_are_kept() {
        let spec = DigitalInputSpec::with_mode(7, DigitalInputMode::PullUp);
        assert_eq!(spec.pin, 7);
        assert_eq!(spec.mode, DigitalInputMode::PullUp);

        let spec = DigitalOutputSpec::with_mode(7, DigitalOutputMode::OpenDrain);
        assert_eq!(spec.mode, DigitalOutputMode::OpenDrain);
    }
}
