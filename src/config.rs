//! Configuration management.
//!
//! Declarative pin maps loaded from TOML, so an application can describe its
//! wiring in a file instead of hard-coding specs:
//!
//! ```toml
//! [[pins]]
//! pin = 0
//! role = "digital_out"
//! start_value = false
//!
//! [[pins]]
//! pin = 35
//! role = "digital_in"
//! input_mode = "pull_up"
//! interval_secs = 0.05
//! ```
//!
//! Validation runs at load time, before any hardware use.

use config::Config;
use serde::Deserialize;

use crate::error::{PinError, PinResult};
use crate::spec::{
    DigitalInputMode, DigitalInputSpec, DigitalOutputMode, DigitalOutputSpec, PinNumber,
};
use crate::validation;

/// Direction and kind of a configured pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinRole {
    /// Sampled digital input.
    DigitalIn,
    /// Commanded digital output.
    DigitalOut,
    /// Sampled analog input.
    AnalogIn,
}

/// One configured pin.
#[derive(Debug, Clone, Deserialize)]
pub struct PinConfig {
    /// Pin number on the controller.
    pub pin: PinNumber,
    /// Direction and kind.
    pub role: PinRole,
    /// Termination mode, for digital inputs.
    #[serde(default)]
    pub input_mode: DigitalInputMode,
    /// Drive mode, for digital outputs.
    #[serde(default)]
    pub output_mode: DigitalOutputMode,
    /// Poll interval in seconds, for inputs. Zero polls at full rate.
    #[serde(default)]
    pub interval_secs: f64,
    /// Initial level, for outputs.
    #[serde(default)]
    pub start_value: bool,
}

impl PinConfig {
    /// The input spec described by this entry.
    pub fn digital_input_spec(&self) -> DigitalInputSpec {
        DigitalInputSpec::with_mode(self.pin, self.input_mode)
    }

    /// The output spec described by this entry.
    pub fn digital_output_spec(&self) -> DigitalOutputSpec {
        DigitalOutputSpec::with_mode(self.pin, self.output_mode)
    }
}

/// Pin map for one bridge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeSettings {
    /// Configured pins.
    #[serde(default)]
    pub pins: Vec<PinConfig>,
}

impl BridgeSettings {
    /// Loads and validates settings from a TOML file.
    pub fn from_file(path: &str) -> PinResult<Self> {
        let cfg = Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|err| PinError::InvalidArgument(err.to_string()))?;
        let settings: Self = cfg
            .try_deserialize()
            .map_err(|err| PinError::InvalidArgument(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks intervals and pin uniqueness.
    pub fn validate(&self) -> PinResult<()> {
        for entry in &self.pins {
            validation::validate_interval(entry.interval_secs).map_err(|err| {
                PinError::InvalidArgument(format!("pin {}: {err}", entry.pin))
            })?;
        }
        if let Some(pin) = validation::find_duplicate_pin(self.pins.iter().map(|p| p.pin)) {
            return Err(PinError::InvalidArgument(format!(
                "pin {pin} is configured more than once"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn parse(toml: &str) -> PinResult<BridgeSettings> {
        let cfg = Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|err| PinError::InvalidArgument(err.to_string()))?;
        let settings: BridgeSettings = cfg
            .try_deserialize()
            .map_err(|err| PinError::InvalidArgument(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn parses_roles_and_modes() {
        let settings = parse(
            r#"
            [[pins]]
            pin = 0
            role = "digital_out"
            start_value = true

            [[pins]]
            pin = 35
            role = "digital_in"
            input_mode = "pull_up"
            interval_secs = 0.05

            [[pins]]
            pin = 40
            role = "analog_in"
            "#,
        )
        .unwrap();

        assert_eq!(settings.pins.len(), 3);
        assert_eq!(settings.pins[0].role, PinRole::DigitalOut);
        assert!(settings.pins[0].start_value);
        assert_eq!(
            settings.pins[1].digital_input_spec(),
            DigitalInputSpec::with_mode(35, DigitalInputMode::PullUp)
        );
        assert_eq!(settings.pins[2].role, PinRole::AnalogIn);
        assert_eq!(settings.pins[2].interval_secs, 0.0);
    }

    #[test]
    fn rejects_duplicate_pins() {
        let err = parse(
            r#"
            [[pins]]
            pin = 4
            role = "digital_in"

            [[pins]]
            pin = 4
            role = "digital_out"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_negative_intervals() {
        let err = parse(
            r#"
            [[pins]]
            pin = 2
            role = "digital_in"
            interval_secs = -0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PinError::InvalidArgument(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[[pins]]\npin = 1\nrole = \"digital_out\"\nstart_value = true\n"
        )
        .unwrap();

        let settings = BridgeSettings::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.pins.len(), 1);
        assert!(settings.pins[0].start_value);
    }
}
