//! Bridge facade.
//!
//! [`PinBridge`] binds one [`Controller`] instance and hands out
//! pin-addressed stream constructors. Construction is pure: argument
//! validation happens here, before any hardware call, while
//! hardware-reachability errors are deferred to subscription or first-poll
//! time. The bridge does not deduplicate concurrent opens on the same pin;
//! exactly one handle per pin at a time is the caller's responsibility.

use std::sync::Arc;

use crate::controller::Controller;
use crate::error::PinResult;
use crate::input::SampledStream;
use crate::output::OutputOperator;
use crate::spec::{DigitalInputSpec, DigitalOutputSpec, PinNumber};
use crate::subject::OutputSubject;
use crate::validation;

/// Entry point binding reactive pin streams to one controller.
#[derive(Clone)]
pub struct PinBridge {
    controller: Arc<dyn Controller>,
}

impl PinBridge {
    /// Binds a bridge to `controller`.
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self { controller }
    }

    /// Builds a shared sampled stream over a digital input pin.
    ///
    /// `interval_secs == 0.0` polls the fresh-read primitive as fast as the
    /// hardware allows; positive values pace the cached read. Negative or
    /// non-finite intervals fail here, before any hardware access.
    pub fn digital_input(
        &self,
        spec: DigitalInputSpec,
        interval_secs: f64,
    ) -> PinResult<SampledStream<bool>> {
        let interval = validation::validate_interval(interval_secs)?;
        Ok(SampledStream::new(
            Arc::clone(&self.controller),
            Box::new(move |controller| controller.open_digital_input(&spec)),
            interval,
        ))
    }

    /// Builds a shared sampled stream over an analog input pin.
    ///
    /// Interval semantics as for [`digital_input`](PinBridge::digital_input).
    pub fn analog_input(
        &self,
        pin: PinNumber,
        interval_secs: f64,
    ) -> PinResult<SampledStream<f32>> {
        let interval = validation::validate_interval(interval_secs)?;
        Ok(SampledStream::new(
            Arc::clone(&self.controller),
            Box::new(move |controller| controller.open_analog_input(pin)),
            interval,
        ))
    }

    /// Builds an output operator for a digital output pin.
    ///
    /// `start_value` is the level driven when the handle is opened,
    /// independent of the first value later received from upstream.
    pub fn digital_output(&self, spec: DigitalOutputSpec, start_value: bool) -> OutputOperator {
        OutputOperator::new(Arc::clone(&self.controller), spec, start_value)
    }

    /// Builds a multicast output subject for a digital output pin.
    pub fn digital_output_subject(
        &self,
        spec: DigitalOutputSpec,
        start_value: bool,
    ) -> OutputSubject {
        OutputSubject::new(Arc::clone(&self.controller), spec, start_value)
    }
}
