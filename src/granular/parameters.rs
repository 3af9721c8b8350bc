//! Shared, lock-free control parameters of the granular engine.

use four_cc::FourCC;

use crate::{
    parameter::{
        AtomicFloatParameterValue, FloatParameter, Parameter, ParameterScaling,
        ParameterValueUpdate,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// A consistent copy of all granular control parameters, taken once per processed block.
///
/// Values are plain, unclamped values. Spread is converted to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GranularParameterSnapshot {
    /// Base grain size in seconds.
    pub size: f64,
    /// Grain size randomization amount.
    pub size_random: f64,
    /// Base grain frequency in Hz (grains per second).
    pub frequency: f64,
    /// Grain frequency randomization amount.
    pub frequency_random: f64,
    /// Stereo width: max absolute random panning per grain.
    pub width: f64,
    /// Max random delay of a grain's source position in seconds.
    pub spread: f64,
}

// -------------------------------------------------------------------------------------------------

/// The granular engine's six control parameters.
///
/// All setters and getters take `&self` and are lock-free, so a single instance can be shared
/// via an `Arc` between a UI or control thread and the audio thread. The audio thread reads all
/// values at once via [`Self::snapshot`] at the start of each processed block.
///
/// Setters store values as they are: out of range values get clamped by the grain scheduler.
/// Parameter updates via [`Self::apply_update`] clamp raw values into the descriptor ranges.
#[derive(Debug)]
pub struct GranularParameters {
    size: AtomicFloatParameterValue,
    size_random: AtomicFloatParameterValue,
    frequency: AtomicFloatParameterValue,
    frequency_random: AtomicFloatParameterValue,
    width: AtomicFloatParameterValue,
    spread: AtomicFloatParameterValue,
}

impl GranularParameters {
    pub const SIZE: FloatParameter =
        FloatParameter::new(FourCC(*b"size"), "Size", 0.05..=2.0, 0.4).with_unit("s");
    pub const SIZE_RANDOM: FloatParameter =
        FloatParameter::new(FourCC(*b"szrn"), "Size Random", 0.0..=1.0, 0.0).with_unit("%");
    pub const FREQUENCY: FloatParameter =
        FloatParameter::new(FourCC(*b"dens"), "Density", 1.0..=30.0, 5.0).with_unit("Hz");
    pub const FREQUENCY_RANDOM: FloatParameter =
        FloatParameter::new(FourCC(*b"dnrn"), "Density Random", 0.0..=1.0, 0.0).with_unit("%");
    pub const WIDTH: FloatParameter =
        FloatParameter::new(FourCC(*b"wdth"), "Width", 0.0..=1.0, 0.0).with_unit("%");
    // skewed so that 200 ms is at the center of the normalized range: ln(0.2) / ln(0.5)
    pub const SPREAD: FloatParameter =
        FloatParameter::new(FourCC(*b"sprd"), "Spread", 0.0..=1000.0, 0.0)
            .with_unit("ms")
            .with_scaling(ParameterScaling::Exponential(2.321_928));

    /// Create a new parameter set with default values.
    pub fn new() -> Self {
        let to_string_percent = |v: f32| format!("{:.2}", v * 100.0);
        let from_string_percent = |v: &str| v.parse::<f32>().map(|f| f / 100.0).ok();

        let to_string_ms = |v: f32| format!("{:.0}", v);
        let from_string_ms = |v: &str| v.parse::<f32>().ok();

        Self {
            size: AtomicFloatParameterValue::from_description(Self::SIZE),
            size_random: AtomicFloatParameterValue::from_description(
                Self::SIZE_RANDOM.with_display(to_string_percent, from_string_percent),
            ),
            frequency: AtomicFloatParameterValue::from_description(Self::FREQUENCY),
            frequency_random: AtomicFloatParameterValue::from_description(
                Self::FREQUENCY_RANDOM.with_display(to_string_percent, from_string_percent),
            ),
            width: AtomicFloatParameterValue::from_description(
                Self::WIDTH.with_display(to_string_percent, from_string_percent),
            ),
            spread: AtomicFloatParameterValue::from_description(
                Self::SPREAD.with_display(to_string_ms, from_string_ms),
            ),
        }
    }

    /// Descriptors of all parameters, in display order.
    pub fn descriptors(&self) -> Vec<&dyn Parameter> {
        self.values()
            .into_iter()
            .map(|value| value.description() as &dyn Parameter)
            .collect()
    }

    /// Lookup a parameter value by its id.
    pub fn value(&self, id: FourCC) -> Option<&AtomicFloatParameterValue> {
        self.values()
            .into_iter()
            .find(|value| value.description().id() == id)
    }

    /// Apply a raw or normalized value update to the parameter with the given id.
    pub fn apply_update(&self, id: FourCC, update: &ParameterValueUpdate) -> Result<(), Error> {
        match self.value(id) {
            Some(value) => {
                value.apply_update(update);
                Ok(())
            }
            None => Err(Error::ParameterError(format!(
                "Unknown granular parameter: '{id}'"
            ))),
        }
    }

    /// Reset all parameters to their default values.
    pub fn reset(&self) {
        for value in self.values() {
            value.reset();
        }
    }

    /// Read all parameters at once.
    pub fn snapshot(&self) -> GranularParameterSnapshot {
        GranularParameterSnapshot {
            size: self.size.value() as f64,
            size_random: self.size_random.value() as f64,
            frequency: self.frequency.value() as f64,
            frequency_random: self.frequency_random.value() as f64,
            width: self.width.value() as f64,
            spread: self.spread.value() as f64 / 1000.0,
        }
    }

    /// Base grain size in seconds.
    pub fn grain_size(&self) -> f32 {
        self.size.value()
    }
    pub fn set_grain_size(&self, seconds: f32) {
        self.size.set_value(seconds);
    }

    /// Grain size randomization amount.
    pub fn grain_size_random(&self) -> f32 {
        self.size_random.value()
    }
    pub fn set_grain_size_random(&self, amount: f32) {
        self.size_random.set_value(amount);
    }

    /// Base grain frequency in Hz.
    pub fn grain_frequency(&self) -> f32 {
        self.frequency.value()
    }
    pub fn set_grain_frequency(&self, hz: f32) {
        self.frequency.set_value(hz);
    }

    /// Grain frequency randomization amount.
    pub fn grain_frequency_random(&self) -> f32 {
        self.frequency_random.value()
    }
    pub fn set_grain_frequency_random(&self, amount: f32) {
        self.frequency_random.set_value(amount);
    }

    /// Stereo width of random grain panning.
    pub fn grain_width(&self) -> f32 {
        self.width.value()
    }
    pub fn set_grain_width(&self, width: f32) {
        self.width.set_value(width);
    }

    /// Grain spread in milliseconds.
    pub fn grain_spread(&self) -> f32 {
        self.spread.value()
    }
    pub fn set_grain_spread(&self, milliseconds: f32) {
        self.spread.set_value(milliseconds);
    }

    fn values(&self) -> [&AtomicFloatParameterValue; 6] {
        [
            &self.size,
            &self.size_random,
            &self.frequency,
            &self.frequency_random,
            &self.width,
            &self.spread,
        ]
    }
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------
