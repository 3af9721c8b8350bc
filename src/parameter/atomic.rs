use std::{
    fmt::{Debug, Display},
    sync::atomic::{AtomicU32, Ordering},
};

use super::{FloatParameter, Parameter, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// Holds a float parameter value and its description, and allows reading and writing the value
/// from any thread without locking.
///
/// The value is stored as the bit pattern of an `f32` in an [`AtomicU32`], so a reader in the
/// audio thread never sees a torn value, while a UI or control thread writes it.
pub struct AtomicFloatParameterValue {
    /// The parameter's description and constraints.
    description: FloatParameter,
    /// The current value of the parameter as `f32` bits.
    value: AtomicU32,
}

impl AtomicFloatParameterValue {
    /// Create a new parameter value with the given parameter description, initialized to the
    /// parameter's default value.
    pub fn from_description(description: FloatParameter) -> Self {
        let value = AtomicU32::new(description.default_plain_value().to_bits());
        Self { description, value }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &FloatParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Set a new value as it is, without clamping it into the parameter's range.
    ///
    /// Non finite values (NaN, inf) are ignored.
    pub fn set_value(&self, value: f32) {
        if value.is_finite() {
            self.value.store(value.to_bits(), Ordering::Relaxed);
        } else {
            log::warn!(
                "Ignoring non finite value for parameter '{}'",
                self.description.id()
            );
        }
    }

    /// Set a new value, clamping the given value into the parameter's value bounds if necessary.
    pub fn set_value_clamped(&self, value: f32) {
        if value.is_finite() {
            let clamped = self.description.clamp_value(value);
            if clamped != value {
                log::warn!(
                    "Clamped value {} for parameter '{}' into range {:?}",
                    value,
                    self.description.id(),
                    self.description.range()
                );
            }
            self.value.store(clamped.to_bits(), Ordering::Relaxed);
        } else {
            self.set_value(value);
        }
    }

    /// Reset the value to the parameter's default.
    pub fn reset(&self) {
        self.set_value(self.description.default_plain_value());
    }

    /// Applies a parameter update.
    pub fn apply_update(&self, update: &ParameterValueUpdate) {
        match *update {
            ParameterValueUpdate::Raw(value) => {
                self.set_value_clamped(value);
            }
            ParameterValueUpdate::Normalized(normalized) => {
                if normalized.is_finite() {
                    let value = self
                        .description
                        .denormalize_value(normalized.clamp(0.0, 1.0));
                    self.set_value(value);
                } else {
                    log::warn!(
                        "Invalid normalized value for parameter '{}'",
                        self.description.id()
                    );
                }
            }
        }
    }
}

impl Debug for AtomicFloatParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFloatParameterValue")
            .field("description", &self.description)
            .field("value", &self.value())
            .finish()
    }
}

impl Display for AtomicFloatParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let include_unit = true;
        f.write_str(
            &self
                .description
                .plain_value_to_string(self.value(), include_unit),
        )
    }
}

// -------------------------------------------------------------------------------------------------
