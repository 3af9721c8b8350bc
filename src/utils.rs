//! Buffer and DSP helpers used by the granular engine.

pub mod buffer;
pub mod dsp;

#[cfg(feature = "wav-output")]
pub mod wav;
