//! Common, shared DSP tools.

pub mod delay;
