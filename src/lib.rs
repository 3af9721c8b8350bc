#![doc = include_str!("../README.md")]

// test helpers (must be defined before the mods which use them)
#[cfg(test)]
macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {
        assert!(
            ($x - $y).abs() <= $d,
            "{} != {} (epsilon {})",
            $x,
            $y,
            $d
        )
    };
}

// private mods (will be partly re-exported)
mod effect;
mod error;
mod granular;

// public, flat re-exports
pub use effect::Effect;
pub use error::Error;
pub use granular::{GranularEngine, GranularParameterSnapshot, GranularParameters};

// public mods
pub mod parameter;
pub mod utils;
