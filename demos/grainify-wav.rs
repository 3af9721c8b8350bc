//! Runs a wav file through the granular engine and writes the result into a new wav file.
//!
//! Example: `cargo run --example grainify-wav -- input.wav output.wav --density 12 --spread 300`

use std::path::PathBuf;

use arg::{parse_args, Args};

use shatter::{utils::wav::process_wav_file, Error, GranularEngine};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Arguments for the grainify example.
#[derive(Args, Debug)]
struct GrainifyArguments {
    /// Wav file to process
    input_path: PathBuf,
    /// Wav file to write the processed audio into
    output_path: PathBuf,
    #[arg(long = "size")]
    /// Grain size in seconds (default: 0.4)
    size: Option<f32>,
    #[arg(long = "size-random")]
    /// Grain size randomization in range 0-1 (default: 0)
    size_random: Option<f32>,
    #[arg(long = "density")]
    /// Grains per second (default: 5)
    density: Option<f32>,
    #[arg(long = "density-random")]
    /// Grain density randomization in range 0-1 (default: 0)
    density_random: Option<f32>,
    #[arg(long = "width")]
    /// Stereo width of the random grain panning in range 0-1 (default: 0)
    width: Option<f32>,
    #[arg(long = "spread")]
    /// Max random delay of grains in milliseconds (default: 0)
    spread: Option<f32>,
    #[arg(long = "seed")]
    /// Random seed for deterministic renderings
    seed: Option<u64>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<GrainifyArguments>();

    // Init logger
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    // Sample rate and channel layout get set up from the input file when processing
    let mut engine = GranularEngine::with_sample_rate(44100)?;
    if let Some(seed) = args.seed {
        engine.seed(seed);
    }

    // Apply parameters via the shared parameter set, as a UI thread would do
    let parameters = engine.parameters();
    if let Some(size) = args.size {
        parameters.set_grain_size(size);
    }
    if let Some(size_random) = args.size_random {
        parameters.set_grain_size_random(size_random);
    }
    if let Some(density) = args.density {
        parameters.set_grain_frequency(density);
    }
    if let Some(density_random) = args.density_random {
        parameters.set_grain_frequency_random(density_random);
    }
    if let Some(width) = args.width {
        parameters.set_grain_width(width);
    }
    if let Some(spread) = args.spread {
        parameters.set_grain_spread(spread);
    }
    log::info!("Granular parameters: {:?}", parameters.snapshot());

    let frames = process_wav_file(&mut engine, &args.input_path, &args.output_path)?;
    println!(
        "Wrote {} frames to '{}'",
        frames,
        args.output_path.display()
    );

    Ok(())
}
