//! Offline rendering of wav files through an [`Effect`].

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{Effect, Error};

// -------------------------------------------------------------------------------------------------

/// Block size in frames used when rendering files.
pub const RENDER_BLOCK_FRAMES: usize = 1024;

// -------------------------------------------------------------------------------------------------

/// Read a wav file's samples as interleaved `f32` samples.
///
/// Returns the file's spec along with the samples. Integer samples get scaled into `-1..=1`.
pub fn read_wav_file<P: AsRef<Path>>(file_path: P) -> Result<(WavSpec, Vec<f32>), Error> {
    let reader = WavReader::open(file_path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok((spec, samples))
}

/// Write interleaved `f32` samples into a new 32bit float wav file.
pub fn write_wav_file<P: AsRef<Path>>(
    file_path: P,
    sample_rate: u32,
    channel_count: usize,
    samples: &[f32],
) -> Result<(), Error> {
    let spec = WavSpec {
        channels: channel_count as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(file_path, spec)?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Run the given interleaved samples through the effect in blocks of [`RENDER_BLOCK_FRAMES`].
///
/// The effect gets initialized with the given layout first. When the effect reports a tail,
/// the output gets extended by that many frames of processed silence.
pub fn render_effect<E: Effect>(
    effect: &mut E,
    sample_rate: u32,
    channel_count: usize,
    input: &[f32],
) -> Result<Vec<f32>, Error> {
    effect.initialize(sample_rate, channel_count, RENDER_BLOCK_FRAMES)?;

    let tail_frames = effect.process_tail().unwrap_or(0);
    let input_samples = input.len() - input.len() % channel_count;
    let mut output = Vec::with_capacity(input_samples + tail_frames * channel_count);
    output.extend_from_slice(&input[..input_samples]);
    output.resize(input_samples + tail_frames * channel_count, 0.0);

    for block in output.chunks_mut(RENDER_BLOCK_FRAMES * channel_count) {
        effect.process(block);
    }
    log::debug!(
        "Rendered {} frames through '{}' ({} tail frames)",
        output.len() / channel_count,
        effect.name(),
        tail_frames
    );
    Ok(output)
}

/// Process a wav file through the given effect and write the result into a new 32bit float
/// wav file with the input file's sample rate and channel layout.
///
/// Returns the number of written frames.
pub fn process_wav_file<E: Effect, P: AsRef<Path>, Q: AsRef<Path>>(
    effect: &mut E,
    input_path: P,
    output_path: Q,
) -> Result<usize, Error> {
    let (spec, input) = read_wav_file(&input_path)?;
    let channel_count = spec.channels as usize;
    log::info!(
        "Processing '{}': {} Hz, {} channel(s), {} frames",
        input_path.as_ref().display(),
        spec.sample_rate,
        channel_count,
        input.len() / channel_count.max(1)
    );
    let output = render_effect(effect, spec.sample_rate, channel_count, &input)?;
    write_wav_file(output_path, spec.sample_rate, channel_count, &output)?;
    Ok(output.len() / channel_count)
}

// -------------------------------------------------------------------------------------------------
