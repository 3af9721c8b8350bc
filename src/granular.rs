//! Real-time granular resynthesis of a live input stream.

use std::sync::Arc;

use four_cc::FourCC;
use no_denormals::no_denormals;

use crate::{
    effect::Effect,
    parameter::{Parameter, ParameterValueUpdate},
    utils::{
        buffer::{interleaved_to_planar, planar_to_interleaved},
        dsp::delay::RingDelayBuffer,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

mod grain;
mod mixer;
mod parameters;
mod scheduler;

use grain::Grain;
use mixer::GrainMixer;
use scheduler::GrainScheduler;

pub use parameters::{GranularParameterSnapshot, GranularParameters};

// -------------------------------------------------------------------------------------------------

/// Granular delay engine.
///
/// Continuously records its input into a circular delay buffer and replaces the input with
/// overlapping, windowed grains read from randomized positions in that history.
///
/// Per processed block, the engine:
/// 1. writes the block into the delay buffer at the current write cursor,
/// 2. spawns new grains, relative to the not yet advanced write cursor,
/// 3. clears the block and mixes all live grains, including the new ones, into it,
/// 4. drops grains which emitted all their samples,
/// 5. advances the write cursor by the block length.
///
/// The engine is always configured: construction requires a sample rate, so `process` can never
/// run on an unallocated delay buffer. Control parameters live in a shared, lock-free
/// [`GranularParameters`] set: use [`GranularEngine::parameters`] to change them from other
/// threads while the engine is running in the audio thread.
pub struct GranularEngine {
    sample_rate: u32,
    channel_count: usize,
    max_frames: usize,
    parameters: Arc<GranularParameters>,
    delay_buffer: RingDelayBuffer,
    grains: Vec<Grain>,
    scheduler: GrainScheduler,
    mixer: GrainMixer,
    block: Vec<Vec<f32>>,
}

impl GranularEngine {
    pub const EFFECT_NAME: &str = "Granular";

    /// Seconds of input history kept in the delay buffer.
    pub const DELAY_BUFFER_SECONDS: f64 = 5.0;
    /// Max block size in frames used by [`Self::with_sample_rate`].
    pub const DEFAULT_MAX_FRAMES: usize = 4096;

    // Initial live grain capacity. Grows on demand when exceeded.
    const GRAIN_CAPACITY: usize = 64;

    /// Create a new engine with the given audio layout and default parameters.
    ///
    /// `max_frames` is the largest block the engine processes at once: longer blocks get split.
    pub fn new(sample_rate: u32, channel_count: usize, max_frames: usize) -> Result<Self, Error> {
        Self::with_parameters(
            sample_rate,
            channel_count,
            max_frames,
            Arc::new(GranularParameters::new()),
        )
    }

    /// Create a new stereo engine with the default max block size.
    pub fn with_sample_rate(sample_rate: u32) -> Result<Self, Error> {
        Self::new(sample_rate, 2, Self::DEFAULT_MAX_FRAMES)
    }

    /// Create a new engine which uses the given, possibly already shared, parameters.
    pub fn with_parameters(
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
        parameters: Arc<GranularParameters>,
    ) -> Result<Self, Error> {
        Self::validate_layout(sample_rate, channel_count, max_frames)?;
        let delay_buffer = RingDelayBuffer::new(
            channel_count,
            Self::delay_buffer_capacity_for(sample_rate, max_frames),
        );
        let engine = Self {
            sample_rate,
            channel_count,
            max_frames,
            parameters,
            delay_buffer,
            grains: Vec::with_capacity(Self::GRAIN_CAPACITY),
            scheduler: GrainScheduler::new(),
            mixer: GrainMixer::new(channel_count, max_frames),
            block: vec![vec![0.0; max_frames]; channel_count],
        };
        log::debug!(
            "Created granular engine: {} Hz, {} channel(s), {} frames delay buffer",
            engine.sample_rate,
            engine.channel_count,
            engine.delay_buffer.capacity()
        );
        Ok(engine)
    }

    /// The engine's sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in processed blocks.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Largest block size which gets processed in one go.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Size of the delay buffer in frames.
    pub fn delay_buffer_capacity(&self) -> usize {
        self.delay_buffer.capacity()
    }

    /// Number of currently playing grains.
    pub fn live_grain_count(&self) -> usize {
        self.grains.len()
    }

    /// Shared handle to the engine's control parameters.
    pub fn parameters(&self) -> Arc<GranularParameters> {
        Arc::clone(&self.parameters)
    }

    /// Reseed the grain scheduler's random generator, e.g. for reproducible renderings.
    pub fn seed(&mut self, seed: u64) {
        self.scheduler.seed(seed);
    }

    /// Reallocate the delay buffer for a new sample rate.
    ///
    /// Resets the write cursor, silences the recorded history and drops all live grains. Must
    /// not be called from the audio thread.
    pub fn configure(&mut self, sample_rate: u32) -> Result<(), Error> {
        Self::validate_layout(sample_rate, self.channel_count, self.max_frames)?;
        self.sample_rate = sample_rate;
        self.delay_buffer = RingDelayBuffer::new(
            self.channel_count,
            Self::delay_buffer_capacity_for(sample_rate, self.max_frames),
        );
        self.grains.clear();
        self.scheduler.reset();
        log::debug!(
            "Configured granular engine: {} Hz, {} frames delay buffer",
            self.sample_rate,
            self.delay_buffer.capacity()
        );
        Ok(())
    }

    /// Silence the recorded history and drop all live grains, keeping the current layout.
    pub fn reset(&mut self) {
        self.delay_buffer.flush();
        self.grains.clear();
        self.scheduler.reset();
    }

    /// Base grain size in seconds.
    pub fn grain_size(&self) -> f32 {
        self.parameters.grain_size()
    }
    pub fn set_grain_size(&self, seconds: f32) {
        self.parameters.set_grain_size(seconds);
    }

    /// Grain size randomization amount.
    pub fn grain_size_random(&self) -> f32 {
        self.parameters.grain_size_random()
    }
    pub fn set_grain_size_random(&self, amount: f32) {
        self.parameters.set_grain_size_random(amount);
    }

    /// Base grain frequency in Hz.
    pub fn grain_frequency(&self) -> f32 {
        self.parameters.grain_frequency()
    }
    pub fn set_grain_frequency(&self, hz: f32) {
        self.parameters.set_grain_frequency(hz);
    }

    /// Grain frequency randomization amount.
    pub fn grain_frequency_random(&self) -> f32 {
        self.parameters.grain_frequency_random()
    }
    pub fn set_grain_frequency_random(&self, amount: f32) {
        self.parameters.set_grain_frequency_random(amount);
    }

    /// Stereo width of random grain panning.
    pub fn grain_width(&self) -> f32 {
        self.parameters.grain_width()
    }
    pub fn set_grain_width(&self, width: f32) {
        self.parameters.set_grain_width(width);
    }

    /// Grain spread in milliseconds.
    pub fn grain_spread(&self) -> f32 {
        self.parameters.grain_spread()
    }
    pub fn set_grain_spread(&self, milliseconds: f32) {
        self.parameters.set_grain_spread(milliseconds);
    }

    /// Process an interleaved block in place: records it, then replaces it with the grain mix.
    ///
    /// Blocks larger than `max_frames` are processed in consecutive chunks. A trailing partial
    /// frame is left untouched.
    pub fn process(&mut self, output: &mut [f32]) {
        let parameters = self.parameters.snapshot();
        let frame_samples = output.len() - output.len() % self.channel_count;
        let chunk_samples = self.max_frames * self.channel_count;
        Self::assert_no_alloc(|| {
            no_denormals(|| {
                for chunk in output[..frame_samples].chunks_mut(chunk_samples) {
                    self.process_chunk(chunk, &parameters);
                }
            })
        });
    }

    fn process_chunk(&mut self, chunk: &mut [f32], parameters: &GranularParameterSnapshot) {
        let frames = chunk.len() / self.channel_count;
        debug_assert!(frames <= self.max_frames);

        // write
        interleaved_to_planar(chunk, &mut self.block);
        for (channel, input) in self.block.iter().enumerate() {
            self.delay_buffer.write(channel, &input[..frames]);
        }

        // spawn: grain windows get allocated on spawn
        Self::permit_alloc(|| {
            self.scheduler.schedule(
                frames,
                self.delay_buffer.write_pos(),
                self.delay_buffer.capacity(),
                self.sample_rate,
                parameters,
                &mut self.grains,
            )
        });

        // mix
        self.mixer
            .render(&mut self.grains, &self.delay_buffer, &mut self.block, frames);
        planar_to_interleaved(&self.block, chunk);

        // retire: frees the windows of finished grains
        Self::permit_alloc(|| GrainMixer::retire_finished(&mut self.grains));

        // advance
        self.delay_buffer.advance(frames);
    }

    fn validate_layout(
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        if !(1..=2).contains(&channel_count) {
            return Err(Error::UnsupportedChannelCount(channel_count));
        }
        if max_frames == 0 {
            return Err(Error::ParameterError(
                "Max block size must be > 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn delay_buffer_capacity_for(sample_rate: u32, max_frames: usize) -> usize {
        ((Self::DELAY_BUFFER_SECONDS * sample_rate as f64).ceil() as usize).max(max_frames)
    }

    #[inline]
    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }

    #[inline]
    fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::permit_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

impl Effect for GranularEngine {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn Parameter> {
        self.parameters.descriptors()
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error> {
        Self::validate_layout(sample_rate, channel_count, max_frames)?;
        if channel_count != self.channel_count || max_frames != self.max_frames {
            self.channel_count = channel_count;
            self.max_frames = max_frames;
            self.mixer = GrainMixer::new(channel_count, max_frames);
            self.block = vec![vec![0.0; max_frames]; channel_count];
        }
        self.configure(sample_rate)
    }

    fn process(&mut self, output: &mut [f32]) {
        GranularEngine::process(self, output);
    }

    fn process_tail(&self) -> Option<usize> {
        // the longest possible grain keeps playing after the input went silent
        Some((GrainScheduler::MAX_GRAIN_SIZE * self.sample_rate as f64).ceil() as usize)
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        self.parameters.apply_update(id, value)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    fn engine(channel_count: usize, max_frames: usize) -> GranularEngine {
        let mut engine = GranularEngine::new(SAMPLE_RATE, channel_count, max_frames).unwrap();
        engine.seed(0x6ae1);
        engine
    }

    #[test]
    fn invalid_layouts() {
        assert!(matches!(
            GranularEngine::new(0, 2, 512),
            Err(Error::InvalidSampleRate(0))
        ));
        assert!(matches!(
            GranularEngine::new(SAMPLE_RATE, 3, 512),
            Err(Error::UnsupportedChannelCount(3))
        ));
        assert!(matches!(
            GranularEngine::new(SAMPLE_RATE, 0, 512),
            Err(Error::UnsupportedChannelCount(0))
        ));
        assert!(matches!(
            GranularEngine::new(SAMPLE_RATE, 2, 0),
            Err(Error::ParameterError(_))
        ));
        let mut engine = engine(2, 512);
        assert!(engine.configure(0).is_err());
        assert!(engine.initialize(SAMPLE_RATE, 6, 512).is_err());
    }

    #[test]
    fn delay_buffer_holds_five_seconds() {
        let engine = engine(2, 512);
        assert_eq!(engine.delay_buffer_capacity(), 5 * SAMPLE_RATE as usize);
        assert_eq!(engine.sample_rate(), SAMPLE_RATE);
        assert_eq!(engine.channel_count(), 2);
        assert_eq!(engine.max_frames(), 512);
    }

    #[test]
    fn silence_in_silence_out() {
        let mut engine = engine(2, 512);
        engine.set_grain_frequency(40.0);
        engine.set_grain_width(1.0);
        engine.set_grain_spread(500.0);
        let mut block = vec![0.0; 512 * 2];
        for _ in 0..100 {
            engine.process(&mut block);
            assert!(block.iter().all(|s| *s == 0.0));
        }
        assert!(engine.live_grain_count() > 0);
    }

    #[test]
    fn impulse_scenario() {
        const BLOCK_FRAMES: usize = 4800;
        let mut engine = engine(2, BLOCK_FRAMES);
        engine.set_grain_size(0.5);
        engine.set_grain_size_random(0.0);
        engine.set_grain_frequency(2.0);
        engine.set_grain_frequency_random(0.0);
        engine.set_grain_width(0.0);
        engine.set_grain_spread(0.0);

        let grain_size = SAMPLE_RATE as usize / 2;
        let window = Grain::new(grain_size, 0.0, 0, 0).window().to_vec();

        let mut spawn_positions = Vec::new();
        let mut output = Vec::new();
        for block_index in 0..6 {
            let mut block = vec![0.0; BLOCK_FRAMES * 2];
            block[0] = 1.0;
            block[1] = 1.0;
            let grains_before = engine.live_grain_count();
            let write_pos = engine.delay_buffer.write_pos();
            engine.process(&mut block);
            // grains spawned in this block which did not finish yet
            for grain in engine.grains.iter().skip(grains_before) {
                spawn_positions.push(write_pos + grain.relative_start_index());
            }
            if block_index < 5 {
                output.extend(block.chunks_exact(2).map(|frame| frame[0]));
            }
        }

        // one grain at t=0 and one at t=0.5s, the first sample of the 6th block
        assert_eq!(spawn_positions, [0, grain_size]);

        // within the first 5 blocks, the first grain plays back every impulse it passes,
        // scaled by the window at the impulse's position in the grain
        assert_eq!(output.len(), grain_size);
        for (index, sample) in output.iter().enumerate() {
            if index % BLOCK_FRAMES == 0 {
                assert_eq!(*sample, window[index]);
            } else {
                assert_eq!(*sample, 0.0);
            }
        }
        assert_eq!(output[0], 0.0);
        assert!(output[BLOCK_FRAMES] > 0.0);
        assert_eq!(engine.live_grain_count(), 1);
    }

    #[test]
    fn new_grain_renders_from_its_start_offset() {
        const BLOCK_FRAMES: usize = 1000;
        let mut engine = engine(1, BLOCK_FRAMES);
        engine.set_grain_size(0.1);
        engine.set_grain_frequency(40.0);

        // 40 Hz: grains at 0, 1200, 2400, ...
        let input = vec![1.0; BLOCK_FRAMES];
        let mut block = input.clone();
        engine.process(&mut block);
        block.copy_from_slice(&input);
        engine.process(&mut block);

        // in the 2nd block the first grain continues, the second one starts at offset 200
        let window = Grain::new(4800, 0.0, 0, 0).window().to_vec();
        for (index, sample) in block.iter().enumerate() {
            let mut expected = window[BLOCK_FRAMES + index];
            if index >= 200 {
                expected += window[index - 200];
            }
            assert_eq_with_epsilon!(*sample, expected, 1e-6);
        }
        assert_eq!(engine.live_grain_count(), 2);
    }

    #[test]
    fn out_of_range_spread_and_width() {
        let mut engine = engine(2, 512);
        let mut block = vec![0.5; 1024];
        engine.set_grain_spread(-100.0);
        engine.set_grain_width(2.0);
        engine.process(&mut block);
        assert_eq!(engine.grains[0].read_index(), 512);
        assert!(engine.grains[0].panning().abs() <= 1.0);
        assert!(block.iter().all(|s| (0.0..=0.5).contains(s)));

        engine.reset();
        engine.set_grain_spread(-1.0e20);
        engine.process(&mut block);
        assert_eq!(engine.grains[0].read_index(), 512);

        engine.reset();
        engine.set_grain_spread(1.0e20);
        for _ in 0..10 {
            engine.process(&mut block);
        }
        assert!(engine
            .grains
            .iter()
            .all(|grain| grain.read_index() < engine.delay_buffer_capacity()));
    }

    #[test]
    fn block_size_independence() {
        // same input, same seed, different block sizes: same output
        let render = |block_frames: usize| {
            let mut engine = GranularEngine::new(SAMPLE_RATE, 2, 8192).unwrap();
            engine.seed(1234);
            engine.set_grain_size(0.2);
            engine.set_grain_size_random(0.5);
            engine.set_grain_frequency(15.0);
            engine.set_grain_frequency_random(0.5);
            engine.set_grain_width(0.7);
            engine.set_grain_spread(100.0);
            let mut signal = (0..SAMPLE_RATE as usize * 2)
                .flat_map(|i| {
                    let s = (i as f32 * 0.01).sin();
                    [s, -s]
                })
                .collect::<Vec<_>>();
            for chunk in signal.chunks_mut(block_frames * 2) {
                engine.process(chunk);
            }
            signal
        };
        let a = render(512);
        let b = render(333);
        let c = render(8192);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn splits_large_blocks() {
        let mut small = GranularEngine::new(SAMPLE_RATE, 2, 256).unwrap();
        small.seed(99);
        let mut large = GranularEngine::new(SAMPLE_RATE, 2, 4096).unwrap();
        large.seed(99);
        for engine in [&mut small, &mut large] {
            engine.set_grain_size(0.1);
            engine.set_grain_frequency(30.0);
        }
        let input = (0..4096 * 2).map(|i| (i % 7) as f32 * 0.1).collect::<Vec<_>>();
        let mut a = input.clone();
        let mut b = input.clone();
        small.process(&mut a);
        large.process(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn reconfigure_and_reset() {
        let mut engine = engine(2, 512);
        let mut block = vec![0.5; 1024];
        engine.process(&mut block);
        assert_eq!(engine.live_grain_count(), 1);

        engine.configure(44100).unwrap();
        assert_eq!(engine.live_grain_count(), 0);
        assert_eq!(engine.sample_rate(), 44100);
        assert_eq!(engine.delay_buffer_capacity(), 5 * 44100);
        assert_eq!(engine.delay_buffer.write_pos(), 0);

        engine.process(&mut block);
        assert_eq!(engine.live_grain_count(), 1);
        engine.reset();
        assert_eq!(engine.live_grain_count(), 0);
        assert!(engine.delay_buffer.channel(0).iter().all(|s| *s == 0.0));

        engine.initialize(SAMPLE_RATE, 1, 128).unwrap();
        assert_eq!(engine.channel_count(), 1);
        assert_eq!(engine.max_frames(), 128);
        let mut mono = vec![0.5; 128];
        engine.process(&mut mono);
        assert_eq!(engine.live_grain_count(), 1);
    }

    #[test]
    fn shared_parameters() {
        let engine = engine(2, 512);
        let parameters = engine.parameters();
        let handle = std::thread::spawn(move || {
            parameters.set_grain_size(0.8);
            parameters.set_grain_spread(120.0);
        });
        handle.join().unwrap();
        assert_eq!(engine.grain_size(), 0.8);
        assert_eq!(engine.grain_spread(), 120.0);
        assert_eq_with_epsilon!(engine.parameters.snapshot().spread, 0.12, 1e-6);
    }

    #[test]
    fn effect_interface() {
        let mut engine = engine(2, 512);
        assert_eq!(engine.name(), "Granular");
        assert_eq!(Effect::parameters(&engine).len(), 6);
        assert_eq!(engine.process_tail(), Some(SAMPLE_RATE as usize));
        engine
            .process_parameter_update(
                GranularParameters::WIDTH.id(),
                &ParameterValueUpdate::Normalized(0.25),
            )
            .unwrap();
        assert_eq!(engine.grain_width(), 0.25);
        assert!(engine
            .process_parameter_update(FourCC(*b"what"), &ParameterValueUpdate::Raw(0.0))
            .is_err());
    }
}
