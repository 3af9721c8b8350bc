//! Renders live grains from the delay buffer into an output block.

use assume::assume;

use super::grain::Grain;

use crate::utils::{
    buffer::{add_buffers, apply_window, clear_buffer},
    dsp::delay::RingDelayBuffer,
};

// -------------------------------------------------------------------------------------------------

/// Overlap-adds all live grains into a planar output block and drops exhausted grains.
///
/// Owns one scratch buffer per channel, sized to the largest block it will ever render, so
/// rendering does not allocate.
pub(crate) struct GrainMixer {
    scratch: Vec<Vec<f32>>,
}

impl GrainMixer {
    pub fn new(channel_count: usize, max_frames: usize) -> Self {
        let scratch = vec![vec![0.0; max_frames]; channel_count];
        Self { scratch }
    }

    /// Largest block size the mixer can render at once.
    pub fn max_frames(&self) -> usize {
        self.scratch.first().map_or(0, Vec::len)
    }

    /// Gain of the given channel for a grain's panning.
    ///
    /// Positive panning attenuates the left channel, negative panning the right one. Only stereo
    /// layouts are panned: mono grains always have unity gain.
    #[inline]
    pub fn channel_gain(panning: f32, channel: usize, channel_count: usize) -> f32 {
        if channel_count != 2 {
            return 1.0;
        }
        match channel {
            0 if panning > 0.0 => 1.0 - panning,
            1 if panning < 0.0 => 1.0 + panning,
            _ => 1.0,
        }
    }

    /// Clear the first `frames` of the output block, then mix all live grains into it.
    ///
    /// Each grain gets its next samples read from the delay buffer, windowed by its cumulative
    /// progress, panned and summed into the output. Grains which emitted all their samples stay
    /// in `grains` until they get removed via [`Self::retire_finished`].
    pub fn render(
        &mut self,
        grains: &mut [Grain],
        delay_buffer: &RingDelayBuffer,
        output: &mut [Vec<f32>],
        frames: usize,
    ) {
        let channel_count = output.len();
        debug_assert_eq!(channel_count, self.scratch.len());
        debug_assert_eq!(channel_count, delay_buffer.channel_count());
        debug_assert!(frames <= self.max_frames());

        for channel in output.iter_mut() {
            clear_buffer(&mut channel[..frames]);
        }

        let capacity = delay_buffer.capacity();
        for grain in grains.iter_mut().filter(|grain| grain.is_active()) {
            let start = grain.block_start();
            if start >= frames {
                continue;
            }
            let amount = grain.remaining().min(frames - start);
            let window_start = grain.write_index();
            assume!(unsafe: window_start + amount <= grain.window().len());
            let window = &grain.window()[window_start..window_start + amount];

            for (channel, (scratch, output)) in
                self.scratch.iter_mut().zip(output.iter_mut()).enumerate()
            {
                let scratch = &mut scratch[start..start + amount];
                delay_buffer.read_into(channel, grain.read_index(), scratch);
                let gain = Self::channel_gain(grain.panning(), channel, channel_count);
                apply_window(scratch, window, gain);
                add_buffers(&mut output[start..start + amount], scratch);
            }

            grain.advance(amount, capacity);
        }
    }

    /// Drop all grains which emitted all their samples. Deallocates the grains' windows.
    pub fn retire_finished(grains: &mut Vec<Grain>) {
        grains.retain(Grain::is_active);
    }
}

// -------------------------------------------------------------------------------------------------
