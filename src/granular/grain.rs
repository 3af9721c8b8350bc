//! A single, in-flight grain.

use std::f64::consts::PI;

// -------------------------------------------------------------------------------------------------

/// One grain: a windowed snippet of the delay buffer's history, which gets mixed into the
/// output over one or more blocks.
///
/// A grain is live as long as `write_index < size`. Grains are never reused: once exhausted,
/// they get dropped by the mixer.
#[derive(Debug, Clone)]
pub(crate) struct Grain {
    /// Total length in samples.
    size: usize,
    /// Current read position in the delay buffer. Advances and wraps with the buffer.
    read_index: usize,
    /// Number of samples emitted so far, in `0..=size`.
    write_index: usize,
    /// Offset within the block the grain got spawned in, where it first produces sound.
    relative_start_index: usize,
    /// Stereo panning in range `-1..=1`.
    panning: f32,
    /// Precomputed squared sine envelope of length `size`.
    window: Box<[f32]>,
}

impl Grain {
    pub fn new(size: usize, panning: f32, read_index: usize, relative_start_index: usize) -> Self {
        Self {
            size,
            read_index,
            write_index: 0,
            relative_start_index,
            panning,
            window: Self::create_window(size),
        }
    }

    /// Squared sine (Hann) window: `sin(pi * i / size)^2`.
    fn create_window(size: usize) -> Box<[f32]> {
        (0..size)
            .map(|i| {
                let phase = PI * i as f64 / size as f64;
                phase.sin().powi(2) as f32
            })
            .collect()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    #[inline]
    pub fn relative_start_index(&self) -> usize {
        self.relative_start_index
    }

    #[inline]
    pub fn panning(&self) -> f32 {
        self.panning
    }

    #[inline]
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Samples left to emit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.size - self.write_index
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.write_index < self.size
    }

    /// Block local offset the grain renders from in the current block: the spawn offset for
    /// grains which did not emit anything yet, else the start of the block.
    #[inline]
    pub fn block_start(&self) -> usize {
        if self.write_index == 0 {
            self.relative_start_index
        } else {
            0
        }
    }

    /// Move the grain forward after `frames` samples got emitted.
    #[inline]
    pub fn advance(&mut self, frames: usize, delay_buffer_capacity: usize) {
        debug_assert!(frames <= self.remaining());
        self.read_index = (self.read_index + frames) % delay_buffer_capacity;
        self.write_index += frames;
    }
}

// -------------------------------------------------------------------------------------------------
