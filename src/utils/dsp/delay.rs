//! Delay buffers to record and look up past signals.

// -------------------------------------------------------------------------------------------------

/// Multi channel, fixed capacity circular history of the most recent input samples.
///
/// Samples are stored planar, one flat slice per channel. The write cursor always points to the
/// next slot that will be overwritten. Writing does not move the cursor: call [`Self::advance`]
/// once the written block has been consumed, so readers can still address the block that just
/// got written relative to the old cursor.
#[derive(Debug)]
pub struct RingDelayBuffer {
    channels: Vec<Box<[f32]>>,
    capacity: usize,
    write_pos: usize,
}

impl RingDelayBuffer {
    /// Create a new, silent delay buffer with the given channel count and capacity in samples
    /// per channel.
    pub fn new(channel_count: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "Delay buffer capacity must be > 0");
        let channels = (0..channel_count)
            .map(|_| vec![0.0; capacity].into_boxed_slice())
            .collect();
        let write_pos = 0;
        Self {
            channels,
            capacity,
            write_pos,
        }
    }

    /// Number of channels in the buffer.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples each channel can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current write cursor in range `0..capacity`.
    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Read only access to a single channel's raw sample store.
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    /// Silence all channels and reset the write cursor.
    pub fn flush(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
        self.write_pos = 0;
    }

    /// Copy the given input into a channel, starting at the write cursor.
    ///
    /// Spans which cross the end of the buffer continue at index 0. The write cursor is not
    /// changed. Input must not be longer than the buffer's capacity.
    pub fn write(&mut self, channel: usize, input: &[f32]) {
        debug_assert!(
            input.len() <= self.capacity,
            "Input exceeds delay buffer capacity"
        );
        let buffer = &mut self.channels[channel];
        let head_len = (self.capacity - self.write_pos).min(input.len());
        let (head, tail) = input.split_at(head_len);
        buffer[self.write_pos..self.write_pos + head_len].copy_from_slice(head);
        buffer[..tail.len()].copy_from_slice(tail);
    }

    /// Copy `output.len()` samples from a channel, starting at `source_index`, into output.
    ///
    /// `source_index` must already be wrapped into `0..capacity`. Spans which cross the end of
    /// the buffer continue reading at index 0.
    pub fn read_into(&self, channel: usize, source_index: usize, output: &mut [f32]) {
        debug_assert!(source_index < self.capacity, "Unwrapped read index");
        debug_assert!(
            output.len() <= self.capacity,
            "Output exceeds delay buffer capacity"
        );
        let buffer = &self.channels[channel];
        let head_len = (self.capacity - source_index).min(output.len());
        let (head, tail) = output.split_at_mut(head_len);
        head.copy_from_slice(&buffer[source_index..source_index + head_len]);
        let tail_len = tail.len();
        tail.copy_from_slice(&buffer[..tail_len]);
    }

    /// Move the write cursor forward by the given number of samples.
    #[inline]
    pub fn advance(&mut self, samples: usize) {
        self.write_pos = (self.write_pos + samples) % self.capacity;
    }
}

// -------------------------------------------------------------------------------------------------
