//! Interleaved and planar buffer helpers.

// -------------------------------------------------------------------------------------------------

/// Fill the given buffer with silence.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

/// Add all samples from `source` to `dest`.
#[inline]
pub fn add_buffers(dest: &mut [f32], source: &[f32]) {
    debug_assert_eq!(dest.len(), source.len());
    for (d, s) in dest.iter_mut().zip(source) {
        *d += *s;
    }
}

/// Multiply all samples in `buffer` with the given window and an additional constant gain.
#[inline]
pub fn apply_window(buffer: &mut [f32], window: &[f32], gain: f32) {
    debug_assert_eq!(buffer.len(), window.len());
    for (s, w) in buffer.iter_mut().zip(window) {
        *s *= *w * gain;
    }
}

// -------------------------------------------------------------------------------------------------

/// Copy the given interleaved buffer into the first frames of the given planar one.
///
/// The planar buffer's length defines the channel layout of the interleaved buffer. Each planar
/// channel must hold at least `interleaved.len() / planar.len()` frames.
pub fn interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channel_count = planar.len();
    match channel_count {
        1 => {
            planar[0][..interleaved.len()].copy_from_slice(interleaved);
        }
        2 => {
            let (left, right) = planar.split_at_mut(1);
            for ((frame, l), r) in interleaved
                .chunks_exact(2)
                .zip(left[0].iter_mut())
                .zip(right[0].iter_mut())
            {
                *l = frame[0];
                *r = frame[1];
            }
        }
        _ => {
            for (frame_index, frame) in interleaved.chunks_exact(channel_count).enumerate() {
                for (channel_values, value) in planar.iter_mut().zip(frame) {
                    channel_values[frame_index] = *value;
                }
            }
        }
    }
}

/// Copy the first frames of the given planar buffer into an interleaved one.
///
/// The planar buffer's length defines the channel layout of the interleaved buffer.
pub fn planar_to_interleaved(planar: &[Vec<f32>], interleaved: &mut [f32]) {
    let channel_count = planar.len();
    match channel_count {
        1 => {
            let frame_count = interleaved.len();
            interleaved.copy_from_slice(&planar[0][..frame_count]);
        }
        2 => {
            for ((frame, l), r) in interleaved
                .chunks_exact_mut(2)
                .zip(planar[0].iter())
                .zip(planar[1].iter())
            {
                frame[0] = *l;
                frame[1] = *r;
            }
        }
        _ => {
            for (frame_index, frame) in interleaved.chunks_exact_mut(channel_count).enumerate() {
                for (value, channel_values) in frame.iter_mut().zip(planar) {
                    *value = channel_values[frame_index];
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
