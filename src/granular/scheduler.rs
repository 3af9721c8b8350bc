//! Decides when new grains get spawned and with which randomized properties.

use rand::{rngs::SmallRng, Rng, SeedableRng};

use super::{grain::Grain, parameters::GranularParameterSnapshot};

// -------------------------------------------------------------------------------------------------

/// Spawns grains on a block relative timeline.
///
/// The countdown to the next grain carries over from block to block, so spawn timing does not
/// depend on the host's block size. All random draws use a single generator.
pub(crate) struct GrainScheduler {
    samples_to_next_grain: usize,
    rng: SmallRng,
}

impl GrainScheduler {
    /// Relative grain size limits, applied after randomization, in seconds.
    pub const MIN_GRAIN_SIZE: f64 = 0.1;
    pub const MAX_GRAIN_SIZE: f64 = 1.0;
    /// Grain frequency limits, applied after randomization, in Hz.
    pub const MIN_GRAIN_FREQUENCY: f64 = 1.0;
    pub const MAX_GRAIN_FREQUENCY: f64 = 40.0;

    /// Create a new scheduler, seeding its random generator from the OS.
    pub fn new() -> Self {
        Self {
            samples_to_next_grain: 0,
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Reseed the random generator, e.g. for deterministic tests.
    pub fn seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Reset the countdown, so the next processed block spawns a grain at its first sample.
    pub fn reset(&mut self) {
        self.samples_to_next_grain = 0;
    }

    #[cfg(test)]
    pub fn samples_to_next_grain(&self) -> usize {
        self.samples_to_next_grain
    }

    /// Spawn all grains which trigger within a block of `block_frames`, appending them to
    /// `grains`.
    ///
    /// `write_pos` is the delay buffer's write cursor *before* it got advanced for this block,
    /// so `write_pos + offset` addresses the block's samples in the delay buffer.
    ///
    /// Returns the number of spawned grains.
    pub fn schedule(
        &mut self,
        block_frames: usize,
        write_pos: usize,
        delay_buffer_capacity: usize,
        sample_rate: u32,
        parameters: &GranularParameterSnapshot,
        grains: &mut Vec<Grain>,
    ) -> usize {
        debug_assert!(delay_buffer_capacity > 0);
        let sample_rate = sample_rate as f64;
        // sources never lie ahead of the write cursor or beyond the recorded history
        let spread = parameters
            .spread
            .clamp(0.0, delay_buffer_capacity as f64 / sample_rate);
        let width = parameters.width.clamp(0.0, 1.0);
        let mut spawned = 0;
        let mut block_index = 0;
        while block_frames > block_index + self.samples_to_next_grain {
            block_index += self.samples_to_next_grain;

            // source position, jittered into the past by up to `spread` seconds
            let delay = self.rng.random::<f64>() * spread;
            let delay_samples = (delay * sample_rate) as i64;
            let start_position = ((write_pos + block_index) as i64 - delay_samples)
                .rem_euclid(delay_buffer_capacity as i64) as usize;

            let panning = if width != 0.0 {
                (self.rng.random::<f64>() * 2.0 - 1.0) * width
            } else {
                0.0
            };

            let size = (parameters.size + (self.rng.random::<f64>() - 0.5) * parameters.size_random)
                .clamp(Self::MIN_GRAIN_SIZE, Self::MAX_GRAIN_SIZE);
            let size_samples = (size * sample_rate) as usize;

            log::trace!(
                "Spawning grain at block offset {block_index}: size={size_samples}, pan={panning:.2}, start={start_position}"
            );
            grains.push(Grain::new(
                size_samples,
                panning as f32,
                start_position,
                block_index,
            ));
            spawned += 1;

            let frequency = (parameters.frequency
                + (self.rng.random::<f64>() * 10.0 - 5.0) * parameters.frequency_random)
                .clamp(Self::MIN_GRAIN_FREQUENCY, Self::MAX_GRAIN_FREQUENCY);
            // at least one sample, so extremely low sample rates can't stall the loop
            self.samples_to_next_grain = ((sample_rate / frequency) as usize).max(1);
        }
        self.samples_to_next_grain -= block_frames - block_index;
        spawned
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::granular::mixer::GrainMixer;

    const SAMPLE_RATE: u32 = 48000;
    const CAPACITY: usize = 5 * SAMPLE_RATE as usize;

    fn parameters(size: f64, frequency: f64) -> GranularParameterSnapshot {
        GranularParameterSnapshot {
            size,
            size_random: 0.0,
            frequency,
            frequency_random: 0.0,
            width: 0.0,
            spread: 0.0,
        }
    }

    fn seeded_scheduler() -> GrainScheduler {
        let mut scheduler = GrainScheduler::new();
        scheduler.seed(0x5eed);
        scheduler
    }

    #[test]
    fn first_block_spawns_at_start() {
        let mut scheduler = seeded_scheduler();
        let mut grains = Vec::new();
        let spawned = scheduler.schedule(
            256,
            1000,
            CAPACITY,
            SAMPLE_RATE,
            &parameters(0.5, 10.0),
            &mut grains,
        );
        assert_eq!(spawned, 1);
        assert_eq!(grains[0].relative_start_index(), 0);
        assert_eq!(grains[0].read_index(), 1000);
        assert_eq!(grains[0].size(), 24000);
        assert_eq!(grains[0].panning(), 0.0);
        assert_eq!(scheduler.samples_to_next_grain(), 4800 - 256);
    }

    #[test]
    fn no_spawn_when_countdown_exceeds_block() {
        let mut scheduler = seeded_scheduler();
        let mut grains = Vec::new();
        let parameters = parameters(0.5, 10.0);
        scheduler.schedule(64, 0, CAPACITY, SAMPLE_RATE, &parameters, &mut grains);
        grains.clear();

        let before = scheduler.samples_to_next_grain();
        let spawned = scheduler.schedule(64, 64, CAPACITY, SAMPLE_RATE, &parameters, &mut grains);
        assert_eq!(spawned, 0);
        assert!(grains.is_empty());
        assert_eq!(scheduler.samples_to_next_grain(), before - 64);
    }

    #[test]
    fn spawn_cadence_across_blocks() {
        // 7 Hz at 48kHz: a grain every 6857 samples
        let mut scheduler = seeded_scheduler();
        let parameters = parameters(0.2, 7.0);
        let interval = (SAMPLE_RATE as f64 / 7.0) as usize;

        let mut grains = Vec::new();
        let mut spawn_positions = Vec::new();
        let mut write_pos = 0;
        for block_frames in [512, 1000, 64, 4096, 333, 2048].into_iter().cycle().take(60) {
            scheduler.schedule(
                block_frames,
                write_pos,
                CAPACITY,
                SAMPLE_RATE,
                &parameters,
                &mut grains,
            );
            spawn_positions.extend(
                grains
                    .drain(..)
                    .map(|grain| write_pos + grain.relative_start_index()),
            );
            write_pos += block_frames;
        }
        assert!(spawn_positions.len() > 5);
        assert_eq!(spawn_positions[0], 0);
        for pair in spawn_positions.windows(2) {
            assert_eq!(pair[1] - pair[0], interval);
        }
    }

    #[test]
    fn multiple_spawns_per_block() {
        // 40 Hz: 1200 samples apart, 4 grains in a 4800 sample block
        let mut scheduler = seeded_scheduler();
        let mut grains = Vec::new();
        let spawned = scheduler.schedule(
            4800,
            0,
            CAPACITY,
            SAMPLE_RATE,
            &parameters(0.1, 40.0),
            &mut grains,
        );
        assert_eq!(spawned, 4);
        let offsets = grains
            .iter()
            .map(|g| g.relative_start_index())
            .collect::<Vec<_>>();
        assert_eq!(offsets, [0, 1200, 2400, 3600]);
        assert_eq!(scheduler.samples_to_next_grain(), 0);

        // next block starts with a grain right away
        grains.clear();
        scheduler.schedule(
            100,
            4800,
            CAPACITY,
            SAMPLE_RATE,
            &parameters(0.1, 40.0),
            &mut grains,
        );
        assert_eq!(grains.len(), 1);
        assert_eq!(grains[0].relative_start_index(), 0);
        assert_eq!(grains[0].read_index(), 4800);
    }

    #[test]
    fn size_and_frequency_clamps() {
        let mut scheduler = seeded_scheduler();
        let mut grains = Vec::new();

        // too large sizes are capped at 1 second, too high frequencies at 40 Hz
        scheduler.schedule(
            1,
            0,
            CAPACITY,
            SAMPLE_RATE,
            &parameters(3.0, 1000.0),
            &mut grains,
        );
        assert_eq!(grains[0].size(), SAMPLE_RATE as usize);
        assert_eq!(scheduler.samples_to_next_grain(), 1200 - 1);

        // too small sizes are floored at 100 ms, too low frequencies at 1 Hz
        scheduler.reset();
        scheduler.schedule(
            1,
            0,
            CAPACITY,
            SAMPLE_RATE,
            &parameters(-1.0, 0.0),
            &mut grains,
        );
        assert_eq!(grains[1].size(), SAMPLE_RATE as usize / 10);
        assert_eq!(scheduler.samples_to_next_grain(), SAMPLE_RATE as usize - 1);
    }

    #[test]
    fn randomized_ranges() {
        let mut scheduler = seeded_scheduler();
        let parameters = GranularParameterSnapshot {
            size: 0.5,
            size_random: 1.0,
            frequency: 20.0,
            frequency_random: 1.0,
            width: 0.8,
            spread: 0.5,
        };
        let mut grains = Vec::new();
        let write_pos = 100_000;
        for _ in 0..200 {
            grains.clear();
            scheduler.reset();
            scheduler.schedule(
                1,
                write_pos,
                CAPACITY,
                SAMPLE_RATE,
                &parameters,
                &mut grains,
            );
            assert_eq!(grains.len(), 1);
            let grain = &grains[0];
            // size: 0.5 +- 0.5, clamped to 0.1..=1.0
            assert!(grain.size() >= SAMPLE_RATE as usize / 10);
            assert!(grain.size() <= SAMPLE_RATE as usize);
            // panning: -width..=width
            assert!(grain.panning().abs() <= 0.8);
            // source position: up to 0.5 seconds before the spawn position
            assert!(grain.read_index() <= write_pos);
            assert!(write_pos - grain.read_index() <= SAMPLE_RATE as usize / 2);
            // frequency: 20 +- 5 Hz
            let countdown = scheduler.samples_to_next_grain() + 1;
            assert!(countdown >= (SAMPLE_RATE as f64 / 25.0) as usize);
            assert!(countdown <= (SAMPLE_RATE as f64 / 15.0) as usize);
        }
    }

    #[test]
    fn negative_spread_never_reads_ahead() {
        let mut scheduler = seeded_scheduler();
        let write_pos = 100_000;
        let mut grains = Vec::new();
        for spread in [-0.1, -1.0e20, f64::MIN] {
            let parameters = GranularParameterSnapshot {
                spread,
                ..parameters(0.2, 10.0)
            };
            for _ in 0..50 {
                grains.clear();
                scheduler.reset();
                scheduler.schedule(
                    512,
                    write_pos,
                    CAPACITY,
                    SAMPLE_RATE,
                    &parameters,
                    &mut grains,
                );
                assert_eq!(grains[0].read_index(), write_pos);
            }
        }
    }

    #[test]
    fn huge_spread_stays_within_history() {
        let mut scheduler = seeded_scheduler();
        let parameters = GranularParameterSnapshot {
            spread: 1.0e20,
            ..parameters(0.2, 10.0)
        };
        let write_pos = 1000;
        let mut grains = Vec::new();
        for _ in 0..100 {
            scheduler.reset();
            scheduler.schedule(
                16,
                write_pos,
                CAPACITY,
                SAMPLE_RATE,
                &parameters,
                &mut grains,
            );
        }
        assert!(grains.iter().all(|grain| grain.read_index() < CAPACITY));
    }

    #[test]
    fn width_is_limited_to_unity() {
        let mut scheduler = seeded_scheduler();
        let parameters = GranularParameterSnapshot {
            width: 2.0,
            ..parameters(0.2, 10.0)
        };
        let mut grains = Vec::new();
        for _ in 0..200 {
            scheduler.reset();
            scheduler.schedule(16, 0, CAPACITY, SAMPLE_RATE, &parameters, &mut grains);
        }
        assert!(grains.iter().all(|grain| grain.panning().abs() <= 1.0));
        assert!(grains.iter().any(|grain| grain.panning().abs() > 0.5));
        // panned grains only attenuate, never invert a channel
        for grain in &grains {
            for channel in 0..2 {
                let gain = GrainMixer::channel_gain(grain.panning(), channel, 2);
                assert!((0.0..=1.0).contains(&gain));
            }
        }

        // negative widths do not pan at all
        grains.clear();
        let parameters = GranularParameterSnapshot {
            width: -1.0,
            ..parameters
        };
        for _ in 0..20 {
            scheduler.reset();
            scheduler.schedule(16, 0, CAPACITY, SAMPLE_RATE, &parameters, &mut grains);
        }
        assert!(grains.iter().all(|grain| grain.panning() == 0.0));
    }

    #[test]
    fn source_position_wraps_into_buffer() {
        let mut scheduler = seeded_scheduler();
        let parameters = GranularParameterSnapshot {
            spread: 1.0,
            ..parameters(0.2, 10.0)
        };
        let mut grains = Vec::new();
        for _ in 0..100 {
            scheduler.reset();
            scheduler.schedule(16, 0, CAPACITY, SAMPLE_RATE, &parameters, &mut grains);
        }
        assert!(grains.iter().all(|grain| grain.read_index() < CAPACITY));
        // jittered into the past from cursor 0 lands at the end of the buffer
        assert!(grains
            .iter()
            .any(|grain| grain.read_index() > CAPACITY - SAMPLE_RATE as usize));
    }
}
