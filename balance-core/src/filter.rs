//! Trimmed-mean window filter.
//!
//! Keeps the last `N` integer samples, sorts a copy on every update, drops the
//! [`TRIM`] lowest and [`TRIM`] highest values and averages the rest. Up to
//! `TRIM` spikes on each side of the window have no effect on the output; the
//! price is a response lag of `N` samples.
//!
//! The mean is rounded half away from zero, so a window of `-3, -2` and one of
//! `2, 3` give symmetric results (`-3` and `3`).

use crate::error::ConfigError;

/// Samples discarded from each end of the sorted window. Not tunable.
pub const TRIM: usize = 2;

/// Smallest window that leaves at least one sample after trimming.
pub const MIN_WINDOW: usize = 2 * TRIM + 1;

/// Reference window length.
pub const DEFAULT_WINDOW: usize = 16;

#[derive(Clone, Debug)]
pub struct WindowFilter<const N: usize> {
    buffer: [i16; N],
    cursor: usize,
    output: i16,
}

impl<const N: usize> WindowFilter<N> {
    /// Create a filter whose whole window is pre-filled with `fill`.
    pub fn new(fill: i16) -> Result<Self, ConfigError> {
        if N < MIN_WINDOW {
            return Err(ConfigError::WindowTooSmall {
                size: N,
                min: MIN_WINDOW,
            });
        }
        Ok(Self {
            buffer: [fill; N],
            cursor: 0,
            output: fill,
        })
    }

    /// Refill the window with `fill` and make it the current output.
    pub fn reset(&mut self, fill: i16) {
        self.buffer = [fill; N];
        self.cursor = 0;
        self.output = fill;
    }

    /// Push one raw sample and return the new filtered value.
    pub fn process(&mut self, raw: i16) -> i16 {
        self.buffer[self.cursor] = raw;
        self.cursor = (self.cursor + 1) % N;

        let mut sorted = self.buffer;
        sorted.sort_unstable();

        let kept = &sorted[TRIM..N - TRIM];
        let sum: i32 = kept.iter().map(|&v| i32::from(v)).sum();
        self.output = rounded_mean(sum, kept.len() as i32);
        self.output
    }

    /// Last value returned by [`process`](Self::process) (or the fill value).
    #[inline]
    pub fn output(&self) -> i16 {
        self.output
    }

    /// Current window contents in storage order.
    #[inline]
    pub fn window(&self) -> &[i16; N] {
        &self.buffer
    }
}

/// Integer mean rounded half away from zero. The result always lies between
/// the smallest and largest summed sample, so it fits back into `i16`.
fn rounded_mean(sum: i32, count: i32) -> i16 {
    let half = count / 2;
    let mean = if sum >= 0 {
        (sum + half) / count
    } else {
        (sum - half) / count
    };
    mean as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_windows_that_trim_to_nothing() {
        assert_eq!(
            WindowFilter::<4>::new(0).err(),
            Some(ConfigError::WindowTooSmall { size: 4, min: 5 })
        );
        assert!(WindowFilter::<5>::new(0).is_ok());
    }

    #[test]
    fn constant_signal_passes_through_unchanged() {
        let mut f = WindowFilter::<DEFAULT_WINDOW>::new(-417).unwrap();
        assert_eq!(f.output(), -417);
        for _ in 0..DEFAULT_WINDOW * 3 {
            assert_eq!(f.process(-417), -417);
        }
    }

    #[test]
    fn two_spikes_per_side_are_ignored() {
        let mut f = WindowFilter::<DEFAULT_WINDOW>::new(100).unwrap();
        assert_eq!(f.process(i16::MAX), 100);
        assert_eq!(f.process(i16::MIN), 100);
        assert_eq!(f.process(30_000), 100);
        assert_eq!(f.process(-30_000), 100);
    }

    #[test]
    fn third_spike_on_one_side_leaks_through() {
        let mut f = WindowFilter::<5>::new(0).unwrap();
        f.process(10);
        f.process(10);
        // sorted: 0 0 10 10 10 -> middle value is 10
        assert_eq!(f.process(10), 10);
    }

    #[test]
    fn mean_rounds_half_away_from_zero() {
        assert_eq!(rounded_mean(5, 2), 3);
        assert_eq!(rounded_mean(-5, 2), -3);
        assert_eq!(rounded_mean(4, 3), 1);
        assert_eq!(rounded_mean(-4, 3), -1);
        assert_eq!(rounded_mean(0, 12), 0);
    }

    #[test]
    fn ramp_is_averaged_over_the_trimmed_window() {
        let mut f = WindowFilter::<8>::new(0).unwrap();
        let mut out = 0;
        for v in 1..=8 {
            out = f.process(v);
        }
        // window 1..=8, trimmed to 3..=6, mean 4.5 -> 5
        assert_eq!(out, 5);
        assert_eq!(f.output(), 5);
    }

    #[test]
    fn cursor_wraps_around_the_window() {
        let mut f = WindowFilter::<5>::new(0).unwrap();
        for v in 1..=7 {
            f.process(v);
        }
        assert_eq!(f.window(), &[6, 7, 3, 4, 5]);
    }

    #[test]
    fn reset_refills_the_window() {
        let mut f = WindowFilter::<6>::new(0).unwrap();
        f.process(50);
        f.reset(-9);
        assert_eq!(f.output(), -9);
        assert_eq!(f.window(), &[-9; 6]);
        assert_eq!(f.process(-9), -9);
    }
}
