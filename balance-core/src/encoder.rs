//! Incremental encoder → signed wheel speed.
//!
//! The peripheral side is abstracted as a [`CountSource`] that returns the
//! number of counts since the previous read and clears its counter. A 16-bit
//! up/down counter that moved backwards by a few counts reads as a value just
//! below 65536; [`EncoderTracker::sample`] reinterprets anything at or above
//! the midpoint as negative.

use crate::staleness::StaleCounter;

/// Counter range midpoint. Raw values at or above it are backward rotation.
pub const HALF_RANGE: u16 = 0x8000;

/// Read-and-reset access to one wheel's hardware counter.
pub trait CountSource {
    /// Counts accumulated since the last call, or `None` if the counter has not
    /// been refreshed this tick.
    fn read_and_reset(&mut self) -> Option<u16>;
}

impl<F: FnMut() -> Option<u16>> CountSource for F {
    fn read_and_reset(&mut self) -> Option<u16> {
        self()
    }
}

pub struct EncoderTracker<S> {
    source: S,
    count: u16,
    last_count: u16,
    speed: i16,
    stale: StaleCounter,
}

impl<S: CountSource> EncoderTracker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            count: 0,
            last_count: 0,
            speed: 0,
            stale: StaleCounter::fresh(),
        }
    }

    /// Read the counter once and return the signed speed in counts per tick.
    ///
    /// A missing reading keeps the previous speed and bumps the stale count.
    pub fn sample(&mut self) -> i16 {
        match self.source.read_and_reset() {
            Some(raw) => {
                self.last_count = self.count;
                self.count = raw;
                self.speed = to_signed(raw);
                self.stale.observe(true);
            }
            None => self.stale.observe(false),
        }
        self.speed
    }

    #[inline]
    pub fn speed(&self) -> i16 {
        self.speed
    }

    #[inline]
    pub fn count(&self) -> u16 {
        self.count
    }

    #[inline]
    pub fn last_count(&self) -> u16 {
        self.last_count
    }

    /// Consecutive ticks without a fresh reading.
    #[inline]
    pub fn stale_ticks(&self) -> u16 {
        self.stale.ticks()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

/// Two's-complement view of a 16-bit counter delta.
#[inline]
pub const fn to_signed(raw: u16) -> i16 {
    if raw >= HALF_RANGE {
        (raw as i32 - 0x1_0000) as i16
    } else {
        raw as i16
    }
}

/// Adapts a free-running counter (one that is never cleared) to read-and-reset
/// semantics by differencing successive readings.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeRunningCounter {
    last: u16,
}

impl FreeRunningCounter {
    pub const fn new(initial: u16) -> Self {
        Self { last: initial }
    }

    /// Counts since the previous call, modulo 2^16.
    pub fn delta(&mut self, now: u16) -> u16 {
        let delta = now.wrapping_sub(self.last);
        self.last = now;
        delta
    }
}
