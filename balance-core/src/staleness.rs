/// Counts consecutive ticks without a fresh sensor reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StaleCounter {
    ticks: u16,
}

impl StaleCounter {
    /// Counter for a source that is fresh right away.
    pub const fn fresh() -> Self {
        Self { ticks: 0 }
    }

    /// Counter for a source that has never delivered; already past any limit.
    pub const fn expired() -> Self {
        Self { ticks: u16::MAX }
    }

    pub fn observe(&mut self, fresh: bool) {
        self.ticks = if fresh { 0 } else { self.ticks.saturating_add(1) };
    }

    #[inline]
    pub fn ticks(&self) -> u16 {
        self.ticks
    }

    #[inline]
    pub fn exceeds(&self, limit: u16) -> bool {
        self.ticks > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_misses_and_clears_on_fresh() {
        let mut c = StaleCounter::fresh();
        c.observe(false);
        c.observe(false);
        assert_eq!(c.ticks(), 2);
        assert!(c.exceeds(1));
        assert!(!c.exceeds(2));
        c.observe(true);
        assert_eq!(c.ticks(), 0);
    }

    #[test]
    fn expired_saturates() {
        let mut c = StaleCounter::expired();
        c.observe(false);
        assert_eq!(c.ticks(), u16::MAX);
        assert!(c.exceeds(u16::MAX - 1));
    }
}
