//! Quadrature timer as a wheel count source.

use balance_core::{CountSource, FreeRunningCounter};
use embassy_stm32::timer::qei::Qei;
use embassy_stm32::timer::CaptureCompare16bitInstance;

/// Wheel encoder on a timer in encoder mode.
///
/// The HAL only exposes the counter, so the per-tick delta is taken by
/// differencing instead of clearing the hardware count.
pub struct QeiCounter<'d, T: CaptureCompare16bitInstance> {
    qei: Qei<'d, T>,
    counter: FreeRunningCounter,
    /// Mirror-mounted wheel: forward rotation counts down.
    inverted: bool,
}

impl<'d, T: CaptureCompare16bitInstance> QeiCounter<'d, T> {
    pub fn new(qei: Qei<'d, T>, inverted: bool) -> Self {
        let counter = FreeRunningCounter::new(qei.count());
        Self {
            qei,
            counter,
            inverted,
        }
    }
}

impl<'d, T: CaptureCompare16bitInstance> CountSource for QeiCounter<'d, T> {
    fn read_and_reset(&mut self) -> Option<u16> {
        let delta = self.counter.delta(self.qei.count());
        Some(if self.inverted {
            delta.wrapping_neg()
        } else {
            delta
        })
    }
}
