//! Shared state for inter-task communication.
//!
//! Flags are lock-free atomics; everything else moves through capacity-1
//! Embassy channels so readers always see the latest value.

use balance_core::{Attitude, AttitudeProvider, VehicleFlags};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;

/// Written by the command and sonar tasks, read by the control tick.
pub static VEHICLE_FLAGS: VehicleFlags = VehicleFlags::new();

// ── Data types ────────────────────────────────────────────────────────────────

/// Latest ultrasonic range.
#[derive(Clone, Copy, Default)]
pub struct SonarReading {
    /// `None` when no echo came back within range.
    pub distance_cm: Option<u16>,
    pub obstacle: bool,
}

// ── Attitude feed ────────────────────────────────────────────────────────────

/// Attitude provider backed by the IMU task's channel. Yields `None` on ticks
/// where the IMU has not published anything new.
pub struct AttitudeFeed {
    rx: Receiver<'static, CriticalSectionRawMutex, Attitude, 1>,
}

impl AttitudeFeed {
    pub fn new(rx: Receiver<'static, CriticalSectionRawMutex, Attitude, 1>) -> Self {
        Self { rx }
    }
}

impl AttitudeProvider for AttitudeFeed {
    fn attitude(&mut self) -> Option<Attitude> {
        self.rx.try_receive().ok()
    }
}
