//! Flags shared between the command context and the control task.
//!
//! Each flag is one atomic word. The command side is the only writer, the
//! control task only reads, and no invariant spans two flags, so relaxed
//! ordering is enough and the control tick never takes a lock.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Linear speed used when motion starts, in wheel counts per tick.
pub const START_LINEAR_SPEED: u8 = 8;
/// Upper bound for the commanded linear speed.
pub const MAX_LINEAR_SPEED: u8 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MotionIntent {
    Stop = 0,
    Forward = 1,
    Backward = 2,
    Left = 3,
    Right = 4,
    /// Turn on the spot.
    Spin = 5,
}

impl MotionIntent {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Forward,
            2 => Self::Backward,
            3 => Self::Left,
            4 => Self::Right,
            5 => Self::Spin,
            _ => Self::Stop,
        }
    }

    pub fn is_turning(self) -> bool {
        matches!(self, Self::Left | Self::Right | Self::Spin)
    }
}

/// Point-in-time copy of every flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlagSnapshot {
    pub brake: bool,
    pub motion: MotionIntent,
    pub linear_speed: u8,
    pub obstacle_avoidance: bool,
    pub obstacle_detected: bool,
    pub connected: bool,
}

pub struct VehicleFlags {
    brake: AtomicBool,
    motion: AtomicU8,
    linear_speed: AtomicU8,
    obstacle_avoidance: AtomicBool,
    obstacle_detected: AtomicBool,
    connected: AtomicBool,
}

impl Default for VehicleFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleFlags {
    /// Power-on state: not braked, stopped, start speed, nothing detected.
    pub const fn new() -> Self {
        Self {
            brake: AtomicBool::new(false),
            motion: AtomicU8::new(MotionIntent::Stop as u8),
            linear_speed: AtomicU8::new(START_LINEAR_SPEED),
            obstacle_avoidance: AtomicBool::new(false),
            obstacle_detected: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }
    }

    pub fn brake(&self) -> bool {
        self.brake.load(Ordering::Relaxed)
    }

    pub fn set_brake(&self, on: bool) {
        self.brake.store(on, Ordering::Relaxed);
    }

    pub fn toggle_brake(&self) -> bool {
        !self.brake.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn motion(&self) -> MotionIntent {
        MotionIntent::from_bits(self.motion.load(Ordering::Relaxed))
    }

    pub fn set_motion(&self, intent: MotionIntent) {
        self.motion.store(intent as u8, Ordering::Relaxed);
    }

    pub fn linear_speed(&self) -> u8 {
        self.linear_speed.load(Ordering::Relaxed)
    }

    /// Set the linear speed, clamped to `MAX_LINEAR_SPEED`.
    pub fn set_linear_speed(&self, speed: u8) {
        self.linear_speed
            .store(speed.min(MAX_LINEAR_SPEED), Ordering::Relaxed);
    }

    /// Add `delta` to the linear speed, saturating at `0..=MAX_LINEAR_SPEED`.
    pub fn adjust_linear_speed(&self, delta: i8) -> u8 {
        let current = self.linear_speed();
        let next = (i16::from(current) + i16::from(delta)).clamp(0, i16::from(MAX_LINEAR_SPEED)) as u8;
        self.set_linear_speed(next);
        next
    }

    pub fn obstacle_avoidance(&self) -> bool {
        self.obstacle_avoidance.load(Ordering::Relaxed)
    }

    pub fn set_obstacle_avoidance(&self, on: bool) {
        self.obstacle_avoidance.store(on, Ordering::Relaxed);
    }

    pub fn toggle_obstacle_avoidance(&self) -> bool {
        !self.obstacle_avoidance.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn obstacle_detected(&self) -> bool {
        self.obstacle_detected.load(Ordering::Relaxed)
    }

    /// Written by whatever ranging sensor is fitted.
    pub fn set_obstacle_detected(&self, detected: bool) {
        self.obstacle_detected.store(detected, Ordering::Relaxed);
    }

    /// True when avoidance is on and something is in the way.
    pub fn path_blocked(&self) -> bool {
        self.obstacle_avoidance() && self.obstacle_detected()
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FlagSnapshot {
        FlagSnapshot {
            brake: self.brake(),
            motion: self.motion(),
            linear_speed: self.linear_speed(),
            obstacle_avoidance: self.obstacle_avoidance(),
            obstacle_detected: self.obstacle_detected(),
            connected: self.connected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_state() {
        let f = VehicleFlags::new();
        let s = f.snapshot();
        assert!(!s.brake);
        assert_eq!(s.motion, MotionIntent::Stop);
        assert_eq!(s.linear_speed, START_LINEAR_SPEED);
        assert!(!s.obstacle_avoidance && !s.obstacle_detected && !s.connected);
    }

    #[test]
    fn toggles_return_new_value() {
        let f = VehicleFlags::new();
        assert!(f.toggle_brake());
        assert!(f.brake());
        assert!(!f.toggle_brake());
        assert!(f.toggle_obstacle_avoidance());
    }

    #[test]
    fn linear_speed_saturates() {
        let f = VehicleFlags::new();
        f.set_linear_speed(200);
        assert_eq!(f.linear_speed(), MAX_LINEAR_SPEED);
        assert_eq!(f.adjust_linear_speed(5), MAX_LINEAR_SPEED);
        f.set_linear_speed(1);
        assert_eq!(f.adjust_linear_speed(-3), 0);
    }

    #[test]
    fn motion_round_trips_through_the_atomic() {
        let f = VehicleFlags::new();
        for m in [
            MotionIntent::Forward,
            MotionIntent::Backward,
            MotionIntent::Left,
            MotionIntent::Right,
            MotionIntent::Spin,
            MotionIntent::Stop,
        ] {
            f.set_motion(m);
            assert_eq!(f.motion(), m);
        }
    }

    #[test]
    fn path_blocked_needs_both_flags() {
        let f = VehicleFlags::new();
        f.set_obstacle_detected(true);
        assert!(!f.path_blocked());
        f.set_obstacle_avoidance(true);
        assert!(f.path_blocked());
    }
}
