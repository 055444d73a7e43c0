//! Per-wheel velocity loop driving a two-input H-bridge.
//!
//! Terminal A high drives the wheel forward, terminal B high drives it
//! backward. Both high shorts the motor (brake); both low lets it coast.

use crate::error::ConfigError;
use crate::pid::{Pid, PidConfig, PidStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Brake,
    Forward,
    Backward,
    /// Coasting with both terminals off.
    Free,
}

/// Duty for the two bridge inputs, in PWM counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyPair {
    pub a: u16,
    pub b: u16,
}

impl DutyPair {
    pub const OFF: Self = Self { a: 0, b: 0 };

    pub const fn both(duty: u16) -> Self {
        Self { a: duty, b: duty }
    }
}

#[derive(Clone, Debug)]
pub struct WheelController {
    pid: Pid,
    max_duty: u16,
    direction: Direction,
    commanded_speed: f32,
    duty: DutyPair,
}

impl WheelController {
    pub fn new(config: PidConfig) -> Result<Self, ConfigError> {
        let pid = Pid::new(config)?;
        Ok(Self {
            pid,
            // validated to lie within (0, MAX_DUTY]
            max_duty: config.max_output as u16,
            direction: Direction::Brake,
            commanded_speed: 0.0,
            duty: DutyPair::OFF,
        })
    }

    /// Run one tick of the wheel loop and return the duties to apply.
    ///
    /// Braking skips the PID entirely and shorts the motor at full duty.
    /// Otherwise the PID closes the loop on `measured_speed` and the sign of
    /// `commanded_speed` picks the driven terminal; a zero command coasts.
    pub fn drive(&mut self, is_brake: bool, commanded_speed: f32, measured_speed: f32) -> DutyPair {
        if is_brake {
            self.direction = Direction::Brake;
            self.duty = DutyPair::both(self.max_duty);
        } else {
            let out = self.pid.update(commanded_speed, measured_speed);
            // f32 -> u16 casts saturate; the PID output is already clamped.
            let duty = out.abs().min(f32::from(self.max_duty)) as u16;

            if commanded_speed > 0.0 {
                self.direction = Direction::Forward;
                self.duty = DutyPair { a: duty, b: 0 };
            } else if commanded_speed < 0.0 {
                self.direction = Direction::Backward;
                self.duty = DutyPair { a: 0, b: duty };
            } else {
                self.direction = Direction::Free;
                self.duty = DutyPair::OFF;
            }
        }

        self.commanded_speed = commanded_speed;
        self.duty
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn commanded_speed(&self) -> f32 {
        self.commanded_speed
    }

    #[inline]
    pub fn duty(&self) -> DutyPair {
        self.duty
    }

    #[inline]
    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }

    #[inline]
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    #[inline]
    pub fn pid_status(&self) -> PidStatus {
        self.pid.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_DUTY;
    use crate::pid::PidGains;

    fn wheel() -> WheelController {
        WheelController::new(PidConfig::default()).unwrap()
    }

    #[test]
    fn brake_drives_both_terminals_to_max() {
        let mut w = wheel();
        w.drive(false, 120.0, 0.0);
        assert_eq!(w.drive(true, 120.0, 0.0), DutyPair::both(MAX_DUTY));
        assert_eq!(w.direction(), Direction::Brake);
        assert_eq!(w.drive(true, -80.0, 500.0), DutyPair::both(MAX_DUTY));
        assert_eq!(w.drive(true, 0.0, 0.0), DutyPair::both(MAX_DUTY));
    }

    #[test]
    fn brake_skips_the_pid() {
        let mut w = wheel();
        w.drive(false, 10.0, 0.0);
        let integral = w.pid().integral();
        for _ in 0..10 {
            w.drive(true, 10.0, 0.0);
        }
        assert_eq!(w.pid().integral(), integral);
    }

    #[test]
    fn zero_command_coasts() {
        let mut w = wheel();
        w.drive(false, 50.0, 0.0);
        assert_eq!(w.drive(false, 0.0, 40.0), DutyPair::OFF);
        assert_eq!(w.direction(), Direction::Free);
    }

    #[test]
    fn forward_uses_terminal_a() {
        let mut w = wheel();
        // error 10: P = 8000, I = 200
        let d = w.drive(false, 10.0, 0.0);
        assert_eq!(d, DutyPair { a: 8_200, b: 0 });
        assert_eq!(w.direction(), Direction::Forward);
    }

    #[test]
    fn backward_uses_terminal_b_with_magnitude() {
        let mut w = wheel();
        let d = w.drive(false, -10.0, 0.0);
        assert_eq!(d, DutyPair { a: 0, b: 8_200 });
        assert_eq!(w.direction(), Direction::Backward);
    }

    #[test]
    fn duty_never_exceeds_max() {
        let mut w = wheel();
        let d = w.drive(false, 330.0, -330.0);
        assert_eq!(d, DutyPair { a: MAX_DUTY, b: 0 });
        assert!(w.pid_status().output_saturated);
    }

    #[test]
    fn commanded_speed_is_recorded_on_every_branch() {
        let mut w = wheel();
        w.drive(false, 15.0, 0.0);
        assert_eq!(w.commanded_speed(), 15.0);
        w.drive(true, -4.0, 0.0);
        assert_eq!(w.commanded_speed(), -4.0);
        w.drive(false, 0.0, 0.0);
        assert_eq!(w.commanded_speed(), 0.0);
    }

    #[test]
    fn lower_output_limit_caps_brake_duty() {
        let mut w = WheelController::new(PidConfig {
            gains: PidGains { kp: 1.0, ki: 0.0, kd: 0.0 },
            max_output: 1_000.0,
            max_integral: 500.0,
        })
        .unwrap();
        assert_eq!(w.max_duty(), 1_000);
        assert_eq!(w.drive(true, 0.0, 0.0), DutyPair::both(1_000));
    }
}
