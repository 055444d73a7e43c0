//! Named tuning constants for the drive core.

use crate::calibration::LearnerConfig;
use crate::error::ConfigError;
use crate::pid::PidConfig;
use crate::policy::TiltSpeedPolicy;

/// PWM counts at 100 % duty (timer auto-reload value).
pub const MAX_DUTY: u16 = 60_000;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlConfig {
    /// Control tick period.
    pub tick_period_ms: u64,
    /// Period of the auxiliary (ranging) task.
    pub aux_period_ms: u64,
    /// Wheel velocity loop, shared by both wheels.
    pub wheel_pid: PidConfig,
    pub learner: LearnerConfig,
    pub policy: TiltSpeedPolicy,
    /// Run encoder speeds through the window filter before use. The window
    /// length is the coordinator's `W` parameter, not a runtime setting.
    pub filter_speeds: bool,
    /// Consecutive stale ticks tolerated before the core forces a brake.
    pub max_stale_ticks: u16,
    /// Pitch magnitude (degrees) treated as a fall.
    pub fall_angle_deg: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 5,
            aux_period_ms: 100,
            wheel_pid: PidConfig::default(),
            learner: LearnerConfig::default(),
            policy: TiltSpeedPolicy::default(),
            filter_speeds: false,
            max_stale_ticks: 20,
            fall_angle_deg: 45.0,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::InvalidPeriod("tick_period_ms"));
        }
        if self.aux_period_ms == 0 {
            return Err(ConfigError::InvalidPeriod("aux_period_ms"));
        }
        if self.max_stale_ticks == 0 {
            return Err(ConfigError::InvalidPeriod("max_stale_ticks"));
        }
        if !(self.fall_angle_deg > 0.0 && self.fall_angle_deg <= 90.0) {
            return Err(ConfigError::InvalidLimit("fall_angle_deg"));
        }
        if !(self.policy.max_wheel_speed > 0.0 && self.policy.max_wheel_speed.is_finite()) {
            return Err(ConfigError::InvalidLimit("max_wheel_speed"));
        }
        self.wheel_pid.validate()?;
        self.learner.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ControlConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_periods_are_rejected() {
        let cfg = ControlConfig {
            tick_period_ms: 0,
            ..ControlConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidPeriod("tick_period_ms")));

        let cfg = ControlConfig {
            max_stale_ticks: 0,
            ..ControlConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidPeriod("max_stale_ticks")));
    }

    #[test]
    fn nested_errors_surface() {
        let mut cfg = ControlConfig::default();
        cfg.wheel_pid.gains.kp = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidGain("kp")));

        let mut cfg = ControlConfig::default();
        cfg.learner.smoothing = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSmoothing));
    }
}
