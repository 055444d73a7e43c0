//! Adaptive balance-angle learner.
//!
//! A slow integrator that sits under the fast balance loop: when the vehicle
//! keeps rolling forward at steady state the learned target tilt is eased
//! backwards (and vice versa) until the drift dies out. The learning rate has
//! to stay tiny compared with the control tick rate or the two loops couple
//! and oscillate.

use crate::error::ConfigError;

/// Tilt at which the bare chassis balances, in degrees.
pub const MECHANICAL_BALANCE_BIAS_DEG: f32 = -1.4;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LearnerConfig {
    /// Starting target tilt (degrees).
    pub initial_tilt_deg: f32,
    /// Degrees of target shift per unit of smoothed speed per tick.
    pub learning_rate: f32,
    /// Exponential smoothing coefficient for chassis speed, in (0, 1).
    pub smoothing: f32,
    /// Target tilt stays within `±tilt_limit_deg`.
    pub tilt_limit_deg: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            initial_tilt_deg: MECHANICAL_BALANCE_BIAS_DEG,
            learning_rate: 0.000_01,
            smoothing: 0.98,
            tilt_limit_deg: 5.0,
        }
    }
}

impl LearnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.smoothing > 0.0 && self.smoothing < 1.0) {
            return Err(ConfigError::InvalidSmoothing);
        }
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(ConfigError::InvalidLearningRate);
        }
        if !(self.tilt_limit_deg > 0.0 && self.tilt_limit_deg.is_finite()) {
            return Err(ConfigError::InvalidTiltClamp);
        }
        if !(self.initial_tilt_deg.abs() <= self.tilt_limit_deg) {
            return Err(ConfigError::BiasOutOfRange);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct BalanceLearner {
    config: LearnerConfig,
    target_tilt: f32,
    smoothed_speed: f32,
}

impl BalanceLearner {
    pub fn new(config: LearnerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            target_tilt: config.initial_tilt_deg,
            smoothed_speed: 0.0,
        })
    }

    /// Feed this tick's wheel speeds and return the updated target tilt.
    ///
    /// Non-finite speeds are ignored so the target can never leave the clamp.
    pub fn update(&mut self, speed_left: f32, speed_right: f32) -> f32 {
        let chassis = (speed_left + speed_right) / 2.0;
        if !chassis.is_finite() {
            return self.target_tilt;
        }

        let alpha = self.config.smoothing;
        self.smoothed_speed = alpha * self.smoothed_speed + (1.0 - alpha) * chassis;

        // Rolling forward: lean the target back.
        self.target_tilt -= self.config.learning_rate * self.smoothed_speed;

        let limit = self.config.tilt_limit_deg;
        self.target_tilt = self.target_tilt.clamp(-limit, limit);
        self.target_tilt
    }

    /// Forget everything learned and start again from the mechanical bias.
    pub fn reset(&mut self) {
        self.target_tilt = self.config.initial_tilt_deg;
        self.smoothed_speed = 0.0;
    }

    #[inline]
    pub fn target_tilt(&self) -> f32 {
        self.target_tilt
    }

    #[inline]
    pub fn smoothed_speed(&self) -> f32 {
        self.smoothed_speed
    }

    #[inline]
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn starts_at_mechanical_bias() {
        let l = BalanceLearner::new(LearnerConfig::default()).unwrap();
        assert_relative_eq!(l.target_tilt(), MECHANICAL_BALANCE_BIAS_DEG);
        assert_relative_eq!(l.smoothed_speed(), 0.0);
    }

    #[test]
    fn single_step_matches_update_rule() {
        let mut l = BalanceLearner::new(LearnerConfig::default()).unwrap();
        let t = l.update(100.0, 50.0);
        // chassis 75, smoothed 0.02 * 75 = 1.5, shift 1.5e-5
        assert_relative_eq!(l.smoothed_speed(), 1.5, epsilon = 1e-4);
        assert_relative_eq!(t, -1.4 - 1.5e-5, epsilon = 1e-6);
        assert!(t < MECHANICAL_BALANCE_BIAS_DEG);
    }

    #[test]
    fn constant_forward_drift_walks_target_to_lower_clamp() {
        let cfg = LearnerConfig {
            learning_rate: 0.001,
            ..LearnerConfig::default()
        };
        let mut l = BalanceLearner::new(cfg).unwrap();
        let mut prev = l.target_tilt();
        for _ in 0..20_000 {
            let t = l.update(200.0, 200.0);
            assert!(t <= prev);
            assert!(t >= -5.0);
            prev = t;
        }
        assert_relative_eq!(prev, -5.0);
    }

    #[test]
    fn backward_drift_saturates_at_upper_clamp() {
        let cfg = LearnerConfig {
            learning_rate: 0.01,
            ..LearnerConfig::default()
        };
        let mut l = BalanceLearner::new(cfg).unwrap();
        for _ in 0..5_000 {
            l.update(-300.0, -300.0);
        }
        assert_relative_eq!(l.target_tilt(), 5.0);
    }

    #[test]
    fn non_finite_speed_is_ignored() {
        let mut l = BalanceLearner::new(LearnerConfig::default()).unwrap();
        let before = l.target_tilt();
        assert_relative_eq!(l.update(f32::NAN, 1.0), before);
        assert_relative_eq!(l.update(f32::INFINITY, 0.0), before);
        assert_relative_eq!(l.smoothed_speed(), 0.0);
    }

    #[test]
    fn reset_restores_bias() {
        let mut l = BalanceLearner::new(LearnerConfig::default()).unwrap();
        for _ in 0..100 {
            l.update(30.0, 10.0);
        }
        l.reset();
        assert_relative_eq!(l.target_tilt(), MECHANICAL_BALANCE_BIAS_DEG);
        assert_relative_eq!(l.smoothed_speed(), 0.0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let base = LearnerConfig::default();
        let bad_alpha = LearnerConfig { smoothing: 1.0, ..base };
        let bad_rate = LearnerConfig { learning_rate: 0.0, ..base };
        let bad_clamp = LearnerConfig { tilt_limit_deg: -1.0, ..base };
        let bad_bias = LearnerConfig { initial_tilt_deg: 7.0, ..base };
        assert_eq!(BalanceLearner::new(bad_alpha).err(), Some(ConfigError::InvalidSmoothing));
        assert_eq!(BalanceLearner::new(bad_rate).err(), Some(ConfigError::InvalidLearningRate));
        assert_eq!(BalanceLearner::new(bad_clamp).err(), Some(ConfigError::InvalidTiltClamp));
        assert_eq!(BalanceLearner::new(bad_bias).err(), Some(ConfigError::BiasOutOfRange));
    }
}
