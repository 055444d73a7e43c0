//! Position-form PID with integral and output clamping.
//!
//! Runs once per control tick with no explicit `dt`; the gains are tuned for
//! the fixed tick period. The derivative acts on the change in error between
//! ticks.

use crate::config::MAX_DUTY;
use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub gains: PidGains,
    /// Output clamp, symmetric, in PWM counts.
    pub max_output: f32,
    /// Integral clamp, symmetric, in PWM counts.
    pub max_integral: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            gains: PidGains {
                kp: 800.0,
                ki: 20.0,
                kd: 0.0,
            },
            max_output: MAX_DUTY as f32,
            max_integral: 30_000.0,
        }
    }
}

impl PidConfig {
    /// `kp` must be strictly positive; `ki` and `kd` may be zero but not
    /// negative. Limits must be positive, the integral limit may not exceed the
    /// output limit, and the output limit must fit the PWM range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let PidGains { kp, ki, kd } = self.gains;
        if !(kp > 0.0 && kp.is_finite()) {
            return Err(ConfigError::InvalidGain("kp"));
        }
        if !(ki >= 0.0 && ki.is_finite()) {
            return Err(ConfigError::InvalidGain("ki"));
        }
        if !(kd >= 0.0 && kd.is_finite()) {
            return Err(ConfigError::InvalidGain("kd"));
        }
        if !(self.max_output > 0.0 && self.max_output <= MAX_DUTY as f32) {
            return Err(ConfigError::InvalidLimit("max_output"));
        }
        if !(self.max_integral > 0.0 && self.max_integral <= self.max_output) {
            return Err(ConfigError::InvalidLimit("max_integral"));
        }
        Ok(())
    }
}

/// Which clamps were active after the last update. Sitting on a clamp is
/// normal; it is reported so the loop can be tuned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidStatus {
    pub integral_saturated: bool,
    pub output_saturated: bool,
}

#[derive(Clone, Debug)]
pub struct Pid {
    config: PidConfig,
    integral: f32,
    last_error: f32,
    output: f32,
    status: PidStatus,
}

impl Pid {
    pub fn new(config: PidConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            integral: 0.0,
            last_error: 0.0,
            output: 0.0,
            status: PidStatus::default(),
        })
    }

    /// One controller step. Returns the clamped output.
    ///
    /// A non-finite error leaves all state untouched and repeats the previous
    /// output.
    pub fn update(&mut self, setpoint: f32, measurement: f32) -> f32 {
        let error = setpoint - measurement;
        if !error.is_finite() {
            return self.output;
        }

        let PidGains { kp, ki, kd } = self.config.gains;
        let max_i = self.config.max_integral;
        let max_out = self.config.max_output;

        let p = kp * error;

        let unclamped_i = self.integral + ki * error;
        self.integral = unclamped_i.clamp(-max_i, max_i);

        let d = kd * (error - self.last_error);
        self.last_error = error;

        let unclamped = p + self.integral + d;
        self.output = unclamped.clamp(-max_out, max_out);

        self.status = PidStatus {
            integral_saturated: unclamped_i.abs() >= max_i,
            output_saturated: unclamped.abs() >= max_out,
        };
        self.output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.output = 0.0;
        self.status = PidStatus::default();
    }

    #[inline]
    pub fn integral(&self) -> f32 {
        self.integral
    }

    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }

    #[inline]
    pub fn status(&self) -> PidStatus {
        self.status
    }

    #[inline]
    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}
