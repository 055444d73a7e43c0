//! Mapping from tilt error to per-wheel speed commands.
//!
//! This is the outer balance loop. The coordinator only relies on the
//! [`SpeedPolicy`] contract; [`TiltSpeedPolicy`] is a plain proportional
//! starting point that layers the remote motion intent on top.

use crate::flags::MotionIntent;

/// Everything a policy may look at for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PolicyInput {
    /// Measured pitch (degrees).
    pub pitch: f32,
    /// Learned balance target (degrees).
    pub target_tilt: f32,
    /// Pitch rate (degrees per second).
    pub pitch_rate: f32,
    pub speed_left: f32,
    pub speed_right: f32,
    pub intent: MotionIntent,
    pub linear_speed: f32,
}

impl PolicyInput {
    /// Positive when leaning further forward than the balance target.
    #[inline]
    pub fn tilt_error(&self) -> f32 {
        self.pitch - self.target_tilt
    }
}

/// Signed speed commands in wheel counts per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WheelSpeeds {
    pub left: f32,
    pub right: f32,
}

pub trait SpeedPolicy {
    fn wheel_speeds(&mut self, input: &PolicyInput) -> WheelSpeeds;
}

impl<F: FnMut(&PolicyInput) -> WheelSpeeds> SpeedPolicy for F {
    fn wheel_speeds(&mut self, input: &PolicyInput) -> WheelSpeeds {
        self(input)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TiltSpeedPolicy {
    /// Speed per degree of tilt error.
    pub tilt_gain: f32,
    /// Speed per degree-per-second of pitch rate.
    pub rate_gain: f32,
    /// Differential added for left/right turns.
    pub turn_speed: f32,
    /// Commands are clamped to `±max_wheel_speed`.
    pub max_wheel_speed: f32,
}

impl Default for TiltSpeedPolicy {
    fn default() -> Self {
        Self {
            tilt_gain: 12.0,
            rate_gain: 0.1,
            turn_speed: 10.0,
            max_wheel_speed: 330.0,
        }
    }
}

impl SpeedPolicy for TiltSpeedPolicy {
    fn wheel_speeds(&mut self, input: &PolicyInput) -> WheelSpeeds {
        let base = self.tilt_gain * input.tilt_error() + self.rate_gain * input.pitch_rate;
        let v = input.linear_speed;
        let t = self.turn_speed;

        let (left, right) = match input.intent {
            MotionIntent::Stop => (base, base),
            MotionIntent::Forward => (base + v, base + v),
            MotionIntent::Backward => (base - v, base - v),
            MotionIntent::Left => (base - t, base + t),
            MotionIntent::Right => (base + t, base - t),
            MotionIntent::Spin => (base + v, base - v),
        };

        let max = self.max_wheel_speed;
        WheelSpeeds {
            left: left.clamp(-max, max),
            right: right.clamp(-max, max),
        }
    }
}
