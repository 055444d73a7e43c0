use core::fmt;

/// Rejected configuration. Raised once at construction; never at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A PID gain is negative, non-finite, or `kp` is not strictly positive.
    InvalidGain(&'static str),
    /// An output or integral limit is non-positive or exceeds the PWM range.
    InvalidLimit(&'static str),
    /// The window cannot survive the fixed trim with samples left over.
    WindowTooSmall { size: usize, min: usize },
    /// Speed smoothing coefficient outside the open interval (0, 1).
    InvalidSmoothing,
    /// Learning rate is not a small positive number.
    InvalidLearningRate,
    /// Tilt clamp is not strictly positive.
    InvalidTiltClamp,
    /// Mechanical bias lies outside the tilt clamp.
    BiasOutOfRange,
    /// A task period or a staleness limit is zero.
    InvalidPeriod(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGain(name) => write!(f, "invalid PID gain `{name}`"),
            Self::InvalidLimit(name) => write!(f, "invalid limit `{name}`"),
            Self::WindowTooSmall { size, min } => {
                write!(f, "filter window of {size} samples is below the minimum of {min}")
            }
            Self::InvalidSmoothing => f.write_str("speed smoothing coefficient must lie in (0, 1)"),
            Self::InvalidLearningRate => f.write_str("learning rate must be positive and below 1"),
            Self::InvalidTiltClamp => f.write_str("tilt clamp must be positive"),
            Self::BiasOutOfRange => f.write_str("mechanical bias lies outside the tilt clamp"),
            Self::InvalidPeriod(name) => write!(f, "`{name}` must be non-zero"),
        }
    }
}
