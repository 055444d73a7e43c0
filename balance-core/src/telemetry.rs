use crate::pid::PidStatus;
use crate::policy::WheelSpeeds;
use crate::wheel::{Direction, DutyPair};

/// Why the wheels were braked this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BrakeCause {
    /// Brake flag set by the command layer.
    Commanded,
    /// No fresh attitude for longer than the staleness limit.
    StaleAttitude,
    /// An encoder stopped refreshing for longer than the staleness limit.
    StaleEncoder,
    /// Pitch beyond the fall angle.
    Tipped,
}

impl BrakeCause {
    /// Brakes the core applied on its own, as opposed to a command.
    pub fn is_forced(self) -> bool {
        !matches!(self, Self::Commanded)
    }
}

/// Snapshot of one control tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub tick: u32,
    pub pitch: f32,
    pub target_tilt: f32,
    pub speed_left: i16,
    pub speed_right: i16,
    pub command: WheelSpeeds,
    pub duty_left: DutyPair,
    pub duty_right: DutyPair,
    pub direction_left: Direction,
    pub direction_right: Direction,
    pub pid_left: PidStatus,
    pub pid_right: PidStatus,
    pub attitude_stale_ticks: u16,
    pub brake: Option<BrakeCause>,
}

impl TickReport {
    /// Either wheel loop is sitting on a clamp.
    pub fn saturated(&self) -> bool {
        let any = |s: PidStatus| s.integral_saturated || s.output_saturated;
        any(self.pid_left) || any(self.pid_right)
    }
}
