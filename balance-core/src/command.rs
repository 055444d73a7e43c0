//! Remote command codes and how they change the vehicle flags.
//!
//! Codes arrive as single opaque bytes from the command link; the transport
//! and framing are someone else's job.

use core::fmt;

use crate::flags::{MotionIntent, VehicleFlags, START_LINEAR_SPEED};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Left = 0xC1,
    Right = 0xC2,
    Forward = 0xC3,
    Backward = 0xC4,
    Stop = 0xC5,
    StopSlowly = 0xC6,
    SpeedUp = 0xC7,
    SpeedDown = 0xC8,
    /// Toggle obstacle avoidance.
    RoadPlanning = 0xC9,
    TurnAround = 0xCA,
    TurnClear = 0xCB,
    /// Toggle the drive brake.
    PowerSwitch = 0xCC,
    /// Return to the start speed.
    SpeedConstant = 0xCD,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownCommand(pub u8);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command byte {:#04x}", self.0)
    }
}

impl TryFrom<u8> for Command {
    type Error = UnknownCommand;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0xC1 => Self::Left,
            0xC2 => Self::Right,
            0xC3 => Self::Forward,
            0xC4 => Self::Backward,
            0xC5 => Self::Stop,
            0xC6 => Self::StopSlowly,
            0xC7 => Self::SpeedUp,
            0xC8 => Self::SpeedDown,
            0xC9 => Self::RoadPlanning,
            0xCA => Self::TurnAround,
            0xCB => Self::TurnClear,
            0xCC => Self::PowerSwitch,
            0xCD => Self::SpeedConstant,
            other => return Err(UnknownCommand(other)),
        })
    }
}

impl Command {
    /// Motion commands that would carry the vehicle toward a detected
    /// obstacle. Reversing away is always allowed.
    fn blocked_by_obstacle(self) -> bool {
        matches!(
            self,
            Self::Forward | Self::Left | Self::Right | Self::TurnAround
        )
    }
}

impl VehicleFlags {
    /// Apply one command. Returns `false` if it was refused because the path
    /// is blocked.
    pub fn apply(&self, cmd: Command) -> bool {
        if cmd.blocked_by_obstacle() && self.path_blocked() {
            return false;
        }

        match cmd {
            Command::Forward => self.start_motion(MotionIntent::Forward),
            Command::Backward => self.start_motion(MotionIntent::Backward),
            Command::Left => self.start_motion(MotionIntent::Left),
            Command::Right => self.start_motion(MotionIntent::Right),
            Command::TurnAround => self.start_motion(MotionIntent::Spin),
            Command::Stop => {
                self.set_motion(MotionIntent::Stop);
                self.set_brake(true);
            }
            Command::StopSlowly => self.set_motion(MotionIntent::Stop),
            Command::TurnClear => {
                if self.motion().is_turning() {
                    self.set_motion(MotionIntent::Stop);
                }
            }
            Command::SpeedUp => {
                self.adjust_linear_speed(1);
            }
            Command::SpeedDown => {
                self.adjust_linear_speed(-1);
            }
            Command::SpeedConstant => self.set_linear_speed(START_LINEAR_SPEED),
            Command::RoadPlanning => {
                self.toggle_obstacle_avoidance();
            }
            Command::PowerSwitch => {
                self.toggle_brake();
            }
        }
        true
    }

    fn start_motion(&self, intent: MotionIntent) {
        self.set_brake(false);
        self.set_motion(intent);
    }
}
