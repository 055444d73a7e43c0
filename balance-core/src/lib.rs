//! # balance-core
//!
//! Drive-control core of a two-wheel self-balancing vehicle. Turns a body-tilt
//! estimate and wheel encoder feedback into H-bridge duty cycles while slowly
//! re-learning the mechanical balance point.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`filter`] | Trimmed-mean window filter for noisy integer signals |
//! | [`encoder`] | Encoder counts to signed wheel speed |
//! | [`calibration`] | Adaptive balance-angle learner |
//! | [`pid`] / [`wheel`] | Per-wheel velocity loop and H-bridge direction logic |
//! | [`policy`] | Tilt error to per-wheel speed command mapping |
//! | [`flags`] / [`command`] | Shared vehicle flags and the command codes that write them |
//! | [`coordinator`] | Per-tick orchestration of everything above |
//!
//! The crate is `no_std` and never allocates. Enable the `defmt` feature on
//! target to get `defmt::Format` on every public type and log output from the
//! coordinator.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod attitude;
pub mod calibration;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod flags;
pub mod pid;
pub mod policy;
pub mod staleness;
pub mod telemetry;
pub mod wheel;

pub use attitude::{Attitude, AttitudeProvider};
pub use calibration::{BalanceLearner, LearnerConfig};
pub use command::{Command, UnknownCommand};
pub use config::{ControlConfig, MAX_DUTY};
pub use coordinator::{DriveCoordinator, PwmStage, VehicleState, WheelPath};
pub use encoder::{CountSource, EncoderTracker, FreeRunningCounter};
pub use error::ConfigError;
pub use staleness::StaleCounter;
pub use filter::{WindowFilter, DEFAULT_WINDOW};
pub use flags::{FlagSnapshot, MotionIntent, VehicleFlags};
pub use pid::{Pid, PidConfig, PidGains, PidStatus};
pub use policy::{PolicyInput, SpeedPolicy, TiltSpeedPolicy, WheelSpeeds};
pub use telemetry::{BrakeCause, TickReport};
pub use wheel::{Direction, DutyPair, WheelController};
