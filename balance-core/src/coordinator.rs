//! Per-tick orchestration of the drive core.
//!
//! Every call to [`DriveCoordinator::tick`] runs, in this order:
//!
//! 1. poll the attitude provider (keep the cached estimate if nothing new),
//! 2. sample both encoders and filter the speeds,
//! 3. update the balance learner with those same speeds,
//! 4. ask the speed policy for per-wheel commands,
//! 5. drive both wheel loops and hand the duties to the PWM stage.
//!
//! The core brakes on its own when the attitude or an encoder has been stale
//! for more than `max_stale_ticks`, or when the pitch passes the fall angle.

use crate::attitude::{Attitude, AttitudeProvider};
use crate::calibration::BalanceLearner;
use crate::config::ControlConfig;
use crate::encoder::{CountSource, EncoderTracker};
use crate::error::ConfigError;
use crate::filter::{WindowFilter, DEFAULT_WINDOW};
use crate::flags::VehicleFlags;
use crate::policy::{PolicyInput, SpeedPolicy};
use crate::staleness::StaleCounter;
use crate::telemetry::{BrakeCause, TickReport};
use crate::wheel::{DutyPair, WheelController};

/// The H-bridge PWM outputs for both wheels.
pub trait PwmStage {
    fn apply(&mut self, left: DutyPair, right: DutyPair);
}

/// Encoder, optional `W`-sample speed filter and velocity loop for one wheel.
pub struct WheelPath<S, const W: usize = DEFAULT_WINDOW> {
    encoder: EncoderTracker<S>,
    filter: Option<WindowFilter<W>>,
    controller: WheelController,
    speed: i16,
}

impl<S: CountSource, const W: usize> WheelPath<S, W> {
    /// Fails on bad PID limits or a window too short to trim, whether or not
    /// filtering is enabled.
    pub fn new(source: S, config: &ControlConfig) -> Result<Self, ConfigError> {
        let filter = WindowFilter::new(0)?;
        Ok(Self {
            encoder: EncoderTracker::new(source),
            filter: config.filter_speeds.then_some(filter),
            controller: WheelController::new(config.wheel_pid)?,
            speed: 0,
        })
    }

    /// Sample the encoder and return the (filtered) speed used this tick.
    pub fn measure(&mut self) -> i16 {
        let raw = self.encoder.sample();
        self.speed = match self.filter.as_mut() {
            Some(filter) => filter.process(raw),
            None => raw,
        };
        self.speed
    }

    /// Close the velocity loop on the speed from the last [`measure`](Self::measure).
    pub fn drive(&mut self, is_brake: bool, commanded_speed: f32) -> DutyPair {
        self.controller
            .drive(is_brake, commanded_speed, f32::from(self.speed))
    }

    #[inline]
    pub fn speed(&self) -> i16 {
        self.speed
    }

    #[inline]
    pub fn encoder(&self) -> &EncoderTracker<S> {
        &self.encoder
    }

    #[inline]
    pub fn controller(&self) -> &WheelController {
        &self.controller
    }
}

/// Everything the control task owns, plus the shared flags.
pub struct VehicleState<'a, L, R, const W: usize = DEFAULT_WINDOW> {
    pub left: WheelPath<L, W>,
    pub right: WheelPath<R, W>,
    pub learner: BalanceLearner,
    pub flags: &'a VehicleFlags,
}

/// The whole drive core. `W` is the speed filter window length, fixed at
/// compile time.
pub struct DriveCoordinator<'a, A, L, R, P, const W: usize = DEFAULT_WINDOW> {
    provider: A,
    policy: P,
    state: VehicleState<'a, L, R, W>,
    attitude: Attitude,
    attitude_stale: StaleCounter,
    max_stale_ticks: u16,
    fall_angle_deg: f32,
    brake: Option<BrakeCause>,
    tick: u32,
}

impl<'a, A, L, R, P> DriveCoordinator<'a, A, L, R, P>
where
    A: AttitudeProvider,
    L: CountSource,
    R: CountSource,
    P: SpeedPolicy,
{
    /// Validate `config` and build the whole core with the default speed
    /// filter window. Fails only on bad configuration.
    ///
    /// The attitude starts out stale, so the wheels stay braked until the
    /// provider delivers its first estimate.
    pub fn new(
        config: &ControlConfig,
        flags: &'a VehicleFlags,
        provider: A,
        left: L,
        right: R,
        policy: P,
    ) -> Result<Self, ConfigError> {
        Self::with_window(config, flags, provider, left, right, policy)
    }
}

impl<'a, A, L, R, P, const W: usize> DriveCoordinator<'a, A, L, R, P, W>
where
    A: AttitudeProvider,
    L: CountSource,
    R: CountSource,
    P: SpeedPolicy,
{
    /// Same as [`DriveCoordinator::new`] with a `W`-sample speed filter.
    pub fn with_window(
        config: &ControlConfig,
        flags: &'a VehicleFlags,
        provider: A,
        left: L,
        right: R,
        policy: P,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = VehicleState {
            left: WheelPath::new(left, config)?,
            right: WheelPath::new(right, config)?,
            learner: BalanceLearner::new(config.learner)?,
            flags,
        };

        info!(
            "drive core ready: tick {} ms, bias {} deg",
            config.tick_period_ms,
            config.learner.initial_tilt_deg
        );

        Ok(Self {
            provider,
            policy,
            state,
            attitude: Attitude::default(),
            attitude_stale: StaleCounter::expired(),
            max_stale_ticks: config.max_stale_ticks,
            fall_angle_deg: config.fall_angle_deg,
            brake: None,
            tick: 0,
        })
    }

    /// Run one control tick and push the resulting duties to `out`.
    pub fn tick<O: PwmStage>(&mut self, out: &mut O) -> TickReport {
        self.tick = self.tick.wrapping_add(1);

        let fresh = match self.provider.attitude() {
            Some(attitude) => {
                self.attitude = attitude;
                true
            }
            None => false,
        };
        self.attitude_stale.observe(fresh);

        let speed_left = self.state.left.measure();
        let speed_right = self.state.right.measure();

        let target_tilt = self
            .state
            .learner
            .update(f32::from(speed_left), f32::from(speed_right));

        let flags = self.state.flags.snapshot();
        let brake = self.brake_cause(flags.brake);
        self.note_brake_change(brake);

        let command = self.policy.wheel_speeds(&PolicyInput {
            pitch: self.attitude.pitch,
            target_tilt,
            pitch_rate: self.attitude.gyro_y,
            speed_left: f32::from(speed_left),
            speed_right: f32::from(speed_right),
            intent: flags.motion,
            linear_speed: f32::from(flags.linear_speed),
        });

        let braking = brake.is_some();
        let duty_left = self.state.left.drive(braking, command.left);
        let duty_right = self.state.right.drive(braking, command.right);
        out.apply(duty_left, duty_right);

        let left = self.state.left.controller();
        let right = self.state.right.controller();
        TickReport {
            tick: self.tick,
            pitch: self.attitude.pitch,
            target_tilt,
            speed_left,
            speed_right,
            command,
            duty_left,
            duty_right,
            direction_left: left.direction(),
            direction_right: right.direction(),
            pid_left: left.pid_status(),
            pid_right: right.pid_status(),
            attitude_stale_ticks: self.attitude_stale.ticks(),
            brake,
        }
    }

    fn brake_cause(&self, commanded: bool) -> Option<BrakeCause> {
        let limit = self.max_stale_ticks;
        let encoder_stale = self.state.left.encoder().stale_ticks() > limit
            || self.state.right.encoder().stale_ticks() > limit;

        if self.attitude_stale.exceeds(limit) {
            Some(BrakeCause::StaleAttitude)
        } else if encoder_stale {
            Some(BrakeCause::StaleEncoder)
        } else if !(self.attitude.pitch.abs() <= self.fall_angle_deg) {
            // also catches a NaN pitch
            Some(BrakeCause::Tipped)
        } else if commanded {
            Some(BrakeCause::Commanded)
        } else {
            None
        }
    }

    fn note_brake_change(&mut self, next: Option<BrakeCause>) {
        if next == self.brake {
            return;
        }
        match (self.brake, next) {
            (_, Some(cause)) if cause.is_forced() => warn!("forced brake: {}", cause),
            (Some(prev), _) if prev.is_forced() => info!("forced brake cleared: {}", prev),
            (_, Some(_)) => debug!("brake engaged"),
            (_, None) => debug!("brake released"),
        }
        self.brake = next;
    }

    /// Latest attitude estimate (possibly stale).
    #[inline]
    pub fn attitude(&self) -> &Attitude {
        &self.attitude
    }

    #[inline]
    pub fn state(&self) -> &VehicleState<'a, L, R, W> {
        &self.state
    }

    #[inline]
    pub fn learner_mut(&mut self) -> &mut BalanceLearner {
        &mut self.state.learner
    }

    #[inline]
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    #[inline]
    pub fn ticks(&self) -> u32 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_DUTY;
    use crate::flags::MotionIntent;
    use crate::policy::WheelSpeeds;
    use crate::wheel::Direction;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        last: Option<(DutyPair, DutyPair)>,
        calls: usize,
    }

    impl PwmStage for Recorder {
        fn apply(&mut self, left: DutyPair, right: DutyPair) {
            self.last = Some((left, right));
            self.calls += 1;
        }
    }

    fn level() -> Option<Attitude> {
        Some(Attitude {
            pitch: -1.4,
            az: 1.0,
            ..Attitude::default()
        })
    }

    fn still() -> Option<u16> {
        Some(0)
    }

    fn hold(_: &PolicyInput) -> WheelSpeeds {
        WheelSpeeds::default()
    }

    #[test]
    fn brakes_until_first_attitude() {
        let flags = VehicleFlags::new();
        let mut core = DriveCoordinator::new(
            &ControlConfig::default(),
            &flags,
            || None::<Attitude>,
            still,
            still,
            hold,
        )
        .unwrap();
        let mut pwm = Recorder::default();

        let report = core.tick(&mut pwm);
        assert_eq!(report.brake, Some(BrakeCause::StaleAttitude));
        assert_eq!(report.duty_left, DutyPair::both(MAX_DUTY));
        assert_eq!(pwm.last, Some((DutyPair::both(MAX_DUTY), DutyPair::both(MAX_DUTY))));
    }

    #[test]
    fn level_and_idle_coasts() {
        let flags = VehicleFlags::new();
        let mut core =
            DriveCoordinator::new(&ControlConfig::default(), &flags, level, still, still, hold)
                .unwrap();
        let mut pwm = Recorder::default();

        let report = core.tick(&mut pwm);
        assert_eq!(report.brake, None);
        assert_eq!(report.direction_left, Direction::Free);
        assert_eq!(report.direction_right, Direction::Free);
        assert_eq!(pwm.last, Some((DutyPair::OFF, DutyPair::OFF)));
        assert_eq!(pwm.calls, 1);
    }

    #[test]
    fn brake_flag_is_honoured() {
        let flags = VehicleFlags::new();
        let push = |_: &PolicyInput| WheelSpeeds { left: 40.0, right: 40.0 };
        let mut core =
            DriveCoordinator::new(&ControlConfig::default(), &flags, level, still, still, push)
                .unwrap();
        let mut pwm = Recorder::default();

        flags.set_brake(true);
        let report = core.tick(&mut pwm);
        assert_eq!(report.brake, Some(BrakeCause::Commanded));
        assert_eq!(report.direction_left, Direction::Brake);

        flags.set_brake(false);
        let report = core.tick(&mut pwm);
        assert_eq!(report.brake, None);
        assert_eq!(report.direction_left, Direction::Forward);
    }

    #[test]
    fn stale_attitude_escalates_to_brake() {
        let flags = VehicleFlags::new();
        let calls = Rc::new(Cell::new(0u32));
        let provider = {
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    level()
                } else {
                    None
                }
            }
        };
        let cfg = ControlConfig {
            max_stale_ticks: 3,
            ..ControlConfig::default()
        };
        let mut core = DriveCoordinator::new(&cfg, &flags, provider, still, still, hold).unwrap();
        let mut pwm = Recorder::default();

        assert_eq!(core.tick(&mut pwm).brake, None);
        for stale in 1..=3 {
            let r = core.tick(&mut pwm);
            assert_eq!(r.attitude_stale_ticks, stale);
            assert_eq!(r.brake, None);
            assert_eq!(r.pitch, -1.4);
        }
        let r = core.tick(&mut pwm);
        assert_eq!(r.brake, Some(BrakeCause::StaleAttitude));
        assert_eq!(r.duty_right, DutyPair::both(MAX_DUTY));
    }

    #[test]
    fn stale_encoder_escalates_to_brake() {
        let flags = VehicleFlags::new();
        let cfg = ControlConfig {
            max_stale_ticks: 2,
            ..ControlConfig::default()
        };
        let mut core =
            DriveCoordinator::new(&cfg, &flags, level, still, || None::<u16>, hold).unwrap();
        let mut pwm = Recorder::default();

        assert_eq!(core.tick(&mut pwm).brake, None);
        assert_eq!(core.tick(&mut pwm).brake, None);
        assert_eq!(core.tick(&mut pwm).brake, Some(BrakeCause::StaleEncoder));
    }

    #[test]
    fn tipping_over_brakes() {
        let flags = VehicleFlags::new();
        let fallen = || {
            Some(Attitude {
                pitch: 60.0,
                ..Attitude::default()
            })
        };
        let mut core =
            DriveCoordinator::new(&ControlConfig::default(), &flags, fallen, still, still, hold)
                .unwrap();
        let mut pwm = Recorder::default();
        assert_eq!(core.tick(&mut pwm).brake, Some(BrakeCause::Tipped));
    }

    #[test]
    fn learner_and_policy_see_this_ticks_speeds() {
        let flags = VehicleFlags::new();
        flags.set_motion(MotionIntent::Forward);
        let seen = Rc::new(Cell::new((0.0f32, 0.0f32, MotionIntent::Stop)));
        let policy = {
            let seen = seen.clone();
            move |input: &PolicyInput| {
                seen.set((input.speed_left, input.speed_right, input.intent));
                WheelSpeeds::default()
            }
        };
        let mut core = DriveCoordinator::new(
            &ControlConfig::default(),
            &flags,
            level,
            || Some(100u16),
            || Some(65_436u16),
            policy,
        )
        .unwrap();
        let mut pwm = Recorder::default();

        let r = core.tick(&mut pwm);
        assert_eq!((r.speed_left, r.speed_right), (100, -100));
        assert_eq!(seen.get(), (100.0, -100.0, MotionIntent::Forward));
        assert_eq!(core.state().learner.smoothed_speed(), 0.0);
    }

    #[test]
    fn filtered_speeds_reject_a_single_spike() {
        let flags = VehicleFlags::new();
        let n = Rc::new(Cell::new(0u32));
        let spiky = {
            let n = n.clone();
            move || {
                n.set(n.get() + 1);
                Some(if n.get() == 3 { 5_000u16 } else { 0 })
            }
        };
        let cfg = ControlConfig {
            filter_speeds: true,
            ..ControlConfig::default()
        };
        let mut core = DriveCoordinator::new(&cfg, &flags, level, spiky, still, hold).unwrap();
        let mut pwm = Recorder::default();
        for _ in 0..6 {
            assert_eq!(core.tick(&mut pwm).speed_left, 0);
        }
        assert_eq!(core.state().left.encoder().speed(), 0);
    }

    #[test]
    fn steady_state_holds_integral_and_duty() {
        let flags = VehicleFlags::new();
        let n = Rc::new(Cell::new(0u32));
        // wheel lags for five ticks, then tracks the command exactly
        let wheel = {
            let n = n.clone();
            move || {
                n.set(n.get() + 1);
                Some(if n.get() <= 5 { 0u16 } else { 20 })
            }
        };
        let cruise = |_: &PolicyInput| WheelSpeeds { left: 20.0, right: 20.0 };
        let mut core =
            DriveCoordinator::new(&ControlConfig::default(), &flags, level, wheel, still, cruise)
                .unwrap();
        let mut pwm = Recorder::default();

        for _ in 0..5 {
            core.tick(&mut pwm);
        }
        let integral = core.state().left.controller().pid().integral();
        assert_eq!(integral, 2_000.0);

        for _ in 0..50 {
            let r = core.tick(&mut pwm);
            assert_eq!(r.duty_left, DutyPair { a: 2_000, b: 0 });
            assert_eq!(core.state().left.controller().pid().integral(), integral);
        }
    }

    #[test]
    fn bad_config_is_rejected_up_front() {
        let flags = VehicleFlags::new();
        let mut cfg = ControlConfig::default();
        cfg.wheel_pid.gains.ki = -1.0;
        let built = DriveCoordinator::new(&cfg, &flags, level, still, still, hold);
        assert_eq!(built.err(), Some(ConfigError::InvalidGain("ki")));
    }

    #[test]
    fn short_filter_window_tracks_the_trimmed_mean() {
        let flags = VehicleFlags::new();
        let n = Rc::new(Cell::new(0i16));
        // 10, 20, 30, 40, 50, ... counts per tick
        let ramp = {
            let n = n.clone();
            move || {
                n.set(n.get() + 1);
                Some((n.get() * 10) as u16)
            }
        };
        let cfg = ControlConfig {
            filter_speeds: true,
            ..ControlConfig::default()
        };
        let mut core: DriveCoordinator<'_, _, _, _, _, 5> =
            DriveCoordinator::with_window(&cfg, &flags, level, ramp, still, hold).unwrap();
        let mut pwm = Recorder::default();

        let mut speed = 0;
        for _ in 0..5 {
            speed = core.tick(&mut pwm).speed_left;
        }
        // window 10..=50, trimmed to the middle sample
        assert_eq!(speed, 30);
        assert_eq!(core.state().left.encoder().speed(), 50);
    }

    #[test]
    fn untrimmable_window_is_rejected_even_unfiltered() {
        let flags = VehicleFlags::new();
        let cfg = ControlConfig::default();
        let built: Result<DriveCoordinator<'_, _, _, _, _, 4>, _> =
            DriveCoordinator::with_window(&cfg, &flags, level, still, still, hold);
        assert_eq!(built.err(), Some(ConfigError::WindowTooSmall { size: 4, min: 5 }));
    }
}
