use balance_core::{Attitude, ControlConfig, DriveCoordinator, TickReport};
use embassy_executor::task;
use embassy_stm32::peripherals::{TIM1, TIM2, TIM3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker};

use crate::drivers::encoder::QeiCounter;
use crate::drivers::motor::HBridge;
use crate::state::{AttitudeFeed, VEHICLE_FLAGS};

/// Control task, one drive-core tick per period (200 Hz by default).
///
/// Owns the coordinator and every actuator; publishes each tick's report for
/// telemetry without waiting on it.
#[task]
pub async fn control_task(
    mut bridge: HBridge<'static, TIM1>,
    left: QeiCounter<'static, TIM2>,
    right: QeiCounter<'static, TIM3>,
    config: &'static ControlConfig,
    attitude_rx: Receiver<'static, CriticalSectionRawMutex, Attitude, 1>,
    report_tx: Sender<'static, CriticalSectionRawMutex, TickReport, 1>,
) {
    let mut core = match DriveCoordinator::new(
        config,
        &VEHICLE_FLAGS,
        AttitudeFeed::new(attitude_rx),
        left,
        right,
        config.policy,
    ) {
        Ok(core) => core,
        Err(e) => defmt::panic!("drive core rejected config: {}", e),
    };

    let mut ticker = Ticker::every(Duration::from_millis(config.tick_period_ms));

    loop {
        ticker.next().await;

        let report = core.tick(&mut bridge);

        // Telemetry only wants the latest tick
        let _ = report_tx.try_send(report);
    }
}
