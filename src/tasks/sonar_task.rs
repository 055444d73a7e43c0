use embassy_executor::task;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::peripherals::PC1;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{with_timeout, Duration, Instant, Ticker, Timer};

use crate::state::{SonarReading, VEHICLE_FLAGS};

/// Anything closer than this blocks the path.
const OBSTACLE_CM: u16 = 20;
/// Echo round trip per centimetre of range.
const US_PER_CM: u64 = 58;
/// Longest echo worth waiting for (~4 m).
const ECHO_TIMEOUT: Duration = Duration::from_millis(25);

/// HC-SR04 task: one ping per auxiliary period.
///
/// Only touches the obstacle flag; the control tick reads it through the
/// command layer, never directly.
#[task]
pub async fn sonar_task(
    mut trig: Output<'static, AnyPin>,
    mut echo: ExtiInput<'static, PC1>,
    period_ms: u64,
    sonar_tx: Sender<'static, CriticalSectionRawMutex, SonarReading, 1>,
) {
    let mut ticker = Ticker::every(Duration::from_millis(period_ms));

    loop {
        ticker.next().await;

        trig.set_high();
        Timer::after(Duration::from_micros(10)).await;
        trig.set_low();

        let distance_cm = match with_timeout(ECHO_TIMEOUT, echo.wait_for_rising_edge()).await {
            Ok(()) => {
                let start = Instant::now();
                match with_timeout(ECHO_TIMEOUT, echo.wait_for_falling_edge()).await {
                    Ok(()) => {
                        let us = (Instant::now() - start).as_micros();
                        Some((us / US_PER_CM).min(u64::from(u16::MAX)) as u16)
                    }
                    Err(_) => None,
                }
            }
            Err(_) => None,
        };

        let obstacle = matches!(distance_cm, Some(cm) if cm < OBSTACLE_CM);
        if obstacle != VEHICLE_FLAGS.obstacle_detected() {
            defmt::debug!("obstacle {}: {} cm", obstacle, distance_cm);
        }
        VEHICLE_FLAGS.set_obstacle_detected(obstacle);

        let _ = sonar_tx.try_send(SonarReading {
            distance_cm,
            obstacle,
        });
    }
}
