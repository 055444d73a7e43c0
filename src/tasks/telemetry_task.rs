use core::fmt::Write;

use balance_core::{BrakeCause, Direction, TickReport};
use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH6, USART2};
use embassy_stm32::usart::UartTx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Ticker};

use crate::state::{SonarReading, VEHICLE_FLAGS};

fn brake_tag(brake: Option<BrakeCause>) -> &'static str {
    match brake {
        None => "-",
        Some(BrakeCause::Commanded) => "CMD",
        Some(BrakeCause::StaleAttitude) => "IMU",
        Some(BrakeCause::StaleEncoder) => "ENC",
        Some(BrakeCause::Tipped) => "FALL",
    }
}

fn dir_tag(dir: Direction) -> char {
    match dir {
        Direction::Brake => 'B',
        Direction::Forward => 'F',
        Direction::Backward => 'R',
        Direction::Free => '0',
    }
}

/// Telemetry task: 10 Hz text lines on the command link.
///
/// `[BAL]` every tick of this task, `[CAR]` once a second.
#[task]
pub async fn telemetry_task(
    mut tx: UartTx<'static, USART2, DMA1_CH6>,
    report_rx: Receiver<'static, CriticalSectionRawMutex, TickReport, 1>,
    sonar_rx: Receiver<'static, CriticalSectionRawMutex, SonarReading, 1>,
) {
    let mut tick: u32 = 0;
    let mut report: Option<TickReport> = None;
    let mut sonar = SonarReading::default();

    let mut ticker = Ticker::every(Duration::from_hz(10));

    loop {
        ticker.next().await;
        tick = tick.wrapping_add(1);

        if let Ok(r) = report_rx.try_receive() { report = Some(r); }
        if let Ok(s) = sonar_rx.try_receive()  { sonar = s; }

        // ── Balance loop ─────────────────────────────────────────────────────
        if let Some(r) = report {
            let mut m = heapless::String::<160>::new();
            let _ = write!(m,
                "[BAL] n={} p={:.2} t={:.3} v={}/{} c={:.0}/{:.0} d={}{}/{}{} brk={} sat={}\r\n",
                r.tick, r.pitch, r.target_tilt,
                r.speed_left, r.speed_right,
                r.command.left, r.command.right,
                dir_tag(r.direction_left), r.duty_left.a.max(r.duty_left.b),
                dir_tag(r.direction_right), r.duty_right.a.max(r.duty_right.b),
                brake_tag(r.brake),
                r.saturated() as u8,
            );
            let _ = tx.write(m.as_bytes()).await;
        }

        // ── Vehicle flags (1 Hz) ─────────────────────────────────────────────
        if tick % 10 == 0 {
            let f = VEHICLE_FLAGS.snapshot();
            let mut m = heapless::String::<96>::new();
            let _ = write!(m,
                "[CAR] mode={:?} v={} avoid={} obs={} link={} sonar=",
                f.motion, f.linear_speed,
                f.obstacle_avoidance as u8, sonar.obstacle as u8, f.connected as u8,
            );
            let _ = match sonar.distance_cm {
                Some(cm) => write!(m, "{}cm\r\n", cm),
                None => write!(m, "--\r\n"),
            };
            let _ = tx.write(m.as_bytes()).await;
        }
    }
}
