use balance_core::{Command, MotionIntent};
use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_stm32::peripherals::{DMA1_CH5, USART2};
use embassy_stm32::usart::UartRx;
use embassy_time::{Duration, Timer};

use crate::state::VEHICLE_FLAGS;

/// Silence after which the remote is considered gone.
const LINK_TIMEOUT: Duration = Duration::from_secs(2);

/// Command task: every received byte is one command code.
///
/// Bytes arrive in idle-line framed bursts. Losing the link clears the
/// connected flag and stops any motion in progress.
#[task]
pub async fn command_task(mut rx: UartRx<'static, USART2, DMA1_CH5>) {
    let mut buf = [0u8; 16];

    loop {
        match select(rx.read_until_idle(&mut buf), Timer::after(LINK_TIMEOUT)).await {
            Either::First(Ok(n)) => {
                if !VEHICLE_FLAGS.connected() {
                    defmt::info!("command link up");
                    VEHICLE_FLAGS.set_connected(true);
                }
                for &byte in &buf[..n] {
                    dispatch(byte);
                }
            }
            Either::First(Err(_)) => defmt::warn!("command link rx error"),
            Either::Second(()) => {
                if VEHICLE_FLAGS.connected() {
                    defmt::warn!("command link lost");
                    VEHICLE_FLAGS.set_connected(false);
                    VEHICLE_FLAGS.set_motion(MotionIntent::Stop);
                }
            }
        }
    }
}

fn dispatch(byte: u8) {
    match Command::try_from(byte) {
        Ok(cmd) => {
            if VEHICLE_FLAGS.apply(cmd) {
                defmt::debug!("{}", cmd);
            } else {
                defmt::warn!("{} refused, path blocked", cmd);
            }
        }
        Err(e) => defmt::warn!("{}", e),
    }
}
