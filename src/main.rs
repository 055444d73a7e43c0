#![no_std]
#![no_main]

mod board;
mod drivers;
mod state;
mod tasks;

use balance_core::{Attitude, ControlConfig, TickReport};
use embassy_executor::Spawner;
use embassy_stm32::dma::NoDma;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pin, Pull, Speed};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::{hz, Hertz as TimeHertz};
use embassy_stm32::timer::qei::{Qei, QeiPin};
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::CountingMode;
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{Board, MOTOR_PWM_HZ};
use crate::drivers::encoder::QeiCounter;
use crate::drivers::motor::HBridge;
use crate::drivers::mpu6500::Mpu6500;
use crate::state::{SonarReading, VEHICLE_FLAGS};

// ── Inter-task channels ───────────────────────────────────────────────────────
//  Cap=1: consumers always want the LATEST value; older values are dropped.
static ATT_CHAN:    Channel<CriticalSectionRawMutex, Attitude,     1> = Channel::new();
static REPORT_CHAN: Channel<CriticalSectionRawMutex, TickReport,   1> = Channel::new();
static SONAR_CHAN:  Channel<CriticalSectionRawMutex, SonarReading, 1> = Channel::new();

static CONFIG: StaticCell<ControlConfig> = StaticCell::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    USART2 => embassy_stm32::usart::InterruptHandler<peripherals::USART2>;
});

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. Control configuration, fatal if inconsistent
    let config: &'static ControlConfig = CONFIG.init(ControlConfig::default());
    if let Err(e) = config.validate() {
        defmt::panic!("invalid control config: {}", e);
    }
    defmt::info!("control config: {}", config);

    // 3. H-bridge on TIM1 CH1..CH4 (starts braked)
    let pwm = SimplePwm::new(
        p.TIM1,
        Some(PwmPin::new_ch1(p.PA8, OutputType::PushPull)),
        Some(PwmPin::new_ch2(p.PA9, OutputType::PushPull)),
        Some(PwmPin::new_ch3(p.PA10, OutputType::PushPull)),
        Some(PwmPin::new_ch4(p.PA11, OutputType::PushPull)),
        hz(MOTOR_PWM_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let bridge = HBridge::new(pwm);

    // 4. Wheel encoders: TIM2 (left), TIM3 (right, mirror-mounted)
    let left = QeiCounter::new(
        Qei::new(p.TIM2, QeiPin::new_ch1(p.PA15), QeiPin::new_ch2(p.PB3)),
        false,
    );
    let right = QeiCounter::new(
        Qei::new(p.TIM3, QeiPin::new_ch1(p.PB4), QeiPin::new_ch2(p.PB5)),
        true,
    );

    // 5. SPI1 @ 1 MHz: MPU6500 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(1_000_000);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs_imu = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let imu = Mpu6500::new(spi, cs_imu);

    // 6. Command / telemetry link USART2 @ 115200 (TX=PA2, RX=PA3)
    //    Split into Rx (→ command_task) and Tx (→ telemetry_task)
    let mut link_config = UsartConfig::default();
    link_config.baudrate = 115_200;
    let link = Uart::new(
        p.USART2, p.PA3, p.PA2,
        Irqs,
        p.DMA1_CH6, p.DMA1_CH5,
        link_config,
    ).unwrap();
    let (link_tx, link_rx) = link.split();

    // 7. HC-SR04 (TRIG=PC0, ECHO=PC1 on EXTI1)
    let trig = Output::new(p.PC0.degrade(), Level::Low, Speed::Low);
    let echo = ExtiInput::new(Input::new(p.PC1, Pull::Down), p.EXTI1);

    // 8. Status LED (PC13, active low)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 9. Spawn all tasks
    spawner.spawn(tasks::imu_task::imu_task(
        imu,
        ATT_CHAN.sender(),
    )).unwrap();

    spawner.spawn(tasks::control_task::control_task(
        bridge,
        left,
        right,
        config,
        ATT_CHAN.receiver(),
        REPORT_CHAN.sender(),
    )).unwrap();

    spawner.spawn(tasks::sonar_task::sonar_task(
        trig,
        echo,
        config.aux_period_ms,
        SONAR_CHAN.sender(),
    )).unwrap();

    spawner.spawn(tasks::command_task::command_task(link_rx)).unwrap();

    spawner.spawn(tasks::telemetry_task::telemetry_task(
        link_tx,
        REPORT_CHAN.receiver(),
        SONAR_CHAN.receiver(),
    )).unwrap();

    // 10. Main task: LED heartbeat, 1 Hz with a remote connected, 4 Hz without
    loop {
        led.toggle();
        let half_period = if VEHICLE_FLAGS.connected() { 500 } else { 125 };
        Timer::after(Duration::from_millis(half_period)).await;
    }
}
