//! Clock tree and pin map.
//!
//! | Function | Peripheral | Pins |
//! | -------- | ---------- | ---- |
//! | H-bridge (L: AIN1/AIN2, R: BIN1/BIN2) | TIM1 CH1..CH4 | PA8, PA9, PA10, PA11 |
//! | Left encoder | TIM2 quadrature | PA15, PB3 |
//! | Right encoder | TIM3 quadrature | PB4, PB5 |
//! | MPU6500 | SPI1 + CS | PA5, PA7, PA6, PB12 |
//! | Command / telemetry link | USART2 | PA3 (RX), PA2 (TX) |
//! | HC-SR04 | GPIO / EXTI1 | PC0 (TRIG), PC1 (ECHO) |
//! | Status LED | GPIO | PC13 |

use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::{Config, Peripherals};

/// TIM1 runs from the 168 MHz APB2 timer clock, so this frequency gives an
/// auto-reload of 60000, one PWM count per core duty count.
pub const MOTOR_PWM_HZ: u32 = 2_800;

pub struct Board {
    pub p: Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz SYSCLK
            divq: None,
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4; // 42 MHz, 84 MHz timers
        config.rcc.apb2_pre = APBPrescaler::DIV2; // 84 MHz, 168 MHz timers

        Self {
            p: embassy_stm32::init(config),
        }
    }
}
