use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error as SpiError, Instance, Spi};
use embassy_time::{Duration, Timer};

// ── Registers ────────────────────────────────────────────────────────────────
const SMPLRT_DIV: u8 = 0x19;
const CONFIG: u8 = 0x1A;
const GYRO_CONFIG: u8 = 0x1B;
const ACCEL_CONFIG: u8 = 0x1C;
const ACCEL_CONFIG2: u8 = 0x1D;
const ACCEL_XOUT_H: u8 = 0x3B;
const USER_CTRL: u8 = 0x6A;
const PWR_MGMT_1: u8 = 0x6B;
const WHO_AM_I: u8 = 0x75;

const MPU6500_ID: u8 = 0x70;

/// ±2 g full scale.
pub const ACCEL_LSB_PER_G: f32 = 16_384.0;
/// ±500 °/s full scale.
pub const GYRO_LSB_PER_DPS: f32 = 65.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Mpu6500Error {
    Bus,
    WrongId(u8),
}

impl From<SpiError> for Mpu6500Error {
    fn from(_: SpiError) -> Self {
        Self::Bus
    }
}

/// One raw accel + gyro sample in sensor axes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

pub struct Mpu6500<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance> Mpu6500<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Mpu6500Error> {
        let buf = [reg & 0x7F, value];
        self.cs.set_low();
        let res = self.spi.blocking_write(&buf);
        self.cs.set_high();
        Ok(res?)
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, Mpu6500Error> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();

        res?;
        Ok(rx[1])
    }

    /// Reset, check identity and configure for 100 Hz output with a 41 Hz DLPF.
    pub async fn init(&mut self) -> Result<(), Mpu6500Error> {
        self.write_reg(PWR_MGMT_1, 0x80).await?;
        Timer::after(Duration::from_millis(100)).await;

        // PLL clock, SPI only
        self.write_reg(PWR_MGMT_1, 0x01).await?;
        self.write_reg(USER_CTRL, 0x10).await?;
        Timer::after(Duration::from_millis(10)).await;

        let id = self.read_reg(WHO_AM_I).await?;
        if id != MPU6500_ID {
            return Err(Mpu6500Error::WrongId(id));
        }

        self.write_reg(CONFIG, 0x03).await?;
        self.write_reg(SMPLRT_DIV, 9).await?; // 1 kHz / (1 + 9)
        self.write_reg(GYRO_CONFIG, 0x08).await?;
        self.write_reg(ACCEL_CONFIG, 0x00).await?;
        self.write_reg(ACCEL_CONFIG2, 0x03).await?;
        Timer::after(Duration::from_millis(50)).await;

        Ok(())
    }

    /// Burst-read accel, temperature and gyro; temperature is discarded.
    pub async fn read_all(&mut self) -> Result<RawSample, Mpu6500Error> {
        let mut tx = [0u8; 15];
        tx[0] = ACCEL_XOUT_H | 0x80;
        let mut rx = [0u8; 15];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        Ok(RawSample {
            accel: [word(1), word(3), word(5)],
            gyro: [word(9), word(11), word(13)],
        })
    }
}
