use balance_core::Attitude;
use embassy_executor::task;
use embassy_stm32::peripherals::SPI1;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Instant, Ticker, Timer};

use crate::drivers::ahrs::Mahony;
use crate::drivers::mpu6500::{Mpu6500, RawSample, ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS};

/// Estimator output rate, matching the sensor's configured sample rate.
const IMU_HZ: u64 = 100;
/// Static gyro calibration: 100 samples x 10 ms.
const CALIB_N: usize = 100;
const MAHONY_KP: f32 = 2.0;
const MAHONY_KI: f32 = 0.005;

/// The board carries the sensor rotated 180° about Z.
const AXIS_SIGN: [f32; 3] = [-1.0, -1.0, 1.0];

fn to_body(raw: [i16; 3], bias: [f32; 3], lsb: f32) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for j in 0..3 {
        out[j] = AXIS_SIGN[j] * (f32::from(raw[j]) - bias[j]) / lsb;
    }
    out
}

/// IMU task: reads the MPU6500, fuses it and publishes one [`Attitude`] per
/// sample. If the sensor never comes up nothing is published and the drive
/// core stays braked.
#[task]
pub async fn imu_task(
    mut imu: Mpu6500<'static, SPI1>,
    attitude_tx: Sender<'static, CriticalSectionRawMutex, Attitude, 1>,
) {
    Timer::after(Duration::from_millis(100)).await;
    if let Err(e) = imu.init().await {
        defmt::error!("MPU6500 init failed: {}", e);
        return;
    }

    // ── Gyro bias (vehicle must be still) ─────────────────────────────────────
    let mut gyro_bias = [0.0f32; 3];
    let mut first = RawSample::default();
    let mut got = 0usize;
    for _ in 0..CALIB_N {
        if let Ok(sample) = imu.read_all().await {
            if got == 0 {
                first = sample;
            }
            for j in 0..3 {
                gyro_bias[j] += f32::from(sample.gyro[j]);
            }
            got += 1;
        }
        Timer::after(Duration::from_millis(10)).await;
    }
    if got > 0 {
        for b in gyro_bias.iter_mut() {
            *b /= got as f32;
        }
    }
    defmt::info!("gyro bias {} from {} samples", gyro_bias, got);

    let mut ahrs = Mahony::new(MAHONY_KP, MAHONY_KI);
    ahrs.align(to_body(first.accel, [0.0; 3], ACCEL_LSB_PER_G));

    let mut ticker = Ticker::every(Duration::from_hz(IMU_HZ));
    let mut last = Instant::now();

    loop {
        ticker.next().await;

        let now = Instant::now();
        let dt = (now - last).as_micros() as f32 / 1_000_000.0;
        let dt = dt.clamp(0.002, 0.05);
        last = now;

        let sample = match imu.read_all().await {
            Ok(s) => s,
            // the core counts the missed update as staleness
            Err(_) => continue,
        };

        let accel = to_body(sample.accel, [0.0; 3], ACCEL_LSB_PER_G);
        let gyro = to_body(sample.gyro, gyro_bias, GYRO_LSB_PER_DPS);
        let gyro_rad = [gyro[0].to_radians(), gyro[1].to_radians(), gyro[2].to_radians()];

        ahrs.update(dt, gyro_rad, accel);
        let e = ahrs.euler();

        let _ = attitude_tx.try_send(Attitude {
            pitch: e.pitch,
            roll: e.roll,
            yaw: e.yaw,
            ax: accel[0],
            ay: accel[1],
            az: accel[2],
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
        });
    }
}
