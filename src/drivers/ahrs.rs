//! Mahony complementary filter, gyro + accelerometer only.
//!
//! Stands in for an on-chip motion processor: it fuses raw MPU6500 samples
//! into a quaternion and exposes the Euler angles in degrees. It is only one
//! `AttitudeProvider` behind the drive core, which does no fusion of its own;
//! a DMP-backed provider can replace it without touching the core.

use micromath::F32Ext;

#[derive(Clone, Copy, Debug)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Euler angles in degrees.
#[derive(Clone, Copy, Debug, Default)]
pub struct Euler {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

pub struct Mahony {
    kp: f32,
    ki: f32,
    integral: [f32; 3],
    q: Quaternion,
}

impl Mahony {
    pub const fn new(kp: f32, ki: f32) -> Self {
        Self {
            kp,
            ki,
            integral: [0.0; 3],
            q: Quaternion {
                w: 1.0,
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
        }
    }

    /// Seed the attitude from a single accelerometer reading so the filter
    /// does not have to converge from level at power-up.
    pub fn align(&mut self, accel: [f32; 3]) {
        let [ax, ay, az] = accel;
        let roll = ay.atan2(az);
        let pitch = (-ax).atan2((ay * ay + az * az).sqrt());

        let (sr, cr) = ((roll * 0.5).sin(), (roll * 0.5).cos());
        let (sp, cp) = ((pitch * 0.5).sin(), (pitch * 0.5).cos());
        self.q = Quaternion {
            w: cr * cp,
            x: sr * cp,
            y: cr * sp,
            z: -sr * sp,
        };
        self.integral = [0.0; 3];
    }

    /// `gyro` in rad/s, `accel` in any unit (it is normalised).
    pub fn update(&mut self, dt: f32, gyro: [f32; 3], accel: [f32; 3]) {
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;
        let [mut gx, mut gy, mut gz] = gyro;
        let [ax, ay, az] = accel;

        // Free fall or a dead sensor gives no gravity reference; gyro only.
        let norm = ax * ax + ay * ay + az * az;
        if norm > 0.0 {
            let recip = norm.sqrt().recip();
            let (ax, ay, az) = (ax * recip, ay * recip, az * recip);

            // Half the estimated gravity direction
            let vx = q1 * q3 - q0 * q2;
            let vy = q0 * q1 + q2 * q3;
            let vz = q0 * q0 - 0.5 + q3 * q3;

            let ex = ay * vz - az * vy;
            let ey = az * vx - ax * vz;
            let ez = ax * vy - ay * vx;

            if self.ki > 0.0 {
                self.integral[0] += self.ki * ex * dt;
                self.integral[1] += self.ki * ey * dt;
                self.integral[2] += self.ki * ez * dt;
            } else {
                self.integral = [0.0; 3];
            }

            gx += self.kp * ex + self.integral[0];
            gy += self.kp * ey + self.integral[1];
            gz += self.kp * ez + self.integral[2];
        }

        let h = 0.5 * dt;
        let (gx, gy, gz) = (gx * h, gy * h, gz * h);

        let w = q0 - q1 * gx - q2 * gy - q3 * gz;
        let x = q1 + q0 * gx + q2 * gz - q3 * gy;
        let y = q2 + q0 * gy - q1 * gz + q3 * gx;
        let z = q3 + q0 * gz + q1 * gy - q2 * gx;

        let recip = (w * w + x * x + y * y + z * z).sqrt().recip();
        self.q = Quaternion {
            w: w * recip,
            x: x * recip,
            y: y * recip,
            z: z * recip,
        };
    }

    pub fn euler(&self) -> Euler {
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;

        let roll = (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2));

        let sinp = 2.0 * (q0 * q2 - q3 * q1);
        let pitch = if sinp.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let yaw = (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));

        Euler {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
        }
    }
}
