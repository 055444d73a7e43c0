pub mod ahrs;
pub mod encoder;
pub mod motor;
pub mod mpu6500;
