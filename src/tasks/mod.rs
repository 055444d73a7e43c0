pub mod command_task;
pub mod control_task;
pub mod imu_task;
pub mod sonar_task;
pub mod telemetry_task;
