//! Sensor Module
//!
//! Gyroscope drivers on top of a register-level bus.
//!
//! - [`mpu6050`] - InvenSense MPU6050 over I2C

pub mod mpu6050;

pub use mpu6050::Mpu6050;

use crate::error::SensorError;

/// Register-level access to a sensor on a shared bus (I2C/SPI)
pub trait RegisterBus {
    /// Read `count` consecutive registers starting at `addr`
    fn read_registers(&mut self, addr: u8, count: usize) -> Result<Vec<u8>, SensorError>;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), SensorError>;
}
