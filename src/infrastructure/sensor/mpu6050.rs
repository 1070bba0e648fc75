//! MPU6050 gyroscope driver
//!
//! Only the Y and Z gyro axes are read; the X axis is skipped by starting the
//! burst read at `GYRO_YOUT_H`.

use super::RegisterBus;
use crate::domain::imu::GyroSource;
use crate::domain::models::GyroSample;
use crate::error::SensorError;
use std::time::Duration;
use tracing::{error, info, trace};

pub const I2C_ADDRESS: u8 = 0x68;
pub const I2C_FREQ_HZ: u32 = 400_000;

const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_GYRO_XOUT_H: u8 = 0x43;
const REG_GYRO_YOUT_H: u8 = REG_GYRO_XOUT_H + 2;
const REG_PWR_MGMT_1: u8 = 0x6B;

/// PWR_MGMT_1 value that clears the sleep bit
const PWR_WAKE: u8 = 0x00;
/// FS_SEL = 1, +/-500 deg/s
const GYRO_FS_500: u8 = 0x08;
/// LSB per deg/s at +/-500 deg/s
pub const GYRO_SENSITIVITY: f32 = 65.5;

const POWER_UP_DELAY: Duration = Duration::from_millis(100);

pub struct Mpu6050<B: RegisterBus> {
    bus: B,
    initialized: bool,
}

impl<B: RegisterBus> Mpu6050<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            initialized: false,
        }
    }

    /// Wake the sensor and select the +/-500 deg/s range.
    ///
    /// A failure here is fatal for the motion pipeline and is returned as-is.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        if let Err(e) = self.bus.write_register(REG_PWR_MGMT_1, PWR_WAKE) {
            error!("Failed to wake MPU6050: {}", e);
            return Err(e);
        }

        tokio::time::sleep(POWER_UP_DELAY).await;

        if let Err(e) = self.bus.write_register(REG_GYRO_CONFIG, GYRO_FS_500) {
            error!("Failed to configure gyro: {}", e);
            return Err(e);
        }

        self.initialized = true;
        info!("MPU6050 initialized successfully");
        Ok(())
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

/// Decode the 4-byte Y/Z burst into deg/s
fn decode_gyro(bytes: &[u8]) -> Result<GyroSample, SensorError> {
    if bytes.len() < 4 {
        return Err(SensorError::ShortRead {
            expected: 4,
            actual: bytes.len(),
        });
    }

    let raw_y = i16::from_be_bytes([bytes[0], bytes[1]]);
    let raw_z = i16::from_be_bytes([bytes[2], bytes[3]]);

    Ok(GyroSample {
        angular_rate_y: raw_y as f32 / GYRO_SENSITIVITY,
        angular_rate_z: raw_z as f32 / GYRO_SENSITIVITY,
    })
}

impl<B: RegisterBus> GyroSource for Mpu6050<B> {
    fn is_ready(&self) -> bool {
        self.initialized
    }

    fn read_axes(&mut self) -> Result<GyroSample, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotReady);
        }

        let bytes = self.bus.read_registers(REG_GYRO_YOUT_H, 4)?;
        let sample = decode_gyro(&bytes)?;
        trace!(
            "gyro y={:.3} z={:.3}",
            sample.angular_rate_y,
            sample.angular_rate_z
        );
        Ok(sample)
    }
}
