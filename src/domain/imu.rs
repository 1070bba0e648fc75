//! Gyroscope bias calibration
//!
//! The device must be held still while a batch of samples is averaged into
//! a rest-state offset.

use crate::domain::models::{CalibrationBias, GyroSample};
use crate::error::SensorError;
use std::time::Duration;
use tracing::{info, warn};

/// Recommended number of samples per calibration batch
pub const DEFAULT_CALIBRATION_SAMPLES: u32 = 150;

/// Delay between two calibration reads
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5);

/// Source of two-axis angular rate samples (deg/s)
pub trait GyroSource {
    /// True once the sensor finished power-up and configuration
    fn is_ready(&self) -> bool;

    /// Blocking read of one sample
    fn read_axes(&mut self) -> Result<GyroSample, SensorError>;
}

/// Averages a fixed batch of rest samples into a [`CalibrationBias`]
#[derive(Debug, Clone)]
pub struct BiasCalibrator {
    sample_count: u32,
    settle_delay: Duration,
}

impl Default for BiasCalibrator {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_SAMPLES, DEFAULT_SETTLE_DELAY)
    }
}

impl BiasCalibrator {
    pub fn new(sample_count: u32, settle_delay: Duration) -> Self {
        Self {
            sample_count: sample_count.max(1),
            settle_delay,
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Run one calibration batch.
    ///
    /// Failed reads are skipped, but the sums are still divided by the
    /// requested sample count, so flaky reads shrink the bias towards zero.
    pub async fn calibrate<S: GyroSource>(
        &self,
        source: &mut S,
    ) -> Result<CalibrationBias, SensorError> {
        if !source.is_ready() {
            return Err(SensorError::NotReady);
        }

        info!(
            "Calibrating gyroscope with {} samples - keep device still",
            self.sample_count
        );

        let mut sum_y = 0.0f32;
        let mut sum_z = 0.0f32;
        let mut successful = 0u32;

        for _ in 0..self.sample_count {
            match source.read_axes() {
                Ok(sample) => {
                    sum_y += sample.angular_rate_y;
                    sum_z += sample.angular_rate_z;
                    successful += 1;
                }
                Err(e) => warn!("Read error during calibration: {}", e),
            }
            tokio::time::sleep(self.settle_delay).await;
        }

        if successful == 0 {
            return Err(SensorError::AllReadsFailed(self.sample_count));
        }

        let count = self.sample_count as f32;
        let bias = CalibrationBias {
            bias_y: sum_y / count,
            bias_z: sum_z / count,
        };

        info!(
            "Calibration complete ({}/{} reads). Bias Y: {:.3}, Z: {:.3}",
            successful, self.sample_count, bias.bias_y, bias.bias_z
        );

        Ok(bias)
    }
}

/// Calibrate with the default settle delay
pub async fn calibrate<S: GyroSource>(
    sample_count: u32,
    source: &mut S,
) -> Result<CalibrationBias, SensorError> {
    BiasCalibrator::new(sample_count, DEFAULT_SETTLE_DELAY)
        .calibrate(source)
        .await
}
