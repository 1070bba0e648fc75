use serde::{Deserialize, Serialize};

/// One gyroscope reading in degrees/second. The X axis is not used.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroSample {
    pub angular_rate_y: f32,
    pub angular_rate_z: f32,
}

impl GyroSample {
    pub fn new(angular_rate_y: f32, angular_rate_z: f32) -> Self {
        Self {
            angular_rate_y,
            angular_rate_z,
        }
    }
}

/// Mean rest-state offset of the gyroscope
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBias {
    pub bias_y: f32,
    pub bias_z: f32,
}

/// Exponential moving average of bias-corrected samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub filtered_y: f32,
    pub filtered_z: f32,
}

impl FilterState {
    pub fn is_zero(&self) -> bool {
        self.filtered_y == 0.0 && self.filtered_z == 0.0
    }
}

/// Fractional cursor displacement carried between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionAccumulator {
    pub acc_x: f32,
    pub acc_y: f32,
}

impl MotionAccumulator {
    pub fn is_zero(&self) -> bool {
        self.acc_x == 0.0 && self.acc_y == 0.0
    }
}

/// Button masks for [`MouseReport::buttons`]
pub mod buttons {
    pub const LEFT: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const MIDDLE: u8 = 1 << 2;
    /// Only three buttons are described by the report descriptor
    pub const ALL: u8 = LEFT | RIGHT | MIDDLE;
}

/// Per-session pipeline state. Built fresh every time the link reaches
/// `ConnectedCalibrated` and dropped when it leaves that state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSession {
    pub bias: CalibrationBias,
    pub filter: FilterState,
    pub accumulator: MotionAccumulator,
}

impl MotionSession {
    pub fn new(bias: CalibrationBias) -> Self {
        Self {
            bias,
            filter: FilterState::default(),
            accumulator: MotionAccumulator::default(),
        }
    }
}
