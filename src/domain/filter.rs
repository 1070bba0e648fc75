use crate::domain::models::{CalibrationBias, FilterState, GyroSample};

pub const DEFAULT_ALPHA: f32 = 0.3;
pub const DEFAULT_DEADZONE: f32 = 0.2;

/// Bias-correct, smooth and deadzone one raw sample.
///
/// Returns the `(y, z)` pair for the integrator. `state` keeps the unclipped
/// EMA so small lingering signal still shapes later ticks.
pub fn update(
    raw: GyroSample,
    bias: CalibrationBias,
    state: &mut FilterState,
    alpha: f32,
    deadzone: f32,
) -> (f32, f32) {
    let corrected_y = raw.angular_rate_y - bias.bias_y;
    let corrected_z = raw.angular_rate_z - bias.bias_z;

    state.filtered_y = ema(alpha, corrected_y, state.filtered_y);
    state.filtered_z = ema(alpha, corrected_z, state.filtered_z);

    (
        apply_deadzone(state.filtered_y, deadzone),
        apply_deadzone(state.filtered_z, deadzone),
    )
}

fn ema(alpha: f32, value: f32, previous: f32) -> f32 {
    alpha * value + (1.0 - alpha) * previous
}

/// Values within the deadzone become exactly zero; others pass unchanged
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() > deadzone {
        value
    } else {
        0.0
    }
}

/// Motion filter with its tuning bound in
#[derive(Debug, Clone, Copy)]
pub struct MotionFilter {
    pub alpha: f32,
    pub deadzone: f32,
}

impl Default for MotionFilter {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            deadzone: DEFAULT_DEADZONE,
        }
    }
}

impl MotionFilter {
    pub fn new(alpha: f32, deadzone: f32) -> Self {
        Self { alpha, deadzone }
    }

    pub fn update(
        &self,
        raw: GyroSample,
        bias: CalibrationBias,
        state: &mut FilterState,
    ) -> (f32, f32) {
        update(raw, bias, state, self.alpha, self.deadzone)
    }
}
