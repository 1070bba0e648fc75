use crate::domain::models::MotionAccumulator;

pub const DEFAULT_SENSITIVITY: f32 = -1.0;

/// Largest magnitude a relative axis can carry in one report
pub const MAX_DELTA: i32 = 127;

/// Convert filtered angular rate into whole-unit cursor deltas.
///
/// Rotation about Z moves the cursor horizontally, rotation about Y moves it
/// vertically. Fractions stay in `acc` until they add up to a whole unit.
/// Only the delivered (clamped) amount leaves the accumulator, so motion
/// beyond +/-127 in one tick is carried over to the following ticks.
///
/// `(0, 0)` means there is nothing to report.
pub fn integrate(
    filtered_y: f32,
    filtered_z: f32,
    acc: &mut MotionAccumulator,
    sensitivity: f32,
) -> (i8, i8) {
    acc.acc_x += filtered_z * sensitivity;
    acc.acc_y += filtered_y * sensitivity;

    let move_x = extract(&mut acc.acc_x);
    let move_y = extract(&mut acc.acc_y);

    (move_x, move_y)
}

fn extract(acc: &mut f32) -> i8 {
    // `as` saturates and truncates toward zero
    let whole = acc.trunc() as i32;
    let delivered = whole.clamp(-MAX_DELTA, MAX_DELTA);
    *acc -= delivered as f32;
    delivered as i8
}
