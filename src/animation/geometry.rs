//! Wheel geometry and angle conventions
//!
//! Two angular conventions meet here. The wheel measures its rotation
//! clockwise from the pointer at the top of the wheel, so a wheel angle of 0
//! puts pocket index 0 under the pointer. The ball uses a standard screen
//! angle: 0 is the right-hand side (3 o'clock) and angles grow clockwise, so
//! the pointer sits at 270. Every conversion between the two goes through
//! `pointer_to_ball_angle`.

use crate::protocol::table::{pocket_index, POCKET_COUNT};

/// Angular width of one pocket in degrees
pub const SEGMENT_ANGLE: f64 = 360.0 / POCKET_COUNT as f64;

/// Offset between the pointer-based convention and the screen convention
const POINTER_OFFSET: f64 = 90.0;

/// Wrap an angle into `[0, 360)`
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Convert an angle measured clockwise from the pointer into the ball's convention
pub fn pointer_to_ball_angle(angle_from_pointer: f64) -> f64 {
    normalize_degrees(angle_from_pointer - POINTER_OFFSET)
}

/// The ball's resting angle: directly under the pointer
pub fn ball_rest_angle() -> f64 {
    pointer_to_ball_angle(0.0)
}

/// Angle of a pocket on the wheel face, measured from pocket index 0
pub fn segment_angle(segment_index: usize) -> f64 {
    segment_index as f64 * SEGMENT_ANGLE
}

/// Segment angle of a winning number, `None` for numbers not on the wheel
pub fn pocket_angle(number: u8) -> Option<f64> {
    pocket_index(number).map(segment_angle)
}

/// Wheel angle in `[0, 360)` that brings a segment under the pointer
///
/// Satisfies `(segment_angle + wheel_angle) mod 360 == 0`.
pub fn wheel_alignment_angle(segment_index: usize) -> f64 {
    normalize_degrees(-segment_angle(segment_index))
}

/// Pocket index the ball is over, given ball and wheel angles
pub fn segment_under_ball(ball_angle: f64, wheel_angle: f64) -> usize {
    let relative = normalize_degrees(ball_angle - wheel_angle);
    ((relative / SEGMENT_ANGLE).floor() as usize).min(POCKET_COUNT - 1)
}

/// Final wheel angle for a settle starting at `current`
///
/// Moves in the counter-rotating (decreasing) sense by the shortest amount
/// that aligns the segment with the pointer, plus `extra_turns` full turns.
pub fn wheel_settle_target(current: f64, segment_angle: f64, extra_turns: u32) -> f64 {
    let target_mod = normalize_degrees(-segment_angle);
    let mut delta = target_mod - normalize_degrees(current);
    if delta > 0.0 {
        delta -= 360.0;
    }
    delta -= 360.0 * extra_turns as f64;
    current + delta
}

/// Final ball angle for a settle starting at `current`
///
/// Moves in the co-rotating (increasing) sense to the rest angle, plus
/// `extra_turns` full turns.
pub fn ball_settle_target(current: f64, extra_turns: u32) -> f64 {
    let mut delta = ball_rest_angle() - normalize_degrees(current);
    if delta < 0.0 {
        delta += 360.0;
    }
    delta += 360.0 * extra_turns as f64;
    current + delta
}

/// Distance between two angles on the circle, in `[0, 180]`
pub fn circular_distance(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    d.min(360.0 - d)
}
