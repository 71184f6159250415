//! Progress increment for one observation window.

use serde::{Deserialize, Serialize};

use crate::saturate;

/// Percentage points of base progress per minute.
pub const MINUTE_PROGRESS_RATE: f64 = 0.8;
pub const ENGAGEMENT_MULTIPLIER_BASE: f64 = 0.5;

/// Load above this slows accrual regardless of capacity. Independent of the
/// classifier's overwhelmed multiple.
pub const OVERLOAD_LOAD_THRESHOLD: f64 = 85.0;
pub const OVERLOAD_FACTOR: f64 = 0.7;
pub const OVER_CAPACITY_FACTOR: f64 = 0.8;
pub const UNDERLOAD_LOAD_THRESHOLD: f64 = 25.0;
pub const UNDERLOAD_FACTOR: f64 = 0.85;

/// Converts percentage points into `[0, 1]` completion units.
pub const PROGRESS_PERCENT_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualInput {
    pub elapsed_minutes: f64,
    pub cognitive_load: f64,
    pub engagement: f64,
    pub cognitive_capacity: i32,
}

/// `0.5 + engagement / 100`, in `[0.5, 1.5]`.
pub fn engagement_multiplier(engagement: f64) -> f64 {
    ENGAGEMENT_MULTIPLIER_BASE + saturate(engagement, 0.0, 100.0) / 100.0
}

pub fn cognitive_factor(cognitive_load: f64, cognitive_capacity: i32) -> f64 {
    if cognitive_load > OVERLOAD_LOAD_THRESHOLD {
        OVERLOAD_FACTOR
    } else if cognitive_load > f64::from(cognitive_capacity) {
        OVER_CAPACITY_FACTOR
    } else if cognitive_load < UNDERLOAD_LOAD_THRESHOLD {
        UNDERLOAD_FACTOR
    } else {
        1.0
    }
}

/// Completion gained over `elapsed_minutes`, never negative.
pub fn progress_increment(input: AccrualInput) -> f64 {
    let minutes = if input.elapsed_minutes.is_finite() {
        input.elapsed_minutes.max(0.0)
    } else {
        0.0
    };
    let base = minutes * MINUTE_PROGRESS_RATE;
    let percent = base
        * engagement_multiplier(input.engagement)
        * cognitive_factor(input.cognitive_load, input.cognitive_capacity);
    percent / PROGRESS_PERCENT_SCALE
}

/// Add an increment to a progress value, capped at 1.0.
pub fn advance_progress(current: f64, increment: f64) -> f64 {
    let current = saturate(current, 0.0, 1.0);
    let increment = if increment.is_nan() { 0.0 } else { increment.max(0.0) };
    (current + increment).min(1.0)
}
