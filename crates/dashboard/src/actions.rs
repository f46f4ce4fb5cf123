//! Handlers for the irrigation tab's inputs.  Each one mutates the session
//! state directly and returns; nothing is scheduled or actuated.

use time::OffsetDateTime;
use tracing::info;

use crate::session::{
    ClockTime, SessionState, DURATION_MAX, DURATION_MIN, THRESHOLD_MAX, THRESHOLD_MIN,
};

/// Soil humidity added to the latest sample on manual activation.
pub const MANUAL_BOOST: f64 = 6.0;

pub const MANUAL_FLASH: &str = "Irrigation activated (visual simulation).";
pub const SCHEDULE_FLASH: &str = "Schedule saved (volatile memory).";

/// Record a manual activation and bump the latest soil reading.
pub fn activate_manual(state: &mut SessionState, now: OffsetDateTime) {
    state.status.last_activation = Some(now);
    state.status.activations_today = state.status.activations_today.saturating_add(1);
    state.series.boost_latest_soil(MANUAL_BOOST);
    state.flash = Some(MANUAL_FLASH.to_string());

    info!(
        activations_today = state.status.activations_today,
        "manual irrigation activated"
    );
}

/// Store the automatic-mode toggle and threshold.
pub fn set_automatic(state: &mut SessionState, auto: bool, threshold: f64) {
    state.config.auto = auto;
    state.config.threshold = clamp_threshold(threshold);
}

/// Store both scheduled times and the duration.  `time1` is not required to
/// precede `time2`.
pub fn save_schedule(state: &mut SessionState, time1: ClockTime, time2: ClockTime, duration_sec: i64) {
    state.config.time1 = time1;
    state.config.time2 = time2;
    state.config.duration_sec = clamp_duration(duration_sec);
    state.flash = Some(SCHEDULE_FLASH.to_string());

    info!(
        time1 = %time1,
        time2 = %time2,
        duration_sec = state.config.duration_sec,
        "irrigation schedule saved"
    );
}

/// Pin a threshold to the input's `[10, 90]` bounds.
pub fn clamp_threshold(value: f64) -> f64 {
    if value.is_nan() {
        return THRESHOLD_MIN;
    }
    value.clamp(THRESHOLD_MIN, THRESHOLD_MAX)
}

/// Pin a duration to the input's `[5, 600]` bounds.
pub fn clamp_duration(value: i64) -> u32 {
    value.clamp(i64::from(DURATION_MIN), i64::from(DURATION_MAX)) as u32
}

// ===========================================================================
// Tests
// ===========================================================================
