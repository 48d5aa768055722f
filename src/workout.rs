//! Workout text generation.
//!
//! The generator is display text only: `time`, `goal` and `equipment` are
//! embedded verbatim, with no unit checks and no exercise selection.

use crate::WorkoutPrompt;

/// used when the request names no equipment
pub const DEFAULT_EQUIPMENT: &str = "bodyweight";

/// format of the `time` field in `GET /api/history` items
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn describe(time: &str, goal: &str, equipment: Option<&str>) -> String {
    let equipment = match equipment {
        Some(e) if !e.is_empty() => e,
        _ => DEFAULT_EQUIPMENT,
    };
    format!("{} mins of {} workout using {}", time, goal, equipment)
}

impl WorkoutPrompt {
    pub fn describe(&self) -> String {
        describe(&self.time, &self.goal, self.equipment.as_deref())
    }
}
