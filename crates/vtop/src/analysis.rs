/// Attendance planning against a minimum percentage
use crate::types::AttendanceCourse;
use serde::{Deserialize, Serialize};

/// Minimum attendance the portal enforces before debarring a student.
pub const DEFAULT_TARGET_PERCENT: f64 = 75.0;

/// Guards `ceil`/`floor` against values like 40.000000001.
const EPSILON: f64 = 1e-9;

/// Where one course stands against the attendance target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceOutlook {
    pub course_code: String,
    pub percentage: f64,
    /// Consecutive classes to attend to reach the target; `None` if unreachable
    pub classes_needed: Option<u32>,
    /// Classes that can be missed while staying at or above the target
    pub classes_skippable: u32,
}

/// Smallest number of further classes to attend so that `(a + x) / (t + x) >= target`.
///
/// # Arguments
/// * `attended` - Classes attended so far
/// * `total` - Classes held so far
/// * `target_percent` - Required percentage, 0-100
///
/// # Returns
/// * `Some(0)` - Already at or above the target
/// * `Some(x)` - Classes still needed
/// * `None` - The target cannot be reached (100% with an absence on record)
pub fn classes_needed(attended: u32, total: u32, target_percent: f64) -> Option<u32> {
    let attended = f64::from(attended.min(total));
    let total = f64::from(total);
    let target = target_percent.clamp(0.0, 100.0);

    if 100.0 * attended >= target * total {
        return Some(0);
    }
    if target >= 100.0 {
        return None;
    }

    let needed = (target * total - 100.0 * attended) / (100.0 - target);
    Some((needed - EPSILON).ceil().max(0.0) as u32)
}

/// Largest number of classes that can be missed so that `a / (t + y) >= target`.
///
/// A target of 0 allows skipping without limit.
pub fn classes_skippable(attended: u32, total: u32, target_percent: f64) -> u32 {
    let attended = f64::from(attended.min(total));
    let total = f64::from(total);
    let target = target_percent.clamp(0.0, 100.0);

    if target <= 0.0 {
        return u32::MAX;
    }

    let skippable = (100.0 * attended - target * total) / target;
    (skippable + EPSILON).floor().max(0.0) as u32
}

/// Computes the outlook for every course in an attendance report.
pub fn outlook(courses: &[AttendanceCourse], target_percent: f64) -> Vec<AttendanceOutlook> {
    courses
        .iter()
        .map(|course| AttendanceOutlook {
            course_code: course.course_code.clone(),
            percentage: course.percentage,
            classes_needed: classes_needed(
                course.attended_classes,
                course.total_classes,
                target_percent,
            ),
            classes_skippable: classes_skippable(
                course.attended_classes,
                course.total_classes,
                target_percent,
            ),
        })
        .collect()
}
