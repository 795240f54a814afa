/// Records extracted from VTOP report pages
use crate::error::ParseIncomplete;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A semester entry from the semester selection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    /// Value posted back as `semesterSubId` (e.g., "VL20242505")
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Parses a day label such as "MON", "Tue" or "WEDNESDAY".
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_ascii_lowercase();
        let day = match lower.get(..3)? {
            "mon" => Weekday::Monday,
            "tue" => Weekday::Tuesday,
            "wed" => Weekday::Wednesday,
            "thu" => Weekday::Thursday,
            "fri" => Weekday::Friday,
            "sat" => Weekday::Saturday,
            "sun" => Weekday::Sunday,
            _ => return None,
        };
        // Reject words that merely start with a day prefix ("Monthly", "Satellite")
        let full = format!("{:?}", day).to_ascii_lowercase();
        if lower.len() == 3 || full == lower {
            Some(day)
        } else {
            None
        }
    }
}

/// One class meeting in the weekly timetable grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub day: Weekday,
    pub slot_label: String,
    pub course_code: String,
    pub course_name: String,
    /// "Theory", "Lab" or the raw type token
    pub course_type: String,
    pub venue: String,
    pub block: String,
    /// `HH:MM`, 24-hour
    pub start_time: Option<String>,
    /// `HH:MM`, 24-hour
    pub end_time: Option<String>,
    pub is_lab: bool,
    pub faculty: String,
    /// Grid column, used to match the timing header rows
    pub ordinal: usize,
}

/// Attendance summary for one registered course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCourse {
    pub course_code: String,
    pub course_name: String,
    pub course_type: String,
    pub faculty: String,
    pub total_classes: u32,
    pub attended_classes: u32,
    pub absent_classes: u32,
    /// 0-100
    pub percentage: f64,
    /// Identifier used by the attendance detail view
    pub course_id: String,
    pub category: String,
    pub debar_status: String,
    pub between_exams_percentage: Option<f64>,
}

/// One scheduled class meeting in a course's attendance detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceDetail {
    pub serial: u32,
    pub date: String,
    pub slot: String,
    pub day_time: String,
    /// "Present", "Absent", "On Duty", ...
    pub status: String,
    pub remark: String,
}

/// Marks for one course, with each assessment component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMarks {
    pub course_code: String,
    pub course_name: String,
    pub course_type: String,
    pub faculty: String,
    pub slot: String,
    pub components: Vec<MarkComponent>,
}

impl CourseMarks {
    /// Sum of weighted scores across components.
    pub fn weighted_total(&self) -> f64 {
        self.components.iter().map(|c| c.weighted_score).sum()
    }

    /// Sum of component weightages (the maximum achievable weighted total so far).
    pub fn weightage_total(&self) -> f64 {
        self.components.iter().map(|c| c.weightage).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkComponent {
    pub name: String,
    pub max_marks: f64,
    pub scored_marks: f64,
    pub weightage: f64,
    pub weighted_score: f64,
    pub status: String,
    pub remark: String,
}

/// Exams of one type (e.g., "CAT1", "FAT").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamTypeGroup {
    pub exam_type: String,
    pub exams: Vec<ExamSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSlot {
    pub course_code: String,
    pub course_name: String,
    pub course_type: String,
    pub slot: String,
    pub exam_date: String,
    pub exam_session: String,
    pub reporting_time: String,
    pub exam_time: String,
    pub venue: String,
    pub seat_location: String,
    pub seat_no: String,
}

/// A fetch result, stamped with when and for which semester it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub semester_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub data: T,
    /// Set when the extractor had to drop rows
    pub incomplete: Option<ParseIncomplete>,
}

impl<T> Fetched<T> {
    pub fn new(semester_id: Option<&str>, data: T, incomplete: Option<ParseIncomplete>) -> Self {
        Self {
            semester_id: semester_id.map(str::to_string),
            fetched_at: Utc::now(),
            data,
            incomplete,
        }
    }
}
