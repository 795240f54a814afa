//! Attendance summary and per-course attendance detail extraction.

use super::{
    cell_text, document_rows, is_course_code, parse_serial, row_cells, strip_school, Extraction,
};
use crate::types::{AttendanceCourse, AttendanceDetail};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CLICKABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[onclick], a[href]").unwrap());
static DETAIL_ARGS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]"#).unwrap()
});

/// `serial, category, name, code, faculty, attended, total, percentage, ...`
const SPLIT_MIN_CELLS: usize = 8;
/// `serial, category, "CODE - Name - Type", class detail, faculty, attended, total, percentage, ...`
const COMBINED_MIN_CELLS: usize = 9;
/// Column of the attended count in both layouts (total and percentage follow).
const COUNTS_AT: usize = 5;
/// Leading rows of the detail page that never hold data.
const DETAIL_HEADER_ROWS: usize = 1;

/// Column layout of one attendance summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Split,
    Combined,
}

impl Layout {
    fn detect(cells: &[String]) -> Option<Self> {
        if cells.len() >= SPLIT_MIN_CELLS && is_course_code(&cells[3]) {
            return Some(Layout::Split);
        }
        if cells.len() >= COMBINED_MIN_CELLS && !is_course_code(&cells[3]) {
            let code = cells[2].split(" - ").next().unwrap_or_default();
            if is_course_code(code) {
                return Some(Layout::Combined);
            }
        }
        None
    }
}

/// Parses the attendance summary table.
///
/// Non-data rows (headers, spacers, totals) are dropped; rows with a numeric
/// serial that still cannot be read are counted as rejected.
pub fn parse_attendance(html: &str) -> Extraction<AttendanceCourse> {
    let document = Html::parse_document(html);
    let mut courses = Vec::new();
    let mut rejected = 0usize;

    for row in document.select(&ROW_SELECTOR) {
        let cells: Vec<String> = row_cells(&row).iter().map(cell_text).collect();

        let Some(layout) = Layout::detect(&cells) else {
            if cells.first().and_then(|c| parse_serial(c)).is_some() {
                rejected += 1;
            }
            continue;
        };

        match parse_attendance_row(&row, &cells, layout) {
            Some(course) => courses.push(course),
            None => rejected += 1,
        }
    }

    Extraction::new(courses, rejected)
}

fn parse_attendance_row(
    row: &ElementRef,
    cells: &[String],
    layout: Layout,
) -> Option<AttendanceCourse> {
    let category = cells[1].clone();

    let faculty = &cells[4];
    let (course_code, course_name, detail_type) = match layout {
        Layout::Split => (cells[3].clone(), cells[2].clone(), None),
        Layout::Combined => {
            let mut parts = cells[2].split(" - ").map(str::trim);
            let code = parts.next().unwrap_or_default().to_string();
            let name = parts.next().unwrap_or_default().to_string();
            let kind = parts.next().map(str::to_string);
            (code, name, kind)
        }
    };

    let total_classes: u32 = cells[COUNTS_AT + 1].trim().parse().ok()?;
    let attended_classes = cells[COUNTS_AT]
        .trim()
        .parse::<u32>()
        .ok()?
        .min(total_classes);
    let absent_classes = total_classes - attended_classes;

    let percentage = parse_percentage(&cells[COUNTS_AT + 2])
        .unwrap_or_else(|| ratio_percentage(attended_classes, total_classes))
        .clamp(0.0, 100.0);

    let mut between_exams_percentage = None;
    let mut debar_status = String::new();
    for extra in &cells[COUNTS_AT + 3..] {
        let text = extra.trim();
        if text.is_empty() || text == "-" || text.eq_ignore_ascii_case("view") {
            continue;
        }
        match parse_percentage(text) {
            Some(p) if between_exams_percentage.is_none() => {
                between_exams_percentage = Some(p.clamp(0.0, 100.0))
            }
            Some(_) => {}
            None if debar_status.is_empty() => debar_status = text.to_string(),
            None => {}
        }
    }

    let (course_id, course_type) = match detail_args(row) {
        Some(args) => args,
        None => (
            course_code.clone(),
            detail_type.unwrap_or_else(|| category.clone()),
        ),
    };

    Some(AttendanceCourse {
        course_code,
        course_name,
        course_type,
        faculty: strip_school(faculty),
        total_classes,
        attended_classes,
        absent_classes,
        percentage,
        course_id,
        category,
        debar_status,
        between_exams_percentage,
    })
}

/// `(courseId, courseType)` from a `processViewAttendanceDetail('ID','TYPE')` handler.
fn detail_args(row: &ElementRef) -> Option<(String, String)> {
    let own = row.value().attr("onclick");
    let nested = row.select(&CLICKABLE_SELECTOR).flat_map(|el| {
        [el.value().attr("onclick"), el.value().attr("href")]
            .into_iter()
            .flatten()
    });

    own.into_iter().chain(nested).find_map(|handler| {
        DETAIL_ARGS_REGEX
            .captures(handler)
            .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
    })
}

fn parse_percentage(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn ratio_percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(attended) * 100.0 / f64::from(total)
    }
}

/// Parses the attendance detail table for one course.
pub fn parse_attendance_detail(html: &str) -> Extraction<AttendanceDetail> {
    let document = Html::parse_document(html);
    let mut details = Vec::new();
    let mut rejected = 0usize;

    for cells in document_rows(&document).into_iter().skip(DETAIL_HEADER_ROWS) {
        let Some(serial) = cells.first().and_then(|c| parse_serial(c)) else {
            continue;
        };
        if cells.len() < 5 {
            rejected += 1;
            continue;
        }
        details.push(AttendanceDetail {
            serial,
            date: cells[1].clone(),
            slot: cells[2].clone(),
            day_time: cells[3].clone(),
            status: cells[4].clone(),
            remark: cells.get(5).cloned().unwrap_or_default(),
        });
    }

    Extraction::new(details, rejected)
}
