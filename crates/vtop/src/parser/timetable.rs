//! Timetable extraction.
//!
//! The timetable page has two parts: a course list (code, title, faculty)
//! and a weekly grid. Grid cells only carry `SLOT-CODE-TYPE-VENUE-BLOCK...`,
//! so course names and faculty are joined in from the course list, and
//! start/end times come from the grid's header rows, matched by column.

use super::{document_rows, is_course_code, Extraction};
use crate::types::{TimetableSlot, Weekday};
use regex::Regex;
use scraper::Html;
use std::collections::HashMap;
use std::sync::LazyLock;

static COURSE_TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z]{2,4}\d{3,4}[A-Z]?)\s+-\s+([^()]+?)\s*\(([^)]*)\)").unwrap()
});
static FACULTY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z .']*?)\s+-\s+([A-Z]{2,8})$").unwrap());
static TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[:.](\d{2})\s*([AaPp][Mm])?$").unwrap());

/// Whether a grid row block holds theory or lab slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKind {
    Theory,
    Lab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Boundary {
    Start,
    End,
}

/// One decoded grid cell, before day/time/name are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCell {
    pub slot_label: String,
    pub course_code: String,
    pub course_type: String,
    pub venue: String,
    pub block: String,
    pub is_lab: bool,
}

/// Course names and faculty gathered from the course list.
#[derive(Debug, Default)]
struct CourseDirectory {
    names: HashMap<String, String>,
    theory_faculty: HashMap<String, String>,
    lab_faculty: HashMap<String, String>,
}

impl CourseDirectory {
    fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut directory = Self::default();

        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                let Some(caps) = COURSE_TITLE_REGEX.captures(cell) else {
                    continue;
                };
                let code = caps[1].to_string();
                let name = caps[2].trim().to_string();
                let is_lab = caps[3].to_ascii_lowercase().contains("lab");

                directory.names.entry(code.clone()).or_insert(name);

                let faculty = row
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .find_map(|(_, other)| FACULTY_REGEX.captures(other))
                    .map(|c| c[1].trim().to_string());

                if let Some(faculty) = faculty {
                    let map = if is_lab {
                        &mut directory.lab_faculty
                    } else {
                        &mut directory.theory_faculty
                    };
                    map.entry(code).or_insert(faculty);
                }
            }
        }

        directory
    }

    fn name(&self, code: &str) -> String {
        self.names.get(code).cloned().unwrap_or_default()
    }

    fn faculty(&self, code: &str, is_lab: bool) -> String {
        let (primary, fallback) = if is_lab {
            (&self.lab_faculty, &self.theory_faculty)
        } else {
            (&self.theory_faculty, &self.lab_faculty)
        };
        primary
            .get(code)
            .or_else(|| fallback.get(code))
            .cloned()
            .unwrap_or_default()
    }
}

/// Maps a type token to its display form: ETH/TH are theory, ELA/LA are lab.
pub fn normalize_course_type(token: &str) -> String {
    match token.trim().to_ascii_uppercase().as_str() {
        "ETH" | "TH" => "Theory".to_string(),
        "ELA" | "LA" => "Lab".to_string(),
        _ => token.trim().to_string(),
    }
}

/// Decodes a grid cell like `L11-CSE2005-ELA-309-AB-1-ALL`.
///
/// Needs at least `SLOT-CODE-TYPE`; returns `None` for anything shorter or
/// for cells whose second segment is not a course code.
pub fn decode_slot_cell(cell: &str, lab_row: bool) -> Option<SlotCell> {
    let segments: Vec<&str> = cell.split('-').map(str::trim).collect();
    if segments.len() < 3 || !is_course_code(segments[1]) {
        return None;
    }

    let course_type = normalize_course_type(segments[2]);
    let is_lab = lab_row || course_type == "Lab";

    Some(SlotCell {
        slot_label: segments[0].to_string(),
        course_code: segments[1].to_string(),
        course_type,
        venue: segments.get(3).map(|s| s.to_string()).unwrap_or_default(),
        block: segments.get(4).map(|s| s.to_string()).unwrap_or_default(),
        is_lab,
    })
}

/// Normalizes "8:00", "08.00", "1:50 PM" to 24-hour `HH:MM`.
pub fn normalize_time(text: &str) -> Option<String> {
    let caps = TIME_REGEX.captures(text.trim())?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;

    if let Some(meridiem) = caps.get(3) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (pm, hour) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    }

    (hour < 24 && minute < 60).then(|| format!("{:02}:{:02}", hour, minute))
}

fn is_blank_cell(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("lunch")
}

/// Parses the timetable page into slots, in grid order.
pub fn parse_timetable(html: &str) -> Extraction<TimetableSlot> {
    let document = Html::parse_document(html);
    let rows = document_rows(&document);
    let directory = CourseDirectory::from_rows(&rows);

    let mut times: HashMap<(RowKind, Boundary, usize), String> = HashMap::new();
    let mut cells: Vec<(Weekday, RowKind, usize, SlotCell)> = Vec::new();
    let mut rejected = 0usize;

    let mut day: Option<Weekday> = None;
    let mut kind = RowKind::Theory;

    for row in &rows {
        let mut idx = 0;
        let mut boundary: Option<Boundary> = None;

        while let Some(label) = row.get(idx) {
            let upper = label.trim().to_ascii_uppercase();
            if let Some(d) = Weekday::from_label(&upper) {
                day = Some(d);
                kind = RowKind::Theory;
            } else if upper == "THEORY" {
                kind = RowKind::Theory;
            } else if upper == "LAB" {
                kind = RowKind::Lab;
            } else if upper == "START" {
                boundary = Some(Boundary::Start);
            } else if upper == "END" {
                boundary = Some(Boundary::End);
            } else {
                break;
            }
            idx += 1;
        }

        // Not part of the grid
        if idx == 0 {
            continue;
        }

        let data = &row[idx..];
        if let Some(boundary) = boundary {
            for (ordinal, cell) in data.iter().enumerate() {
                if let Some(time) = normalize_time(cell) {
                    times.insert((kind, boundary, ordinal), time);
                }
            }
            continue;
        }

        let Some(current_day) = day else {
            continue;
        };

        for (ordinal, cell) in data.iter().enumerate() {
            if is_blank_cell(cell) {
                continue;
            }
            match decode_slot_cell(cell, kind == RowKind::Lab) {
                Some(slot) => cells.push((current_day, kind, ordinal, slot)),
                // A bare slot name ("A1") is an empty period; only count
                // cells that had the full shape but failed to decode.
                None if cell.split('-').count() >= 3 => rejected += 1,
                None => {}
            }
        }
    }

    let lookup = |kind: RowKind, boundary: Boundary, ordinal: usize| {
        let other = match kind {
            RowKind::Theory => RowKind::Lab,
            RowKind::Lab => RowKind::Theory,
        };
        times
            .get(&(kind, boundary, ordinal))
            .or_else(|| times.get(&(other, boundary, ordinal)))
            .cloned()
    };

    let slots = cells
        .into_iter()
        .map(|(day, kind, ordinal, cell)| TimetableSlot {
            day,
            course_name: directory.name(&cell.course_code),
            faculty: directory.faculty(&cell.course_code, cell.is_lab),
            start_time: lookup(kind, Boundary::Start, ordinal),
            end_time: lookup(kind, Boundary::End, ordinal),
            slot_label: cell.slot_label,
            course_code: cell.course_code,
            course_type: cell.course_type,
            venue: cell.venue,
            block: cell.block,
            is_lab: cell.is_lab,
            ordinal,
        })
        .collect();

    Extraction::new(slots, rejected)
}
