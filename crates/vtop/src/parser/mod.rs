//! HTML extraction for VTOP pages.
//!
//! Every extractor is a pure `&str -> Extraction<T>` function. The portal's
//! markup is unversioned, so extraction is best-effort: rows that do not fit
//! are skipped and counted, never fatal.

pub mod attendance;
pub mod exams;
pub mod login_page;
pub mod marks;
pub mod semesters;
pub mod timetable;

pub use attendance::{parse_attendance, parse_attendance_detail};
pub use exams::parse_exam_schedule;
pub use marks::parse_marks;
pub use semesters::parse_semesters;
pub use timetable::{decode_slot_cell, parse_timetable};

use crate::error::ParseIncomplete;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static COURSE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,4}\d{3,4}[A-Z]?$").unwrap());

/// Records pulled out of one page, plus how many data-looking rows were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<T> {
    pub records: Vec<T>,
    pub rejected: usize,
}

impl<T> Extraction<T> {
    pub fn new(records: Vec<T>, rejected: usize) -> Self {
        Self { records, rejected }
    }

    /// Diagnostic for callers, `None` when nothing was dropped.
    pub fn incomplete(&self, extractor: &str) -> Option<ParseIncomplete> {
        (self.rejected > 0).then(|| ParseIncomplete {
            extractor: extractor.to_string(),
            rejected: self.rejected,
        })
    }
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 0)
    }
}

/// Direct `td`/`th` children of a row (cells of nested tables excluded).
pub(crate) fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// Text content of an element with runs of whitespace collapsed.
pub(crate) fn cell_text(el: &ElementRef) -> String {
    normalize_ws(&el.text().collect::<String>())
}

pub(crate) fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cell texts of every row in the document, in document order.
pub(crate) fn document_rows(document: &scraper::Html) -> Vec<Vec<String>> {
    document
        .select(&ROW_SELECTOR)
        .map(|row| row_cells(&row).iter().map(cell_text).collect())
        .collect()
}

/// `2-4 letters, 3-4 digits`, with an optional trailing letter (e.g. BCSE101E).
pub(crate) fn is_course_code(text: &str) -> bool {
    COURSE_CODE_REGEX.is_match(text.trim())
}

/// Parses a number out of cell text ("45.5", "80 %", "1,200"), 0 on failure.
pub(crate) fn parse_number(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// "NAME - SCHOOL" to "NAME".
pub(crate) fn strip_school(faculty: &str) -> String {
    match faculty.rsplit_once(" - ") {
        Some((name, school))
            if !school.is_empty() && school.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            name.trim().to_string()
        }
        _ => faculty.trim().to_string(),
    }
}

pub(crate) fn parse_serial(text: &str) -> Option<u32> {
    text.trim().trim_end_matches('.').parse::<u32>().ok()
}
