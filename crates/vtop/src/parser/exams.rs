use super::{document_rows, parse_serial, Extraction};
use crate::types::{ExamSlot, ExamTypeGroup};
use scraper::Html;

/// Group name for exam rows that appear before any exam type header.
pub const UNGROUPED_EXAM_TYPE: &str = "General";

/// `serial, code, title, type, class id, slot, date, session, reporting, exam time, venue, seat location, seat no`
const EXAM_ROW_MIN_CELLS: usize = 13;
/// Exam type headers span the whole table in one or two cells.
const TYPE_HEADER_MAX_CELLS: usize = 2;

/// Parses the exam schedule into groups keyed by exam type, in page order.
///
/// Groups that end up with no exams are dropped.
pub fn parse_exam_schedule(html: &str) -> Extraction<ExamTypeGroup> {
    let document = Html::parse_document(html);
    let mut groups: Vec<ExamTypeGroup> = Vec::new();
    let mut rejected = 0usize;

    for cells in document_rows(&document) {
        if (1..=TYPE_HEADER_MAX_CELLS).contains(&cells.len()) {
            let label = cells.join(" ").trim().to_string();
            if !label.is_empty() && parse_serial(&cells[0]).is_none() {
                groups.push(ExamTypeGroup {
                    exam_type: label,
                    exams: Vec::new(),
                });
                continue;
            }
        }

        if cells.first().and_then(|c| parse_serial(c)).is_none() {
            continue;
        }
        if cells.len() < EXAM_ROW_MIN_CELLS {
            rejected += 1;
            continue;
        }

        let exam = ExamSlot {
            course_code: cells[1].clone(),
            course_name: cells[2].clone(),
            course_type: cells[3].clone(),
            slot: cells[5].clone(),
            exam_date: cells[6].clone(),
            exam_session: cells[7].clone(),
            reporting_time: cells[8].clone(),
            exam_time: cells[9].clone(),
            venue: cells[10].clone(),
            seat_location: cells[11].clone(),
            seat_no: cells[12].clone(),
        };

        match groups.last_mut() {
            Some(group) => group.exams.push(exam),
            None => groups.push(ExamTypeGroup {
                exam_type: UNGROUPED_EXAM_TYPE.to_string(),
                exams: vec![exam],
            }),
        }
    }

    groups.retain(|group| !group.exams.is_empty());
    Extraction::new(groups, rejected)
}
