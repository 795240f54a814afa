//! Marks report extraction.
//!
//! The report renders one header row per course followed by a nested table of
//! assessment components. Rows are walked in document order, so component rows
//! attach to whichever course header came last.
//!
//! The portal's course header reads `serial, class no, code, title, type,
//! system, faculty, slot, mode`. Some semesters drop the class number and
//! system columns (`serial, code, title, type, faculty, slot, ...`), so the
//! code is looked for in the third cell, then the second.

use super::{document_rows, is_course_code, parse_number, parse_serial, strip_school, Extraction};
use crate::types::{CourseMarks, MarkComponent};
use scraper::Html;

const HEADER_MIN_CELLS: usize = 8;
/// `serial, name, max, weightage, status, scored, weighted, [remark]`
const COMPONENT_MIN_CELLS: usize = 7;

/// Column positions of a course header row.
struct HeaderLayout {
    code: usize,
    title: usize,
    course_type: usize,
    faculty: usize,
    slot: usize,
}

/// `serial, class no, code, title, type, system, faculty, slot`
const WITH_CLASS_NUMBER: HeaderLayout = HeaderLayout {
    code: 2,
    title: 3,
    course_type: 4,
    faculty: 6,
    slot: 7,
};

/// `serial, code, title, type, faculty, slot`
const COMPACT: HeaderLayout = HeaderLayout {
    code: 1,
    title: 2,
    course_type: 3,
    faculty: 4,
    slot: 5,
};

enum MarksRow {
    Course(CourseMarks),
    Component(MarkComponent),
}

/// Parses the marks report into courses with their components.
pub fn parse_marks(html: &str) -> Extraction<CourseMarks> {
    let document = Html::parse_document(html);
    let mut courses: Vec<CourseMarks> = Vec::new();
    let mut rejected = 0usize;

    for cells in document_rows(&document) {
        if cells.first().and_then(|c| parse_serial(c)).is_none() {
            continue;
        }

        match classify_row(&cells) {
            Some(MarksRow::Course(course)) => courses.push(course),
            Some(MarksRow::Component(component)) => match courses.last_mut() {
                Some(course) => course.components.push(component),
                None => rejected += 1,
            },
            None => rejected += 1,
        }
    }

    Extraction::new(courses, rejected)
}

fn classify_row(cells: &[String]) -> Option<MarksRow> {
    if let Some(layout) = header_layout(cells) {
        return Some(MarksRow::Course(CourseMarks {
            course_code: cells[layout.code].trim().to_string(),
            course_name: cells[layout.title].clone(),
            course_type: cells[layout.course_type].clone(),
            faculty: strip_school(&cells[layout.faculty]),
            slot: cells[layout.slot].clone(),
            components: Vec::new(),
        }));
    }

    if cells.len() >= COMPONENT_MIN_CELLS {
        return Some(MarksRow::Component(MarkComponent {
            name: cells[1].clone(),
            max_marks: parse_number(&cells[2]),
            weightage: parse_number(&cells[3]),
            status: cells[4].clone(),
            scored_marks: parse_number(&cells[5]),
            weighted_score: parse_number(&cells[6]),
            remark: cells.get(7).cloned().unwrap_or_default(),
        }));
    }

    None
}

fn header_layout(cells: &[String]) -> Option<&'static HeaderLayout> {
    if cells.len() < HEADER_MIN_CELLS {
        return None;
    }
    [&WITH_CLASS_NUMBER, &COMPACT]
        .into_iter()
        .find(|layout| is_course_code(&cells[layout.code]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKS_PAGE: &str = r#"
    <table class="customTable">
      <tr class="tableHeader">
        <td>Sl.No.</td><td>Class Nbr</td><td>Course Code</td><td>Course Title</td>
        <td>Course Type</td><td>Course System</td><td>Faculty</td><td>Slot</td><td>Course Mode</td>
      </tr>
      <tr class="tableContent">
        <td>1</td><td>VL2024250100123</td><td>CSE2005</td><td>Operating Systems</td>
        <td>Embedded Theory</td><td>CAL</td><td>ANANYA RAO - SCOPE</td><td>A1+TA1</td><td>Regular</td>
      </tr>
      <tr class="tableContent">
        <td colspan="9">
          <table class="customTable-level1">
            <tr class="tableHeader-level1">
              <td>Sl.No.</td><td>Mark Title</td><td>Max. Mark</td><td>Weightage %</td>
              <td>Status</td><td>Scored Mark</td><td>Weightage Mark</td><td>Remark</td>
            </tr>
            <tr class="tableContent-level1">
              <td>1</td><td>CAT-1</td><td>50.00</td><td>15.00</td>
              <td>Present</td><td>42.50</td><td>12.75</td><td></td>
            </tr>
            <tr class="tableContent-level1">
              <td>2</td><td>Digital Assignment 1</td><td>10.00</td><td>10.00</td>
              <td>Present</td><td>9.00</td><td>9.00</td><td>Good</td>
            </tr>
            <tr class="tableContent-level1">
              <td>3</td><td>CAT-2</td><td>50.00</td><td>15.00</td>
              <td>Absent</td><td>-</td><td>N/A</td>
            </tr>
          </table>
        </td>
      </tr>
      <tr class="tableContent">
        <td>2</td><td>VL2024250100456</td><td>MAT2001</td><td>Statistics for Engineers</td>
        <td>Theory Only</td><td>CAL</td><td>MEERA IYER - SAS</td><td>C1</td><td>Regular</td>
      </tr>
      <tr class="tableContent">
        <td colspan="9">
          <table class="customTable-level1">
            <tr><td>1</td><td>Quiz 1</td><td>10</td><td>5</td><td>Present</td><td>8</td><td>4</td></tr>
            <tr><td>2</td><td>broken</td><td>10</td></tr>
          </table>
        </td>
      </tr>
    </table>"#;

    #[test]
    fn test_components_attach_to_preceding_course() {
        let extraction = parse_marks(MARKS_PAGE);
        let courses = extraction.records;
        assert_eq!(courses.len(), 2);
        assert_eq!(extraction.rejected, 1);

        let os = &courses[0];
        assert_eq!(os.course_code, "CSE2005");
        assert_eq!(os.course_name, "Operating Systems");
        assert_eq!(os.course_type, "Embedded Theory");
        assert_eq!(os.faculty, "ANANYA RAO");
        assert_eq!(os.slot, "A1+TA1");
        assert_eq!(os.components.len(), 3);
        assert_eq!(os.components[0].name, "CAT-1");
        assert_eq!(os.components[0].max_marks, 50.0);
        assert_eq!(os.components[0].scored_marks, 42.5);
        assert_eq!(os.components[1].remark, "Good");
        assert_eq!(os.weighted_total(), 21.75);

        let stats = &courses[1];
        assert_eq!(stats.course_code, "MAT2001");
        assert_eq!(stats.components.len(), 1);
        assert_eq!(stats.components[0].weightage, 5.0);
    }

    #[test]
    fn test_unparseable_numbers_default_to_zero() {
        let courses = parse_marks(MARKS_PAGE).records;
        let cat2 = &courses[0].components[2];
        assert_eq!(cat2.status, "Absent");
        assert_eq!(cat2.scored_marks, 0.0);
        assert_eq!(cat2.weighted_score, 0.0);
        assert_eq!(cat2.remark, "");
    }

    #[test]
    fn test_component_without_course_is_rejected() {
        let html = r#"<table>
            <tr><td>1</td><td>CAT-1</td><td>50</td><td>15</td><td>Present</td><td>40</td><td>12</td></tr>
        </table>"#;
        let extraction = parse_marks(html);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.rejected, 1);
    }

    #[test]
    fn test_header_without_class_number_column() {
        let html = r#"<table>
            <tr><td>1</td><td>BCSE302L</td><td>Database Systems</td><td>Theory Only</td>
                <td>RAVI KUMAR - SCOPE</td><td>B2+TB2</td><td>Regular</td><td>-</td></tr>
            <tr><td>1</td><td>CAT-1</td><td>50</td><td>15</td><td>Present</td><td>40</td><td>12</td></tr>
        </table>"#;
        let extraction = parse_marks(html);
        assert_eq!(extraction.rejected, 0);

        let course = &extraction.records[0];
        assert_eq!(course.course_code, "BCSE302L");
        assert_eq!(course.course_name, "Database Systems");
        assert_eq!(course.course_type, "Theory Only");
        assert_eq!(course.faculty, "RAVI KUMAR");
        assert_eq!(course.slot, "B2+TB2");
        assert_eq!(course.components.len(), 1);
        assert_eq!(course.components[0].scored_marks, 40.0);
    }
}
