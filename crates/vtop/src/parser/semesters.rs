use super::{normalize_ws, Extraction};
use crate::types::Semester;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static SEMESTER_OPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"select#semesterSubId option, select[name="semesterSubId"] option"#).unwrap()
});

/// Campus tags appended to semester names.
const NAME_SUFFIXES: &[&str] = &[" - VLR", " - CHN", " - AP", " - BPL"];

/// Parses the semester `<select>` into semesters, in server order.
pub fn parse_semesters(html: &str) -> Extraction<Semester> {
    let document = Html::parse_document(html);
    let mut semesters: Vec<Semester> = Vec::new();

    for option in document.select(&SEMESTER_OPTION_SELECTOR) {
        let id = option.value().attr("value").unwrap_or_default().trim();
        let label = normalize_ws(&option.text().collect::<String>());
        if is_placeholder(id, &label) {
            continue;
        }
        // Both selectors can match the same element
        if semesters.iter().any(|s| s.id == id) {
            continue;
        }
        semesters.push(Semester {
            id: id.to_string(),
            display_name: strip_suffixes(&label),
        });
    }

    Extraction::new(semesters, 0)
}

fn is_placeholder(id: &str, label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    id.is_empty()
        || id == "0"
        || label.starts_with('-')
        || lower.starts_with("choose")
        || lower.starts_with("select")
}

fn strip_suffixes(label: &str) -> String {
    let mut name = label.trim();
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end();
        }
    }
    name.to_string()
}
