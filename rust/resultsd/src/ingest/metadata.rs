use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::grid::{Cell, RawGrid};

/// Only the leading rows are scanned for school details.
pub const METADATA_SCAN_ROWS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
}

impl SchoolMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.session.is_none()
    }

    fn slot(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::Name => &mut self.name,
            MetadataField::Address => &mut self.address,
            MetadataField::Session => &mut self.session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetadataField {
    Name,
    Address,
    Session,
}

/// Text views of one leading row.
struct RowText<'a> {
    cells: &'a [Cell],
    /// Every cell lower-cased and space-joined.
    scan: String,
    /// Trimmed non-blank cells space-joined, original case.
    joined: String,
}

impl<'a> RowText<'a> {
    fn new(cells: &'a [Cell]) -> Self {
        let texts: Vec<String> = cells
            .iter()
            .map(Cell::trimmed)
            .filter(|s| !s.is_empty())
            .collect();
        let joined = texts.join(" ");
        Self {
            cells,
            scan: joined.to_lowercase(),
            joined,
        }
    }
}

struct MetadataRule {
    field: MetadataField,
    applies: fn(&RowText) -> bool,
    extract: fn(&RowText) -> Option<String>,
}

const NAME_KEYWORDS: &[&str] = &["school", "institute", "college", "university", "academy"];
const ADDRESS_TRIGGERS: &[&str] = &["address", "street", "road", "avenue", "city", "state"];
const ADDRESS_KEYWORDS: &[&str] = &["street", "road", "avenue", "city", "address", "location"];
const SESSION_KEYWORDS: &[&str] = &["session", "academic", "year"];

static SESSION_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}[/-]\d{4}").expect("session range regex"));
static SESSION_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b20\d{2}\b").expect("session year regex"));

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// First cell longer than `min_chars` (trimmed) whose lower-cased text
/// holds one of `keywords`.
fn first_cell_with(row: &RowText, min_chars: usize, keywords: &[&str]) -> Option<String> {
    row.cells
        .iter()
        .map(Cell::trimmed)
        .find(|t| t.chars().count() > min_chars && contains_any(&t.to_lowercase(), keywords))
}

fn name_applies(row: &RowText) -> bool {
    contains_any(&row.scan, NAME_KEYWORDS)
}

fn name_extract(row: &RowText) -> Option<String> {
    first_cell_with(row, 5, NAME_KEYWORDS)
}

fn address_applies(row: &RowText) -> bool {
    contains_any(&row.scan, ADDRESS_TRIGGERS)
}

fn address_extract(row: &RowText) -> Option<String> {
    first_cell_with(row, 10, ADDRESS_KEYWORDS)
}

fn session_applies(_row: &RowText) -> bool {
    true
}

fn session_extract(row: &RowText) -> Option<String> {
    if let Some(m) = SESSION_RANGE.find(&row.joined) {
        return Some(m.as_str().to_string());
    }
    if !contains_any(&row.scan, SESSION_KEYWORDS) {
        return None;
    }
    SESSION_YEAR
        .find(&row.joined)
        .map(|m| m.as_str().to_string())
}

/// Evaluated per row in this order; a field keeps its first match.
const RULES: &[MetadataRule] = &[
    MetadataRule {
        field: MetadataField::Name,
        applies: name_applies,
        extract: name_extract,
    },
    MetadataRule {
        field: MetadataField::Address,
        applies: address_applies,
        extract: address_extract,
    },
    MetadataRule {
        field: MetadataField::Session,
        applies: session_applies,
        extract: session_extract,
    },
];

/// Best-effort school details from the leading rows. Never fails; returns
/// `None` when nothing matched.
pub fn scan(grid: &RawGrid) -> Option<SchoolMetadata> {
    let mut meta = SchoolMetadata::default();
    for row in grid.rows.iter().take(METADATA_SCAN_ROWS) {
        let text = RowText::new(row);
        for rule in RULES {
            let slot = meta.slot(rule.field);
            if slot.is_some() || !(rule.applies)(&text) {
                continue;
            }
            if let Some(v) = (rule.extract)(&text) {
                *slot = Some(v);
            }
        }
    }
    if meta.is_empty() {
        None
    } else {
        Some(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_grid(rows: &[&[&str]]) -> RawGrid {
        RawGrid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
                .collect(),
        )
    }

    #[test]
    fn session_range_with_academic_keyword() {
        let m = scan(&row_grid(&[&["Academic Session 2023/2024"]])).expect("meta");
        assert_eq!(m.session.as_deref(), Some("2023/2024"));
    }

    #[test]
    fn session_range_with_dash() {
        let m = scan(&row_grid(&[&["Results", "2022-2023"]])).expect("meta");
        assert_eq!(m.session.as_deref(), Some("2022-2023"));
    }

    #[test]
    fn lone_year_needs_session_keyword() {
        assert!(scan(&row_grid(&[&["Report for 2024"]])).is_none());
        let m = scan(&row_grid(&[&["Report for 2024 school year"]])).expect("meta");
        assert_eq!(m.session.as_deref(), Some("2024"));
    }

    #[test]
    fn lone_year_must_start_with_20() {
        assert!(scan(&row_grid(&[&["Session 1999"]])).is_none());
    }

    #[test]
    fn name_is_first_keyword_cell_not_whole_row() {
        let m = scan(&row_grid(&[&[
            "Report",
            "Greenfield High School",
            "Other College",
        ]]))
        .expect("meta");
        assert_eq!(m.name.as_deref(), Some("Greenfield High School"));
    }

    #[test]
    fn first_match_wins_across_rows() {
        let m = scan(&row_grid(&[
            &["Hilltop Academy"],
            &["Riverside College"],
            &["12 Marina Road, Lagos"],
            &["Address: 3 Broad Street"],
        ]))
        .expect("meta");
        assert_eq!(m.name.as_deref(), Some("Hilltop Academy"));
        assert_eq!(m.address.as_deref(), Some("12 Marina Road, Lagos"));
        assert_eq!(m.session, None);
    }

    #[test]
    fn address_cell_must_exceed_ten_chars() {
        assert!(scan(&row_grid(&[&["Road 5"]])).is_none());
        let m = scan(&row_grid(&[&["State", "Location: Ibadan"]])).expect("meta");
        assert_eq!(m.address.as_deref(), Some("Location: Ibadan"));
    }

    #[test]
    fn rows_past_window_are_ignored() {
        let filler: &[&str] = &["x"];
        let mut rows = vec![filler; METADATA_SCAN_ROWS];
        rows.push(&["Late Entry Academy"]);
        assert!(scan(&row_grid(&rows)).is_none());
    }
}
