use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::IngestError;
use crate::grid::{Cell, RawGrid};

/// Rows below the header sampled when deciding whether a column holds scores.
pub const SUBJECT_SAMPLE_ROWS: usize = 5;
/// Minimum share of numeric cells in the sample for a subject column.
pub const SUBJECT_NUMERIC_RATIO: f64 = 0.5;

const SUBJECT_SKIP_LIST: &[&str] = &[
    "total",
    "average",
    "percentage",
    "rank",
    "position",
    "remarks",
    "attendance",
    "s/n",
    "sn",
    "serial",
    "reg",
    "registration",
    "regno",
];

static HEADER_SUBJECT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"math|english|science|subject|marks|score").expect("subject hint regex")
});
static NAME_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"name|student|^names$|^full name$").expect("name header regex")
});
static CLASS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class|grade|level|section").expect("class header regex"));
static SERIAL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"s/n|sn|serial|^s\.n$|^no$").expect("serial header regex"));
static REG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"reg|registration|regno|reg no|reg\.no").expect("reg header regex")
});
static EMAIL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"e-?mail").expect("email header regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
    Name,
    Class,
    Serial,
    Registration,
    Email,
    Subject,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub index: usize,
    pub header: String,
    pub role: ColumnRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectColumn {
    pub index: usize,
    /// Key used in `StudentRecord::subjects`; unique within one parse.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    pub header_row: usize,
    pub columns: Vec<ColumnInfo>,
    #[serde(skip)]
    pub name: usize,
    #[serde(skip)]
    pub class: Option<usize>,
    #[serde(skip)]
    pub serial: Option<usize>,
    #[serde(skip)]
    pub registration: Option<usize>,
    #[serde(skip)]
    pub email: Option<usize>,
    pub subjects: Vec<SubjectColumn>,
}

impl ColumnLayout {
    pub fn subject_keys(&self) -> Vec<String> {
        self.subjects.iter().map(|s| s.key.clone()).collect()
    }
}

/// First row that mentions "name" and either a subject-like word or has
/// more than three cells. Falls back to row 0.
pub fn find_header_row(grid: &RawGrid) -> usize {
    grid.rows
        .iter()
        .position(|row| {
            let lowered: Vec<String> = row.iter().map(Cell::lowered).collect();
            let has_name = lowered.iter().any(|c| c.contains("name"));
            let has_subject_hint = lowered.iter().any(|c| HEADER_SUBJECT_HINT.is_match(c));
            has_name && (has_subject_hint || row.len() > 3)
        })
        .unwrap_or(0)
}

fn first_match(headers: &[String], pattern: &Regex, taken: &HashSet<usize>) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .find(|(i, h)| !taken.contains(i) && pattern.is_match(h))
        .map(|(i, _)| i)
}

fn numeric_share_ok(grid: &RawGrid, header_row: usize, col: usize) -> bool {
    let mut sampled = 0usize;
    let mut numeric = 0usize;
    for row in (header_row + 1)..grid.len().min(header_row + 1 + SUBJECT_SAMPLE_ROWS) {
        sampled += 1;
        if grid.cell(row, col).and_then(Cell::number).is_some() {
            numeric += 1;
        }
    }
    sampled > 0 && (numeric as f64) / (sampled as f64) >= SUBJECT_NUMERIC_RATIO
}

fn unique_key(header: &str, used: &mut HashSet<String>) -> String {
    let mut key = header.to_string();
    let mut n = 2;
    while used.contains(&key) {
        key = format!("{} ({})", header, n);
        n += 1;
    }
    used.insert(key.clone());
    key
}

/// Assign a role to every column of the header row.
pub fn classify(grid: &RawGrid, header_row: usize) -> Result<ColumnLayout, IngestError> {
    let header_cells = grid.row(header_row);
    let headers: Vec<String> = header_cells.iter().map(Cell::lowered).collect();

    let mut taken: HashSet<usize> = HashSet::new();
    let name = first_match(&headers, &NAME_HEADER, &taken)
        .ok_or(IngestError::NoNameColumn { header_row })?;
    taken.insert(name);

    // Roles are picked in this order and a column holds one role only, so a
    // later role takes its first match among the columns still free.
    let mut pick = |pattern: &Regex| {
        let found = first_match(&headers, pattern, &taken);
        if let Some(i) = found {
            taken.insert(i);
        }
        found
    };
    let class = pick(&CLASS_HEADER);
    let serial = pick(&SERIAL_HEADER);
    let registration = pick(&REG_HEADER);
    let email = pick(&EMAIL_HEADER);

    let mut used_keys: HashSet<String> = HashSet::new();
    let mut subjects: Vec<SubjectColumn> = Vec::new();
    let mut columns: Vec<ColumnInfo> = Vec::with_capacity(headers.len());
    for (index, lowered) in headers.iter().enumerate() {
        let header = header_cells[index].trimmed();
        let role = if index == name {
            ColumnRole::Name
        } else if Some(index) == class {
            ColumnRole::Class
        } else if Some(index) == serial {
            ColumnRole::Serial
        } else if Some(index) == registration {
            ColumnRole::Registration
        } else if Some(index) == email {
            ColumnRole::Email
        } else if !lowered.is_empty()
            && !SUBJECT_SKIP_LIST.iter().any(|s| lowered.contains(s))
            && numeric_share_ok(grid, header_row, index)
        {
            subjects.push(SubjectColumn {
                index,
                key: unique_key(&header, &mut used_keys),
            });
            ColumnRole::Subject
        } else {
            ColumnRole::Ignored
        };
        columns.push(ColumnInfo {
            index,
            header,
            role,
        });
    }

    if subjects.is_empty() {
        return Err(IngestError::NoSubjectColumns { header_row });
    }

    Ok(ColumnLayout {
        header_row,
        columns,
        name,
        class,
        serial,
        registration,
        email,
        subjects,
    })
}
