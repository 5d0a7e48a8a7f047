//! Spreadsheet-to-roster inference.
//!
//! A parse runs three passes over one in-memory [`RawGrid`]:
//! metadata scan of the leading rows, header row and column role
//! detection, then row extraction with grading. It is all-or-nothing:
//! either every pass succeeds or an [`IngestError`] is returned.

pub mod columns;
pub mod metadata;
pub mod rows;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calc::Grade;
use crate::grid::RawGrid;

pub use columns::ColumnLayout;
pub use metadata::SchoolMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("the sheet needs a header row and at least one data row (found {rows} row(s))")]
    InsufficientRows { rows: usize },

    #[error("no student name column found in header row {header_row}")]
    NoNameColumn { header_row: usize },

    #[error("no subject columns with numeric scores found below header row {header_row}")]
    NoSubjectColumns { header_row: usize },

    #[error("none of the {scanned} data row(s) had a student name and a numeric score")]
    NoValidRecords { scanned: usize },
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InsufficientRows { .. } => "insufficient_rows",
            IngestError::NoNameColumn { .. } => "no_name_column",
            IngestError::NoSubjectColumns { .. } => "no_subject_columns",
            IngestError::NoValidRecords { .. } => "no_valid_records",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub reg_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Subject header -> score, in column order.
    pub subjects: IndexMap<String, f64>,
    pub total_marks: f64,
    pub average_score: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedUpload {
    pub students: Vec<StudentRecord>,
    pub school_info: Option<SchoolMetadata>,
    pub layout: ColumnLayout,
}

pub fn parse(grid: &RawGrid) -> Result<ParsedUpload, IngestError> {
    if grid.len() < 2 {
        return Err(IngestError::InsufficientRows { rows: grid.len() });
    }

    let school_info = metadata::scan(grid);

    let header_row = columns::find_header_row(grid);
    let layout = columns::classify(grid, header_row)?;
    tracing::debug!(
        header_row,
        subjects = layout.subjects.len(),
        "column roles classified"
    );

    let students = rows::extract(grid, &layout);
    if students.is_empty() {
        return Err(IngestError::NoValidRecords {
            scanned: grid.len().saturating_sub(header_row + 1),
        });
    }

    Ok(ParsedUpload {
        students,
        school_info,
        layout,
    })
}
