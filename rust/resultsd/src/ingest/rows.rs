use indexmap::IndexMap;

use super::{ColumnLayout, StudentRecord};
use crate::calc::{round_2_decimals, GradeScale};
use crate::grid::{Cell, RawGrid};

const MIN_NAME_CHARS: usize = 2;

fn optional_text(grid: &RawGrid, row: usize, col: Option<usize>) -> Option<String> {
    let cell = grid.cell(row, col?)?;
    let t = cell.trimmed();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

/// One record per data row below the header that has a usable name and at
/// least one non-negative score. Rows failing either test are skipped.
pub fn extract(grid: &RawGrid, layout: &ColumnLayout) -> Vec<StudentRecord> {
    let mut out: Vec<StudentRecord> = Vec::new();

    for row in (layout.header_row + 1)..grid.len() {
        let name = grid
            .cell(row, layout.name)
            .map(Cell::trimmed)
            .unwrap_or_default();
        if name.chars().count() < MIN_NAME_CHARS {
            tracing::debug!(row, "skipping row without a student name");
            continue;
        }

        let mut subjects: IndexMap<String, f64> = IndexMap::new();
        for col in &layout.subjects {
            let Some(v) = grid.cell(row, col.index).and_then(Cell::number) else {
                continue;
            };
            if v >= 0.0 {
                subjects.insert(col.key.clone(), v);
            }
        }
        if subjects.is_empty() {
            tracing::debug!(row, name = %name, "skipping row without numeric scores");
            continue;
        }

        let total_marks: f64 = subjects.values().sum();
        let average_score = round_2_decimals(total_marks / subjects.len() as f64);

        out.push(StudentRecord {
            id: format!("student-{}", out.len() + 1),
            name,
            class: optional_text(grid, row, layout.class).unwrap_or_default(),
            serial_number: optional_text(grid, row, layout.serial),
            reg_number: optional_text(grid, row, layout.registration),
            email: optional_text(grid, row, layout.email),
            subjects,
            total_marks,
            average_score,
            grade: GradeScale::Ingest.grade_for(average_score),
        });
    }

    out
}
