// Uploaded file -> RawGrid. Workbooks contribute their first sheet only.

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::grid::{Cell, RawGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadFormat {
    Delimited,
    Workbook,
}

#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub grid: RawGrid,
    pub format: UploadFormat,
    pub sha256: String,
    pub sheet_name: Option<String>,
}

pub fn format_for_path(path: &Path) -> Option<UploadFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;
    match ext.as_str() {
        "csv" | "tsv" | "txt" => Some(UploadFormat::Delimited),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(UploadFormat::Workbook),
        _ => None,
    }
}

pub fn read_grid(path: &Path) -> anyhow::Result<DecodedFile> {
    let format = format_for_path(path).ok_or_else(|| {
        anyhow!(
            "unsupported upload type: {} (expected .csv, .tsv, .txt, .xlsx, .xls, .xlsb or .ods)",
            path.to_string_lossy()
        )
    })?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read upload {}", path.to_string_lossy()))?;
    let sha256 = sha256_hex(&bytes);

    let (mut grid, sheet_name) = match format {
        UploadFormat::Delimited => {
            let text = bytes_to_utf8(bytes);
            (grid_from_delimited(&text)?, None)
        }
        UploadFormat::Workbook => {
            let (grid, name) = grid_from_workbook(path)?;
            (grid, Some(name))
        }
    };
    grid.trim_trailing_blanks();

    Ok(DecodedFile {
        grid,
        format,
        sha256,
        sheet_name,
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// UTF-8, falling back to Windows-1252 (common for Excel-exported CSVs).
fn bytes_to_utf8(bytes: Vec<u8>) -> String {
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes[3..].to_vec()
    } else {
        bytes
    };
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Pick the delimiter whose field count is most consistent across the
/// first lines; ties go to the wider split.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0u64;
    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let widest = counts.iter().copied().max().unwrap_or(0);
        if widest <= 1 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == widest).count() as u64;
        let score = consistent * widest as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

pub fn grid_from_delimited(content: &str) -> anyhow::Result<RawGrid> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed delimited row {}", line + 1))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(RawGrid::new(rows))
}

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}

fn grid_from_workbook(path: &Path) -> anyhow::Result<(RawGrid, String)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        anyhow!(
            "failed to open workbook {}: {}",
            path.to_string_lossy(),
            e
        )
    })?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook contains no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| anyhow!("failed to read sheet '{}': {}", sheet_name, e))?;

    // Keep sheet coordinates: data may not begin at A1.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    Ok((RawGrid::new(rows), sheet_name))
}
