use serde::{Deserialize, Serialize};

/// One untyped spreadsheet cell as decoded from a workbook or delimited file.
///
/// JSON form is untagged: `null`, `true`, `80`, `"Ade"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display text. Whole numbers render without a fractional part.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    pub fn trimmed(&self) -> String {
        self.text().trim().to_string()
    }

    pub fn lowered(&self) -> String {
        self.trimmed().to_lowercase()
    }

    /// Lenient numeric read: finite numbers as-is, text by its leading
    /// decimal literal (`"85%"` reads as 85).
    pub fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_leading_f64(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

fn parse_leading_f64(s: &str) -> Option<f64> {
    let t = s.trim();
    let bytes = t.as_bytes();
    let mut end = 0usize;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        // A bare "e" is trailing text, not an exponent.
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    t[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decoded, uninterpreted 2-D table. Rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawGrid {
    pub rows: Vec<Vec<Cell>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, idx: usize) -> &[Cell] {
        self.rows.get(idx).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// `None` when the row is shorter than `col` (absent cell).
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Drop trailing blank cells per row and trailing blank rows.
    pub fn trim_trailing_blanks(&mut self) {
        for row in &mut self.rows {
            while row.last().map(|c| c.is_blank()).unwrap_or(false) {
                row.pop();
            }
        }
        while self.rows.last().map(|r| r.is_empty()).unwrap_or(false) {
            self.rows.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(80.0).text(), "80");
        assert_eq!(Cell::Number(72.5).text(), "72.5");
        assert_eq!(Cell::Empty.text(), "");
    }

    #[test]
    fn number_reads_leading_literal() {
        assert_eq!(Cell::from("85").number(), Some(85.0));
        assert_eq!(Cell::from(" 85.5 ").number(), Some(85.5));
        assert_eq!(Cell::from("85%").number(), Some(85.0));
        assert_eq!(Cell::from(".5").number(), Some(0.5));
        assert_eq!(Cell::from("-3").number(), Some(-3.0));
        assert_eq!(Cell::from("abs").number(), None);
        assert_eq!(Cell::from("").number(), None);
        assert_eq!(Cell::from("-").number(), None);
        assert_eq!(Cell::Bool(true).number(), None);
        assert_eq!(Cell::Number(f64::NAN).number(), None);
    }

    #[test]
    fn number_reads_exponent_suffix() {
        assert_eq!(Cell::from("8.5e1").number(), Some(85.0));
        assert_eq!(Cell::from("1E+2").number(), Some(100.0));
        assert_eq!(Cell::from("750e-1 pts").number(), Some(75.0));
        assert_eq!(Cell::from("85e").number(), Some(85.0));
        assert_eq!(Cell::from("85e+").number(), Some(85.0));
        assert_eq!(Cell::from("e5").number(), None);
    }

    #[test]
    fn grid_json_is_untagged() {
        let g: RawGrid = serde_json::from_str(r#"[["Name", 80, null, true]]"#).expect("grid");
        assert_eq!(
            g.row(0),
            &[
                Cell::from("Name"),
                Cell::Number(80.0),
                Cell::Empty,
                Cell::Bool(true)
            ]
        );
    }

    #[test]
    fn trim_trailing_blanks_keeps_inner_gaps() {
        let mut g = RawGrid::new(vec![
            vec![Cell::from("a"), Cell::Empty, Cell::from("b"), Cell::from(" ")],
            vec![Cell::Empty],
        ]);
        g.trim_trailing_blanks();
        assert_eq!(g.len(), 1);
        assert_eq!(g.row(0).len(), 3);
    }
}
