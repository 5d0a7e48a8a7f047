use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::ingest::StudentRecord;

pub const DEFAULT_MAX_SCORE_PER_SUBJECT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

/// Two letter-grade scales coexist: uploads are graded on `Ingest`
/// (no E band) while statements and certificates use `Report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeScale {
    Ingest,
    Report,
}

const INGEST_BREAKPOINTS: &[(f64, Grade)] = &[
    (80.0, Grade::A),
    (70.0, Grade::B),
    (60.0, Grade::C),
    (50.0, Grade::D),
];

const REPORT_BREAKPOINTS: &[(f64, Grade)] = &[
    (80.0, Grade::A),
    (70.0, Grade::B),
    (60.0, Grade::C),
    (50.0, Grade::D),
    (40.0, Grade::E),
];

impl GradeScale {
    fn breakpoints(self) -> &'static [(f64, Grade)] {
        match self {
            GradeScale::Ingest => INGEST_BREAKPOINTS,
            GradeScale::Report => REPORT_BREAKPOINTS,
        }
    }

    pub fn grade_for(self, average: f64) -> Grade {
        self.breakpoints()
            .iter()
            .find(|(min, _)| average >= *min)
            .map(|(_, g)| *g)
            .unwrap_or(Grade::F)
    }
}

/// Half-away-from-zero rounding to 2 decimals.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Competition ranking ("1224"): ties share the best rank and the next
/// distinct value skips by the tie-group size. Missing values get no rank.
pub fn competition_ranks(values: &[Option<f64>]) -> Vec<Option<usize>> {
    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            let better = values
                .iter()
                .filter(|o| matches!(o, Some(x) if *x > v))
                .count();
            Some(better + 1)
        })
        .collect()
}

pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundPercentage {
    pub value: f64,
    pub source: &'static str,
}

struct PercentageAccessor {
    name: &'static str,
    get: fn(&Value) -> Option<f64>,
}

fn numberish(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

fn field_percentage(r: &Value) -> Option<f64> {
    numberish(r.get("percentage"))
}

fn field_percent(r: &Value) -> Option<f64> {
    numberish(r.get("percent"))
}

fn field_average_score(r: &Value) -> Option<f64> {
    numberish(r.get("averageScore"))
}

fn field_average(r: &Value) -> Option<f64> {
    numberish(r.get("average"))
}

fn field_score(r: &Value) -> Option<f64> {
    numberish(r.get("score"))
}

// Try-order matters: the first accessor that yields a value wins.
const PERCENTAGE_ACCESSORS: &[PercentageAccessor] = &[
    PercentageAccessor {
        name: "percentage",
        get: field_percentage,
    },
    PercentageAccessor {
        name: "percent",
        get: field_percent,
    },
    PercentageAccessor {
        name: "averageScore",
        get: field_average_score,
    },
    PercentageAccessor {
        name: "average",
        get: field_average,
    },
    PercentageAccessor {
        name: "score",
        get: field_score,
    },
];

/// Pull a percentage-like value out of a loosely-typed record. Falls back
/// to `totalMarks / (subjects * max_per_subject) * 100`.
pub fn find_percentage(record: &Value, max_per_subject: f64) -> Option<FoundPercentage> {
    for acc in PERCENTAGE_ACCESSORS {
        if let Some(value) = (acc.get)(record) {
            return Some(FoundPercentage {
                value,
                source: acc.name,
            });
        }
    }

    let total = numberish(record.get("totalMarks"))?;
    let subject_count = record
        .get("subjects")
        .and_then(|s| s.as_object())
        .map(|o| o.len())
        .unwrap_or(0);
    if subject_count == 0 || max_per_subject <= 0.0 {
        return None;
    }
    Some(FoundPercentage {
        value: round_2_decimals(100.0 * total / (subject_count as f64 * max_per_subject)),
        source: "totalMarks/maxScore",
    })
}

pub fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: String,
    pub scored_count: usize,
    pub missing_count: usize,
    pub average: f64,
    pub median: f64,
    pub highest: f64,
    pub lowest: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub student_count: usize,
    pub class_average: f64,
    pub per_subject: Vec<SubjectStats>,
    pub grade_distribution: IndexMap<Grade, usize>,
}

/// `subjects` is the column-ordered list of subject headers for the upload.
pub fn class_summary(students: &[StudentRecord], subjects: &[String]) -> ClassSummary {
    let per_subject = subjects
        .iter()
        .map(|subject| {
            let values: Vec<f64> = students
                .iter()
                .filter_map(|s| s.subjects.get(subject).copied())
                .collect();
            let (average, highest, lowest) = if values.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                let sum: f64 = values.iter().sum();
                (
                    round_2_decimals(sum / values.len() as f64),
                    values.iter().copied().fold(f64::MIN, f64::max),
                    values.iter().copied().fold(f64::MAX, f64::min),
                )
            };
            SubjectStats {
                subject: subject.clone(),
                scored_count: values.len(),
                missing_count: students.len() - values.len(),
                average,
                median: compute_median(&values),
                highest,
                lowest,
            }
        })
        .collect();

    let class_average = if students.is_empty() {
        0.0
    } else {
        round_2_decimals(
            students.iter().map(|s| s.average_score).sum::<f64>() / students.len() as f64,
        )
    };

    let mut grade_distribution: IndexMap<Grade, usize> = [
        Grade::A,
        Grade::B,
        Grade::C,
        Grade::D,
        Grade::F,
    ]
    .into_iter()
    .map(|g| (g, 0))
    .collect();
    for s in students {
        *grade_distribution.entry(s.grade).or_insert(0) += 1;
    }

    ClassSummary {
        student_count: students.len(),
        class_average,
        per_subject,
        grade_distribution,
    }
}
