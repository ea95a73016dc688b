use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One gradable component of an assessment ("Quiz 1", out of 20).
///
/// `order` drives display sequence only; it never affects computation.
/// An optional column is excluded from both numerator and denominator
/// while the student has no recorded mark for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentColumn {
    pub id: String,
    pub title: String,
    pub max_marks: f64,
    pub order: i64,
    pub is_optional: bool,
}

/// A recorded raw score against one column. Presence of the record matters:
/// a `Mark` with score 0 is not the same as no mark at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub column_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which letter-grade table a configuration uses.
///
/// The seven-tier table is the canonical one; the five-tier table drops the
/// E band (everything below 50% is F) for configurations that grade
/// pass/fail-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradeScale {
    #[default]
    #[serde(rename = "sevenTier")]
    SevenTier,
    #[serde(rename = "fiveTier")]
    FiveTier,
}

impl GradeScale {
    pub fn parse(s: &str) -> Option<GradeScale> {
        match s {
            "sevenTier" => Some(GradeScale::SevenTier),
            "fiveTier" => Some(GradeScale::FiveTier),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeScale::SevenTier => "sevenTier",
            GradeScale::FiveTier => "fiveTier",
        }
    }

    /// Inclusive lower bounds, first match wins. NaN and negative values
    /// fail every threshold and land on F.
    pub fn grade_for(&self, percentage: f64) -> Grade {
        match self {
            GradeScale::SevenTier => {
                if percentage >= 90.0 {
                    Grade::APlus
                } else if percentage >= 80.0 {
                    Grade::A
                } else if percentage >= 70.0 {
                    Grade::B
                } else if percentage >= 60.0 {
                    Grade::C
                } else if percentage >= 50.0 {
                    Grade::D
                } else if percentage >= 40.0 {
                    Grade::E
                } else {
                    Grade::F
                }
            }
            GradeScale::FiveTier => {
                if percentage >= 90.0 {
                    Grade::APlus
                } else if percentage >= 80.0 {
                    Grade::A
                } else if percentage >= 70.0 {
                    Grade::B
                } else if percentage >= 60.0 {
                    Grade::C
                } else if percentage >= 50.0 {
                    Grade::D
                } else {
                    Grade::F
                }
            }
        }
    }
}

/// Derived, display-ready result of aggregating one student's marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Sum of clamped scores over applicable columns, 2 decimals.
    pub total: f64,
    /// Sum of `max_marks` over applicable columns.
    pub max_total: f64,
    /// `total / max_total * 100`, clamped into [0, 100], 1 decimal.
    pub percentage: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub percentage: f64,
    pub grade: Grade,
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Coerce a raw score into the valid range for a column.
/// Non-finite input counts as 0; out-of-range input is clamped, not rejected.
pub fn clamp_score(score: f64, max_marks: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, max_marks.max(0.0))
}

/// Aggregate a student's marks over a column configuration.
///
/// Required columns always count: an absent mark contributes 0 to the total
/// while the column's max still counts against the student. Optional columns
/// count only when a mark record exists, even one with score 0. Duplicate
/// marks for a column resolve last-write-wins.
///
/// Pure and deterministic; identical input always yields identical output.
pub fn aggregate(columns: &[AssessmentColumn], marks: &[Mark], scale: GradeScale) -> Aggregate {
    let mut by_column: HashMap<&str, f64> = HashMap::new();
    for m in marks {
        by_column.insert(m.column_id.as_str(), m.score);
    }

    let mut total = 0.0_f64;
    let mut max_total = 0.0_f64;
    for col in columns {
        match by_column.get(col.id.as_str()) {
            Some(&raw) => {
                total += clamp_score(raw, col.max_marks);
                max_total += col.max_marks;
            }
            None => {
                if !col.is_optional {
                    max_total += col.max_marks;
                }
            }
        }
    }

    let percentage = if max_total > 0.0 {
        (100.0 * total / max_total).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Aggregate {
        total: round2(total),
        max_total,
        // Grade is taken from the unrounded percentage so a re-aggregation
        // near a threshold cannot disagree with the displayed letter.
        percentage: round1(percentage),
        grade: scale.grade_for(percentage),
    }
}

/// Fixed single-score variant: one mark against one declared maximum.
/// `None` means the student is not yet graded, which is distinct from a
/// genuine 0; callers render it as "-".
pub fn simple_grade(score: Option<f64>, total_marks: f64, scale: GradeScale) -> Option<ExamResult> {
    let raw = score?;
    let clamped = clamp_score(raw, total_marks);
    let percentage = if total_marks > 0.0 {
        (100.0 * clamped / total_marks).clamp(0.0, 100.0)
    } else {
        0.0
    };
    Some(ExamResult {
        percentage: round1(percentage),
        grade: scale.grade_for(percentage),
    })
}

/// Marked/unmarked state of one student against one column, as seen by the
/// class-summary report. A recorded 0 is `Marked(0.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkState {
    Unmarked,
    Marked(f64),
}

/// Class-level mean for a single column. Unmarked students stay out of the
/// denominator so an untouched column does not drag the class to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAverage {
    pub avg_raw: f64,
    pub avg_percent: f64,
    pub marked_count: usize,
    pub unmarked_count: usize,
}

pub fn column_average<I>(states: I, max_marks: f64) -> ColumnAverage
where
    I: IntoIterator<Item = MarkState>,
{
    let mut sum = 0.0_f64;
    let mut marked_count = 0_usize;
    let mut unmarked_count = 0_usize;

    for s in states {
        match s {
            MarkState::Unmarked => unmarked_count += 1,
            MarkState::Marked(v) => {
                marked_count += 1;
                sum += clamp_score(v, max_marks);
            }
        }
    }

    let avg_raw = if marked_count > 0 {
        sum / marked_count as f64
    } else {
        0.0
    };
    let avg_percent = if max_marks > 0.0 {
        100.0 * avg_raw / max_marks
    } else {
        0.0
    };

    ColumnAverage {
        avg_raw: round2(avg_raw),
        avg_percent: round1(avg_percent),
        marked_count,
        unmarked_count,
    }
}
