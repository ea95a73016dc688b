use serde::{Deserialize, Serialize};

use crate::score::{aggregate, clamp_score, Aggregate, AssessmentColumn, GradeScale, Mark};

/// One student's live marklist entry: raw marks plus remarks, with the
/// derived aggregate carried alongside. The derived fields are a cache of
/// `score::aggregate` over the raw marks and are rebuilt on every edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryState {
    pub student_id: String,
    pub remarks: String,
    pub marks: Vec<Mark>,
    pub derived: Aggregate,
}

impl EntryState {
    /// The implicit empty entry created the first time a student row is
    /// viewed: no marks, required columns zero-filled in the aggregate.
    pub fn new(student_id: &str, columns: &[AssessmentColumn], scale: GradeScale) -> EntryState {
        EntryState {
            student_id: student_id.to_string(),
            remarks: String::new(),
            marks: Vec::new(),
            derived: aggregate(columns, &[], scale),
        }
    }

    pub fn from_parts(
        student_id: &str,
        remarks: &str,
        marks: Vec<Mark>,
        columns: &[AssessmentColumn],
        scale: GradeScale,
    ) -> EntryState {
        let derived = aggregate(columns, &marks, scale);
        EntryState {
            student_id: student_id.to_string(),
            remarks: remarks.to_string(),
            marks,
            derived,
        }
    }
}

/// An edit coming in from a marklist grid keystroke or a remarks box.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryEvent {
    SetScore { column_id: String, score: f64 },
    ClearScore { column_id: String },
    SetRemarks { remarks: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub state: EntryState,
    /// True when the stored score differs from the requested one, either
    /// clamped into range or coerced from a non-finite value. Callers can
    /// surface this as a non-blocking warning; it is never an error.
    pub adjusted: bool,
}

/// Pure reducer: `(prior state, event) -> new state`, recomputing the
/// aggregate inside. An edit naming an unknown column leaves the marks
/// untouched.
pub fn apply(
    prior: &EntryState,
    columns: &[AssessmentColumn],
    scale: GradeScale,
    event: &EntryEvent,
) -> EditOutcome {
    let mut remarks = prior.remarks.clone();
    let mut marks = prior.marks.clone();
    let mut adjusted = false;

    match event {
        EntryEvent::SetScore { column_id, score } => {
            if let Some(col) = columns.iter().find(|c| c.id == *column_id) {
                let applied = clamp_score(*score, col.max_marks);
                // NaN input compares unequal to the coerced 0, so it is
                // reported as adjusted too.
                adjusted = applied != *score;
                match marks.iter_mut().find(|m| m.column_id == *column_id) {
                    Some(existing) => existing.score = applied,
                    None => marks.push(Mark {
                        column_id: column_id.clone(),
                        score: applied,
                    }),
                }
            }
        }
        EntryEvent::ClearScore { column_id } => {
            marks.retain(|m| m.column_id != *column_id);
        }
        EntryEvent::SetRemarks { remarks: text } => {
            remarks = text.clone();
        }
    }

    let derived = aggregate(columns, &marks, scale);
    EditOutcome {
        state: EntryState {
            student_id: prior.student_id.clone(),
            remarks,
            marks,
            derived,
        },
        adjusted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Grade;

    fn columns() -> Vec<AssessmentColumn> {
        vec![
            AssessmentColumn {
                id: "c1".into(),
                title: "Quiz 1".into(),
                max_marks: 20.0,
                order: 0,
                is_optional: false,
            },
            AssessmentColumn {
                id: "c2".into(),
                title: "Project".into(),
                max_marks: 50.0,
                order: 1,
                is_optional: false,
            },
            AssessmentColumn {
                id: "c3".into(),
                title: "Bonus".into(),
                max_marks: 30.0,
                order: 2,
                is_optional: true,
            },
        ]
    }

    #[test]
    fn new_entry_zero_fills_required_columns() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        assert!(e.marks.is_empty());
        assert_eq!(e.derived.total, 0.0);
        assert_eq!(e.derived.max_total, 70.0);
        assert_eq!(e.derived.grade, Grade::F);
    }

    #[test]
    fn set_score_recomputes_aggregate() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let e = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: 18.0,
            },
        );
        assert!(!e.adjusted);
        let e = apply(
            &e.state,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c2".into(),
                score: 40.0,
            },
        );
        assert_eq!(e.state.derived.total, 58.0);
        assert_eq!(e.state.derived.max_total, 70.0);
        assert_eq!(e.state.derived.percentage, 82.9);
        assert_eq!(e.state.derived.grade, Grade::A);
    }

    #[test]
    fn set_score_overwrites_existing_mark() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let e = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: 5.0,
            },
        );
        let e = apply(
            &e.state,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: 12.0,
            },
        );
        assert_eq!(e.state.marks.len(), 1);
        assert_eq!(e.state.derived.total, 12.0);
    }

    #[test]
    fn out_of_range_score_is_clamped_and_flagged() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let e = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: 70.0,
            },
        );
        assert!(e.adjusted);
        assert_eq!(e.state.marks[0].score, 20.0);

        let e = apply(
            &e.state,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: -3.0,
            },
        );
        assert!(e.adjusted);
        assert_eq!(e.state.marks[0].score, 0.0);

        let e = apply(
            &e.state,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c1".into(),
                score: f64::NAN,
            },
        );
        assert!(e.adjusted);
        assert_eq!(e.state.marks[0].score, 0.0);
    }

    #[test]
    fn clear_score_removes_mark_record() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        // Mark the optional column with 0: it now counts in the denominator.
        let e = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "c3".into(),
                score: 0.0,
            },
        );
        assert_eq!(e.state.derived.max_total, 100.0);

        // Clearing it excludes it again.
        let e = apply(
            &e.state,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::ClearScore {
                column_id: "c3".into(),
            },
        );
        assert!(e.state.marks.is_empty());
        assert_eq!(e.state.derived.max_total, 70.0);
    }

    #[test]
    fn unknown_column_edit_is_a_no_op() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let out = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetScore {
                column_id: "nope".into(),
                score: 10.0,
            },
        );
        assert!(!out.adjusted);
        assert_eq!(out.state, e);
    }

    #[test]
    fn set_remarks_leaves_marks_alone() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let e = apply(
            &e,
            &cols,
            GradeScale::SevenTier,
            &EntryEvent::SetRemarks {
                remarks: "needs the bonus task".into(),
            },
        );
        assert_eq!(e.state.remarks, "needs the bonus task");
        assert!(e.state.marks.is_empty());
    }

    #[test]
    fn reducer_is_deterministic() {
        let cols = columns();
        let e = EntryState::new("stu-1", &cols, GradeScale::SevenTier);
        let ev = EntryEvent::SetScore {
            column_id: "c2".into(),
            score: 33.0,
        };
        let a = apply(&e, &cols, GradeScale::SevenTier, &ev);
        let b = apply(&e, &cols, GradeScale::SevenTier, &ev);
        assert_eq!(a, b);
    }
}
