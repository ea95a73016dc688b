use serde_json::json;

use super::require_str;
use crate::entry::EntryState;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::score::{column_average, round1, simple_grade, MarkState};
use crate::store::{ConfigRecord, ExamRecord};

/// Report-card row for a multi-column marklist: the per-column breakdown
/// with inclusion flags, plus the derived aggregate.
fn marklist_card(cfg: &ConfigRecord, student_id: &str) -> serde_json::Value {
    let columns = cfg.ordered_columns();
    let state = match cfg.entries.get(student_id) {
        Some(rec) => EntryState::from_parts(
            student_id,
            &rec.remarks,
            rec.marks.clone(),
            &columns,
            cfg.grade_scale,
        ),
        None => EntryState::new(student_id, &columns, cfg.grade_scale),
    };

    let breakdown: Vec<serde_json::Value> = columns
        .iter()
        .map(|col| {
            let mark = state.marks.iter().find(|m| m.column_id == col.id);
            let included = mark.is_some() || !col.is_optional;
            json!({
                "columnId": col.id,
                "title": col.title,
                "maxMarks": col.max_marks,
                "isOptional": col.is_optional,
                "score": mark.map(|m| m.score),
                "included": included,
            })
        })
        .collect();

    json!({
        "kind": "marklist",
        "configId": cfg.id,
        "classId": cfg.class_id,
        "subject": cfg.subject,
        "title": cfg.title,
        "studentId": student_id,
        "remarks": state.remarks,
        "columns": breakdown,
        "total": state.derived.total,
        "maxTotal": state.derived.max_total,
        "percentage": state.derived.percentage,
        "grade": state.derived.grade.as_str(),
    })
}

/// Report-card row for a single-exam marklist. An ungraded student renders
/// as "-", never as an F.
fn exam_card(exam: &ExamRecord, student_id: &str) -> serde_json::Value {
    let score = exam.scores.get(student_id).copied();
    match simple_grade(score, exam.total_marks, exam.grade_scale) {
        Some(r) => json!({
            "kind": "exam",
            "examId": exam.id,
            "classId": exam.class_id,
            "subject": exam.subject,
            "title": exam.title,
            "studentId": student_id,
            "score": score,
            "totalMarks": exam.total_marks,
            "percentage": r.percentage,
            "grade": r.grade.as_str(),
            "display": format!("{}% ({})", r.percentage, r.grade),
        }),
        None => json!({
            "kind": "exam",
            "examId": exam.id,
            "classId": exam.class_id,
            "subject": exam.subject,
            "title": exam.title,
            "studentId": student_id,
            "score": null,
            "totalMarks": exam.total_marks,
            "percentage": null,
            "grade": null,
            "display": "-",
        }),
    }
}

fn reports_card(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_str(params, "studentId")?;
    let config_id = params.get("configId").and_then(|v| v.as_str());
    let exam_id = params.get("examId").and_then(|v| v.as_str());

    match (config_id, exam_id) {
        (Some(cid), None) => {
            let cfg = state
                .store
                .config(cid)
                .ok_or_else(|| HandlerErr::new("not_found", "config not found"))?;
            Ok(json!({ "card": marklist_card(cfg, &student_id) }))
        }
        (None, Some(eid)) => {
            let exam = state
                .store
                .exam(eid)
                .ok_or_else(|| HandlerErr::new("not_found", "exam not found"))?;
            Ok(json!({ "card": exam_card(exam, &student_id) }))
        }
        _ => Err(HandlerErr::new(
            "bad_params",
            "exactly one of configId or examId is required",
        )),
    }
}

fn reports_class_summary(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let config_id = require_str(params, "configId")?;
    let cfg = state
        .store
        .config(&config_id)
        .ok_or_else(|| HandlerErr::new("not_found", "config not found"))?;

    let columns = cfg.ordered_columns();
    let mut student_ids: Vec<&String> = cfg.entries.keys().collect();
    student_ids.sort();

    let per_column: Vec<serde_json::Value> = columns
        .iter()
        .map(|col| {
            let states = student_ids.iter().map(|sid| {
                cfg.entries[*sid]
                    .marks
                    .iter()
                    .find(|m| m.column_id == col.id)
                    .map(|m| MarkState::Marked(m.score))
                    .unwrap_or(MarkState::Unmarked)
            });
            let avg = column_average(states, col.max_marks);
            json!({
                "columnId": col.id,
                "title": col.title,
                "maxMarks": col.max_marks,
                "isOptional": col.is_optional,
                "avgRaw": avg.avg_raw,
                "avgPercent": avg.avg_percent,
                "markedCount": avg.marked_count,
                "unmarkedCount": avg.unmarked_count,
            })
        })
        .collect();

    let mut percent_sum = 0.0_f64;
    let per_student: Vec<serde_json::Value> = student_ids
        .iter()
        .map(|sid| {
            let rec = &cfg.entries[*sid];
            let entry = EntryState::from_parts(
                sid,
                &rec.remarks,
                rec.marks.clone(),
                &columns,
                cfg.grade_scale,
            );
            percent_sum += entry.derived.percentage;
            json!({
                "studentId": sid,
                "total": entry.derived.total,
                "maxTotal": entry.derived.max_total,
                "percentage": entry.derived.percentage,
                "grade": entry.derived.grade.as_str(),
            })
        })
        .collect();

    let class_avg_percent = if per_student.is_empty() {
        0.0
    } else {
        round1(percent_sum / per_student.len() as f64)
    };

    Ok(json!({
        "configId": cfg.id,
        "classId": cfg.class_id,
        "subject": cfg.subject,
        "title": cfg.title,
        "gradeScale": cfg.grade_scale.as_str(),
        "perColumn": per_column,
        "perStudent": per_student,
        "classAvgPercent": class_avg_percent,
    }))
}

fn respond(
    state: &mut AppState,
    req: &Request,
    f: fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match f(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.card" => Some(respond(state, req, reports_card)),
        "reports.classSummary" => Some(respond(state, req, reports_class_summary)),
        _ => None,
    }
}
