use serde_json::json;

use super::{grade_scale_param, optional_score, require_bool, require_f64, require_str, require_trimmed};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::score::{clamp_score, simple_grade};
use crate::store::{now_stamp, ExamRecord};

fn exam_row(exam: &ExamRecord) -> serde_json::Value {
    json!({
        "id": exam.id,
        "classId": exam.class_id,
        "subject": exam.subject,
        "title": exam.title,
        "totalMarks": exam.total_marks,
        "gradeScale": exam.grade_scale.as_str(),
        "locked": exam.locked,
        "scoredCount": exam.scores.len(),
        "updatedAt": exam.updated_at,
    })
}

fn require_exam<'a>(
    state: &'a mut AppState,
    params: &serde_json::Value,
) -> Result<&'a mut ExamRecord, HandlerErr> {
    let exam_id = require_str(params, "examId")?;
    state
        .store
        .exam_mut(&exam_id)
        .ok_or_else(|| HandlerErr::new("not_found", "exam not found"))
}

fn exams_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = require_trimmed(params, "classId")?;
    let subject = require_trimmed(params, "subject")?;
    let title = require_trimmed(params, "title")?;
    let total_marks = require_f64(params, "totalMarks")?;
    if !total_marks.is_finite() || total_marks <= 0.0 {
        return Err(HandlerErr::with_details(
            "bad_params",
            "totalMarks must be > 0",
            json!({ "totalMarks": total_marks }),
        ));
    }
    let scale = grade_scale_param(params)?;

    let exam_id = state
        .store
        .create_exam(&class_id, &subject, &title, total_marks, scale);
    Ok(json!({ "examId": exam_id }))
}

fn exams_list(state: &mut AppState, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut rows: Vec<&ExamRecord> = state.store.exams.values().collect();
    rows.sort_by(|a, b| (&a.class_id, &a.subject, &a.title).cmp(&(&b.class_id, &b.subject, &b.title)));
    let exams: Vec<serde_json::Value> = rows.into_iter().map(exam_row).collect();
    Ok(json!({ "exams": exams }))
}

fn exams_set_locked(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let locked = require_bool(params, "locked")?;
    let exam = require_exam(state, params)?;
    exam.locked = locked;
    exam.updated_at = now_stamp();
    Ok(json!({ "locked": locked }))
}

fn exams_set_score(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_trimmed(params, "studentId")?;
    let score = optional_score(params, "score")?;

    let exam = require_exam(state, params)?;
    if exam.locked {
        return Err(HandlerErr::new("exam_locked", "exam is locked"));
    }

    match score {
        None => {
            // Back to the ungraded sentinel, not a zero.
            exam.scores.remove(&student_id);
            exam.updated_at = now_stamp();
            Ok(json!({
                "adjusted": false,
                "appliedScore": null,
                "result": null,
            }))
        }
        Some(raw) => {
            let applied = clamp_score(raw, exam.total_marks);
            let adjusted = applied != raw;
            exam.scores.insert(student_id, applied);
            exam.updated_at = now_stamp();

            let result = simple_grade(Some(applied), exam.total_marks, exam.grade_scale)
                .map(|r| json!({ "percentage": r.percentage, "grade": r.grade.as_str() }));
            Ok(json!({
                "adjusted": adjusted,
                "appliedScore": applied,
                "result": result,
            }))
        }
    }
}

fn exams_results(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    // An explicit roster lets callers see ungraded students; without one,
    // only scored students are listed.
    let roster: Option<Vec<String>> = match params.get("studentIds") {
        None => None,
        Some(v) => {
            let Some(arr) = v.as_array() else {
                return Err(HandlerErr::new("bad_params", "studentIds must be an array"));
            };
            let mut ids = Vec::with_capacity(arr.len());
            for item in arr {
                let Some(s) = item.as_str() else {
                    return Err(HandlerErr::new("bad_params", "studentIds must be strings"));
                };
                ids.push(s.to_string());
            }
            Some(ids)
        }
    };

    let exam = require_exam(state, params)?;
    let mut student_ids: Vec<String> = match roster {
        Some(ids) => ids,
        None => exam.scores.keys().cloned().collect(),
    };
    student_ids.sort();
    student_ids.dedup();

    let results: Vec<serde_json::Value> = student_ids
        .iter()
        .map(|sid| {
            let score = exam.scores.get(sid).copied();
            match simple_grade(score, exam.total_marks, exam.grade_scale) {
                Some(r) => json!({
                    "studentId": sid,
                    "score": score,
                    "percentage": r.percentage,
                    "grade": r.grade.as_str(),
                }),
                None => json!({
                    "studentId": sid,
                    "score": null,
                    "percentage": null,
                    "grade": null,
                }),
            }
        })
        .collect();

    Ok(json!({
        "examId": exam.id,
        "totalMarks": exam.total_marks,
        "gradeScale": exam.grade_scale.as_str(),
        "results": results,
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
        "exams.create" => Some(respond(state, req, exams_create)),
        "exams.list" => Some(respond(state, req, exams_list)),
        "exams.setLocked" => Some(respond(state, req, exams_set_locked)),
        "exams.setScore" => Some(respond(state, req, exams_set_score)),
        "exams.results" => Some(respond(state, req, exams_results)),
        _ => None,
    }
}
