use serde_json::json;

use super::{optional_score, require_str};
use crate::entry::{apply, EntryEvent, EntryState};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_stamp, ConfigRecord, EntryRecord};

const BULK_UPDATE_MAX_EDITS: usize = 2000;

fn entry_view(cfg: &ConfigRecord, rec: &EntryRecord) -> serde_json::Value {
    let columns = cfg.ordered_columns();
    let state = EntryState::from_parts(
        &rec.student_id,
        &rec.remarks,
        rec.marks.clone(),
        &columns,
        cfg.grade_scale,
    );
    let marks: Vec<serde_json::Value> = state
        .marks
        .iter()
        .map(|m| json!({ "columnId": m.column_id, "score": m.score }))
        .collect();
    json!({
        "studentId": state.student_id,
        "remarks": state.remarks,
        "marks": marks,
        "total": state.derived.total,
        "maxTotal": state.derived.max_total,
        "percentage": state.derived.percentage,
        "grade": state.derived.grade.as_str(),
        "updatedAt": rec.updated_at,
    })
}

fn require_config<'a>(
    state: &'a mut AppState,
    params: &serde_json::Value,
) -> Result<&'a mut ConfigRecord, HandlerErr> {
    let config_id = require_str(params, "configId")?;
    state
        .store
        .config_mut(&config_id)
        .ok_or_else(|| HandlerErr::new("not_found", "config not found"))
}

fn entries_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_str(params, "studentId")?;
    let cfg = require_config(state, params)?;

    // Viewing a row creates its (empty) entry; this is a read as far as the
    // lock flag is concerned.
    cfg.entry_or_default(&student_id);
    let rec = cfg
        .entries
        .get(&student_id)
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_found", "entry not found"))?;
    Ok(json!({ "entry": entry_view(cfg, &rec) }))
}

fn entries_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = require_config(state, params)?;
    let mut student_ids: Vec<&String> = cfg.entries.keys().collect();
    student_ids.sort();
    let entries: Vec<serde_json::Value> = student_ids
        .into_iter()
        .map(|sid| entry_view(cfg, &cfg.entries[sid]))
        .collect();
    Ok(json!({ "entries": entries }))
}

/// Apply one score edit through the reducer and persist the outcome.
/// Returns `(adjusted, applied score, derived view)`.
fn apply_score_edit(
    cfg: &mut ConfigRecord,
    student_id: &str,
    column_id: &str,
    score: Option<f64>,
) -> Result<(bool, Option<f64>, serde_json::Value), HandlerErr> {
    if cfg.column(column_id).is_none() {
        return Err(HandlerErr::with_details(
            "not_found",
            "column not found",
            json!({ "columnId": column_id }),
        ));
    }

    let columns = cfg.ordered_columns();
    let scale = cfg.grade_scale;
    let prior_rec = cfg.entry_or_default(student_id).clone();
    let prior = EntryState::from_parts(
        &prior_rec.student_id,
        &prior_rec.remarks,
        prior_rec.marks,
        &columns,
        scale,
    );

    let event = match score {
        Some(s) => EntryEvent::SetScore {
            column_id: column_id.to_string(),
            score: s,
        },
        None => EntryEvent::ClearScore {
            column_id: column_id.to_string(),
        },
    };
    let outcome = apply(&prior, &columns, scale, &event);

    let applied = outcome
        .state
        .marks
        .iter()
        .find(|m| m.column_id == column_id)
        .map(|m| m.score);

    let rec = cfg.entry_or_default(student_id);
    rec.marks = outcome.state.marks;
    rec.updated_at = now_stamp();
    cfg.updated_at = now_stamp();

    let derived = json!({
        "total": outcome.state.derived.total,
        "maxTotal": outcome.state.derived.max_total,
        "percentage": outcome.state.derived.percentage,
        "grade": outcome.state.derived.grade.as_str(),
    });
    Ok((outcome.adjusted, applied, derived))
}

fn entries_update_mark(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_str(params, "studentId")?;
    let column_id = require_str(params, "columnId")?;
    let score = optional_score(params, "score")?;

    let cfg = require_config(state, params)?;
    if cfg.locked {
        return Err(HandlerErr::new("config_locked", "config is locked"));
    }

    let (adjusted, applied, derived) = apply_score_edit(cfg, &student_id, &column_id, score)?;
    Ok(json!({
        "adjusted": adjusted,
        "appliedScore": applied,
        "derived": derived,
    }))
}

fn entries_set_remarks(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_str(params, "studentId")?;
    let remarks = require_str(params, "remarks")?;

    let cfg = require_config(state, params)?;
    if cfg.locked {
        return Err(HandlerErr::new("config_locked", "config is locked"));
    }

    let rec = cfg.entry_or_default(&student_id);
    rec.remarks = remarks;
    rec.updated_at = now_stamp();
    cfg.updated_at = now_stamp();
    Ok(json!({ "ok": true }))
}

fn entries_bulk_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(edits) = params.get("edits").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing edits[]"));
    };
    if edits.len() > BULK_UPDATE_MAX_EDITS {
        return Err(HandlerErr::with_details(
            "bad_params",
            "bulk payload exceeds max edits",
            json!({ "edits": edits.len(), "max": BULK_UPDATE_MAX_EDITS }),
        ));
    }
    let edits = edits.clone();

    let cfg = require_config(state, params)?;
    if cfg.locked {
        return Err(HandlerErr::new("config_locked", "config is locked"));
    }

    let mut updated = 0_usize;
    let mut adjusted_count = 0_usize;
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, edit) in edits.iter().enumerate() {
        if !edit.is_object() {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": "edit must be an object",
            }));
            continue;
        }

        let parsed = require_str(edit, "studentId")
            .and_then(|sid| require_str(edit, "columnId").map(|cid| (sid, cid)))
            .and_then(|(sid, cid)| optional_score(edit, "score").map(|s| (sid, cid, s)));
        let (student_id, column_id, score) = match parsed {
            Ok(v) => v,
            Err(e) => {
                errors.push(json!({
                    "index": i,
                    "code": e.code,
                    "message": e.message,
                }));
                continue;
            }
        };

        match apply_score_edit(cfg, &student_id, &column_id, score) {
            Ok((adjusted, _, _)) => {
                updated += 1;
                if adjusted {
                    adjusted_count += 1;
                }
            }
            Err(e) => errors.push(json!({
                "index": i,
                "code": e.code,
                "message": e.message,
            })),
        }
    }

    let mut result = json!({ "updated": updated, "adjusted": adjusted_count });
    if !errors.is_empty() {
        result["rejected"] = json!(errors.len());
        result["errors"] = json!(errors);
    }
    Ok(result)
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
        "entries.get" => Some(respond(state, req, entries_get)),
        "entries.list" => Some(respond(state, req, entries_list)),
        "entries.updateMark" => Some(respond(state, req, entries_update_mark)),
        "entries.setRemarks" => Some(respond(state, req, entries_set_remarks)),
        "entries.bulkUpdate" => Some(respond(state, req, entries_bulk_update)),
        _ => None,
    }
}
