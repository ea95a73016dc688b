use serde_json::json;

use super::{grade_scale_param, require_bool, require_f64, require_str, require_trimmed};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::score::AssessmentColumn;
use crate::store::{now_stamp, ConfigRecord};

fn config_row(cfg: &ConfigRecord) -> serde_json::Value {
    json!({
        "id": cfg.id,
        "classId": cfg.class_id,
        "subject": cfg.subject,
        "title": cfg.title,
        "gradeScale": cfg.grade_scale.as_str(),
        "locked": cfg.locked,
        "columnCount": cfg.columns.len(),
        "entryCount": cfg.entries.len(),
        "updatedAt": cfg.updated_at,
    })
}

fn column_row(col: &AssessmentColumn) -> serde_json::Value {
    json!({
        "id": col.id,
        "title": col.title,
        "maxMarks": col.max_marks,
        "order": col.order,
        "isOptional": col.is_optional,
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

fn require_unlocked_config<'a>(
    state: &'a mut AppState,
    params: &serde_json::Value,
) -> Result<&'a mut ConfigRecord, HandlerErr> {
    let cfg = require_config(state, params)?;
    if cfg.locked {
        return Err(HandlerErr::new("config_locked", "config is locked"));
    }
    Ok(cfg)
}

fn configs_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = require_trimmed(params, "classId")?;
    let subject = require_trimmed(params, "subject")?;
    let title = require_trimmed(params, "title")?;
    let scale = grade_scale_param(params)?;

    let config_id = state.store.create_config(&class_id, &subject, &title, scale);
    Ok(json!({ "configId": config_id }))
}

fn configs_list(state: &mut AppState, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut rows: Vec<&ConfigRecord> = state.store.configs.values().collect();
    rows.sort_by(|a, b| (&a.class_id, &a.subject, &a.title).cmp(&(&b.class_id, &b.subject, &b.title)));
    let configs: Vec<serde_json::Value> = rows.into_iter().map(config_row).collect();
    Ok(json!({ "configs": configs }))
}

fn configs_set_grade_scale(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    if params.get("gradeScale").map(|v| v.is_null()).unwrap_or(true) {
        return Err(HandlerErr::new("bad_params", "missing gradeScale"));
    }
    let scale = grade_scale_param(params)?;
    let cfg = require_config(state, params)?;
    cfg.grade_scale = scale;
    cfg.updated_at = now_stamp();
    Ok(json!({ "gradeScale": scale.as_str() }))
}

fn configs_set_locked(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let locked = require_bool(params, "locked")?;
    let cfg = require_config(state, params)?;
    cfg.locked = locked;
    cfg.updated_at = now_stamp();
    Ok(json!({ "locked": locked }))
}

fn columns_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = require_config(state, params)?;
    let columns: Vec<serde_json::Value> = cfg.ordered_columns().iter().map(column_row).collect();
    Ok(json!({ "columns": columns }))
}

fn columns_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let title = require_trimmed(params, "title")?;
    let max_marks = require_f64(params, "maxMarks")?;
    if !max_marks.is_finite() || max_marks <= 0.0 {
        return Err(HandlerErr::with_details(
            "bad_params",
            "maxMarks must be > 0",
            json!({ "maxMarks": max_marks }),
        ));
    }
    let is_optional = params
        .get("isOptional")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let cfg = require_unlocked_config(state, params)?;
    let column_id = cfg.add_column(&title, max_marks, is_optional);
    Ok(json!({ "columnId": column_id }))
}

fn columns_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let column_id = require_str(params, "columnId")?;

    let title = match params.get("title") {
        None => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerErr::new("bad_params", "title must be a string"));
            };
            let t = s.trim();
            if t.is_empty() {
                return Err(HandlerErr::new("bad_params", "title must not be empty"));
            }
            Some(t.to_string())
        }
    };
    let max_marks = match params.get("maxMarks") {
        None => None,
        Some(v) => {
            let Some(n) = v.as_f64() else {
                return Err(HandlerErr::new("bad_params", "maxMarks must be a number"));
            };
            if !n.is_finite() || n <= 0.0 {
                return Err(HandlerErr::with_details(
                    "bad_params",
                    "maxMarks must be > 0",
                    json!({ "maxMarks": n }),
                ));
            }
            Some(n)
        }
    };
    let is_optional = match params.get("isOptional") {
        None => None,
        Some(v) => Some(v.as_bool().ok_or_else(|| {
            HandlerErr::new("bad_params", "isOptional must be a boolean")
        })?),
    };

    let cfg = require_unlocked_config(state, params)?;
    let Some(col) = cfg.columns.iter_mut().find(|c| c.id == column_id) else {
        return Err(HandlerErr::new("not_found", "column not found"));
    };
    if let Some(t) = title {
        col.title = t;
    }
    if let Some(m) = max_marks {
        col.max_marks = m;
    }
    if let Some(o) = is_optional {
        col.is_optional = o;
    }
    let updated = column_row(col);
    cfg.updated_at = now_stamp();
    Ok(json!({ "column": updated }))
}

fn columns_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let column_id = require_str(params, "columnId")?;
    let cfg = require_unlocked_config(state, params)?;
    if !cfg.remove_column(&column_id) {
        return Err(HandlerErr::new("not_found", "column not found"));
    }
    Ok(json!({ "ok": true }))
}

fn columns_reorder(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw_ids) = params.get("orderedIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing orderedIds[]"));
    };
    let mut ordered_ids: Vec<String> = Vec::with_capacity(raw_ids.len());
    for v in raw_ids {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::new("bad_params", "orderedIds must be strings"));
        };
        ordered_ids.push(s.to_string());
    }

    let cfg = require_unlocked_config(state, params)?;
    if !cfg.reorder_columns(&ordered_ids) {
        return Err(HandlerErr::with_details(
            "bad_params",
            "orderedIds must list every existing column exactly once",
            json!({ "expected": cfg.columns.len(), "got": ordered_ids.len() }),
        ));
    }
    let columns: Vec<serde_json::Value> = cfg.ordered_columns().iter().map(column_row).collect();
    Ok(json!({ "columns": columns }))
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
        "configs.create" => Some(respond(state, req, configs_create)),
        "configs.list" => Some(respond(state, req, configs_list)),
        "configs.setGradeScale" => Some(respond(state, req, configs_set_grade_scale)),
        "configs.setLocked" => Some(respond(state, req, configs_set_locked)),
        "columns.list" => Some(respond(state, req, columns_list)),
        "columns.create" => Some(respond(state, req, columns_create)),
        "columns.update" => Some(respond(state, req, columns_update)),
        "columns.delete" => Some(respond(state, req, columns_delete)),
        "columns.reorder" => Some(respond(state, req, columns_reorder)),
        _ => None,
    }
}
