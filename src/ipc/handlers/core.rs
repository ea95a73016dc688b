use serde_json::json;
use std::path::PathBuf;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "configCount": state.store.configs.len(),
            "examCount": state.store.exams.len(),
        }),
    )
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.store = Store::new();
    ok(&req.id, json!({ "ok": true }))
}

fn snapshot_path(req: &Request) -> Option<PathBuf> {
    req.params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

fn handle_session_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = snapshot_path(req) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    match state.store.save(&path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "path": path.to_string_lossy(),
                "configCount": state.store.configs.len(),
                "examCount": state.store.exams.len(),
            }),
        ),
        Err(e) => err(&req.id, "snapshot_save_failed", format!("{e:#}"), None),
    }
}

fn handle_session_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = snapshot_path(req) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    match Store::load(&path) {
        Ok(store) => {
            state.store = store;
            ok(
                &req.id,
                json!({
                    "path": path.to_string_lossy(),
                    "configCount": state.store.configs.len(),
                    "examCount": state.store.exams.len(),
                }),
            )
        }
        Err(e) => err(&req.id, "snapshot_load_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        "session.save" => Some(handle_session_save(state, req)),
        "session.load" => Some(handle_session_load(state, req)),
        _ => None,
    }
}
