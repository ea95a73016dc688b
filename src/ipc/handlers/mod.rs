pub mod configs;
pub mod core;
pub mod entries;
pub mod exams;
pub mod reports;

use crate::ipc::error::HandlerErr;
use crate::score::GradeScale;

pub(crate) fn require_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub(crate) fn require_trimmed(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = require_str(params, key)?;
    let t = v.trim().to_string();
    if t.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must not be empty", key),
        ));
    }
    Ok(t)
}

pub(crate) fn require_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing/invalid {}", key)))
}

pub(crate) fn require_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing/invalid {}", key)))
}

/// `score: number | null`. Absent and explicit null both mean "clear".
pub(crate) fn optional_score(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a number or null", key))),
    }
}

/// `gradeScale` param, defaulting to the canonical seven-tier table.
pub(crate) fn grade_scale_param(params: &serde_json::Value) -> Result<GradeScale, HandlerErr> {
    match params.get("gradeScale") {
        None => Ok(GradeScale::default()),
        Some(v) if v.is_null() => Ok(GradeScale::default()),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerErr::new("bad_params", "gradeScale must be a string"));
            };
            GradeScale::parse(s).ok_or_else(|| {
                HandlerErr::with_details(
                    "bad_params",
                    "gradeScale must be sevenTier or fiveTier",
                    serde_json::json!({ "gradeScale": s }),
                )
            })
        }
    }
}
