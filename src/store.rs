use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use crate::score::{AssessmentColumn, GradeScale, Mark};

/// Raw per-student row for one marklist configuration. Only raw marks and
/// remarks are stored; totals, percentages, and grades are recomputed on
/// every read so a stale cached copy can never become authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub student_id: String,
    pub remarks: String,
    pub marks: Vec<Mark>,
    pub updated_at: String,
}

/// A (class, subject) marklist configuration: the column rubric plus the
/// student entries keyed by student id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub id: String,
    pub class_id: String,
    pub subject: String,
    pub title: String,
    pub grade_scale: GradeScale,
    pub locked: bool,
    pub columns: Vec<AssessmentColumn>,
    pub entries: HashMap<String, EntryRecord>,
    pub updated_at: String,
}

/// Single-exam marklist: one declared maximum, one score per student.
/// A student absent from `scores` is not yet graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: String,
    pub class_id: String,
    pub subject: String,
    pub title: String,
    pub total_marks: f64,
    pub grade_scale: GradeScale,
    pub locked: bool,
    pub scores: HashMap<String, f64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub configs: HashMap<String, ConfigRecord>,
    pub exams: HashMap<String, ExamRecord>,
}

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn create_config(
        &mut self,
        class_id: &str,
        subject: &str,
        title: &str,
        grade_scale: GradeScale,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.configs.insert(
            id.clone(),
            ConfigRecord {
                id: id.clone(),
                class_id: class_id.to_string(),
                subject: subject.to_string(),
                title: title.to_string(),
                grade_scale,
                locked: false,
                columns: Vec::new(),
                entries: HashMap::new(),
                updated_at: now_stamp(),
            },
        );
        id
    }

    pub fn create_exam(
        &mut self,
        class_id: &str,
        subject: &str,
        title: &str,
        total_marks: f64,
        grade_scale: GradeScale,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.exams.insert(
            id.clone(),
            ExamRecord {
                id: id.clone(),
                class_id: class_id.to_string(),
                subject: subject.to_string(),
                title: title.to_string(),
                total_marks,
                grade_scale,
                locked: false,
                scores: HashMap::new(),
                updated_at: now_stamp(),
            },
        );
        id
    }

    pub fn config(&self, id: &str) -> Option<&ConfigRecord> {
        self.configs.get(id)
    }

    pub fn config_mut(&mut self, id: &str) -> Option<&mut ConfigRecord> {
        self.configs.get_mut(id)
    }

    pub fn exam(&self, id: &str) -> Option<&ExamRecord> {
        self.exams.get(id)
    }

    pub fn exam_mut(&mut self, id: &str) -> Option<&mut ExamRecord> {
        self.exams.get_mut(id)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create snapshot dir {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self).context("serialize session snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Store> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        let store: Store = serde_json::from_str(&raw)
            .with_context(|| format!("parse snapshot {}", path.display()))?;
        Ok(store)
    }
}

impl ConfigRecord {
    /// Allocate a column at the end of the display order.
    pub fn add_column(&mut self, title: &str, max_marks: f64, is_optional: bool) -> String {
        let order = self.columns.iter().map(|c| c.order + 1).max().unwrap_or(0);
        let id = Uuid::new_v4().to_string();
        self.columns.push(AssessmentColumn {
            id: id.clone(),
            title: title.to_string(),
            max_marks,
            order,
            is_optional,
        });
        self.updated_at = now_stamp();
        id
    }

    pub fn column(&self, column_id: &str) -> Option<&AssessmentColumn> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Remove a column and every mark recorded against it.
    pub fn remove_column(&mut self, column_id: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.id != column_id);
        if self.columns.len() == before {
            return false;
        }
        for entry in self.entries.values_mut() {
            entry.marks.retain(|m| m.column_id != column_id);
        }
        self.updated_at = now_stamp();
        true
    }

    /// Reassign display order from an explicit id sequence. Every existing
    /// column must appear exactly once.
    pub fn reorder_columns(&mut self, ordered_ids: &[String]) -> bool {
        if ordered_ids.len() != self.columns.len() {
            return false;
        }
        for c in &self.columns {
            if !ordered_ids.contains(&c.id) {
                return false;
            }
        }
        for c in self.columns.iter_mut() {
            // Membership was checked above.
            if let Some(pos) = ordered_ids.iter().position(|id| *id == c.id) {
                c.order = pos as i64;
            }
        }
        self.columns.sort_by_key(|c| c.order);
        self.updated_at = now_stamp();
        true
    }

    /// Columns in display order, for handing to the score engine and to
    /// list responses.
    pub fn ordered_columns(&self) -> Vec<AssessmentColumn> {
        let mut cols = self.columns.clone();
        cols.sort_by_key(|c| c.order);
        cols
    }

    /// Fetch-or-create the entry for a student. Entries come into existence
    /// the first time a row is viewed.
    pub fn entry_or_default(&mut self, student_id: &str) -> &mut EntryRecord {
        self.entries
            .entry(student_id.to_string())
            .or_insert_with(|| EntryRecord {
                student_id: student_id.to_string(),
                remarks: String::new(),
                marks: Vec::new(),
                updated_at: now_stamp(),
            })
    }
}
