//! Capped, newest-first log of submitted applications.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::profiles::{compute_hash, StoreWriteOutcome};
use crate::resolver::AnswerSource;

/// Maximum number of records kept on disk.
pub const HISTORY_CAP: usize = 200;

/// One question/answer pair from an application attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
}

impl QaEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source,
        }
    }
}

/// Record of a submitted application. Never modified after it is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default, alias = "log")]
    pub qa_log: Vec<QaEntry>,
}

impl ApplicationRecord {
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        link: impl Into<String>,
        profile_id: impl Into<String>,
        qa_log: Vec<QaEntry>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            title: title.into(),
            company: company.into(),
            link: link.into(),
            profile_id: profile_id.into(),
            qa_log,
        }
    }
}

/// File-backed history document.
pub struct HistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads records, newest first.
    pub fn load(&self) -> Result<Vec<ApplicationRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed reading history {:?}", self.path))?;
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }
        let records = serde_json::from_slice(&data)
            .with_context(|| format!("Failed parsing history {:?}", self.path))?;
        Ok(records)
    }

    /// Prepends a record and drops anything past [`HISTORY_CAP`].
    pub fn append(&self, record: ApplicationRecord) -> Result<StoreWriteOutcome> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut records = self.load()?;
        records.insert(0, record);
        records.truncate(HISTORY_CAP);
        self.persist(&records)
    }

    fn persist(&self, records: &[ApplicationRecord]) -> Result<StoreWriteOutcome> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating history directory {:?}", parent))?;
        }
        let payload = serde_json::to_vec_pretty(records)?;
        fs::write(&self.path, &payload)
            .with_context(|| format!("Failed writing history {:?}", self.path))?;
        Ok(StoreWriteOutcome {
            path: self.path.clone(),
            hash: compute_hash(&payload),
        })
    }
}
