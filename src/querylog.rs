//! Query log
//!
//! One record per answered question, appended as JSON Lines. The pipeline
//! only ever writes; the `/api/logs` endpoint reads the tail back for
//! analytics.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::{AppError, Result};

/// Default length of `answer_preview`, in characters.
pub const DEFAULT_PREVIEW_CHARS: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLogRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub answer_preview: String,
    pub sources: Vec<String>,
}

impl QueryLogRecord {
    /// Build a record stamped with the current time.
    pub fn new(query: &str, answer: &str, sources: &[String], preview_chars: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.to_string(),
            answer_preview: preview(answer, preview_chars),
            sources: sources.to_vec(),
        }
    }
}

/// First `max_chars` characters of `text` on a single line.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[async_trait]
pub trait QueryLog: Send + Sync {
    async fn record(&self, record: QueryLogRecord) -> Result<()>;

    /// Most recent `limit` records, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<QueryLogRecord>>;
}

// ============================================================================
// JSON Lines file
// ============================================================================

pub struct JsonlQueryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlQueryLog {
    /// Open (or prepare to create) the log file, creating parent directories.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Internal(format!(
                        "Failed to create log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QueryLog for JsonlQueryLog {
    async fn record(&self, record: QueryLogRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| AppError::Internal(format!("Failed to encode log record: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to open query log: {}", e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write query log: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to flush query log: {}", e)))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueryLogRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read query log: {}",
                    e
                )))
            }
        };

        let mut records: Vec<QueryLogRecord> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed query log line");
                    None
                }
            })
            .collect();

        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryQueryLog {
    records: parking_lot::Mutex<Vec<QueryLogRecord>>,
}

impl InMemoryQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl QueryLog for InMemoryQueryLog {
    async fn record(&self, record: QueryLogRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueryLogRecord>> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(limit);
        Ok(records[skip..].to_vec())
    }
}
