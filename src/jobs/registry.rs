use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    WorkDirectory,
    TemplateDownload,
    FileDownload,
    Generation,
}

impl FailureStage {
    fn describe(self) -> &'static str {
        match self {
            FailureStage::WorkDirectory => "Failed to create work directory",
            FailureStage::TemplateDownload => "Failed to fetch template HTML",
            FailureStage::FileDownload => "Failed to download files",
            FailureStage::Generation => "Report generation failed",
        }
    }
}

/// Error record kept for a job that stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub request_id: Uuid,
    pub stage: FailureStage,
    pub error: String,
}

impl JobFailure {
    pub fn new(request_id: Uuid, stage: FailureStage, cause: impl std::fmt::Display) -> Self {
        Self {
            request_id,
            stage,
            error: format!("{}: {cause}", stage.describe()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded {
        output_html: PathBuf,
        output_docx: PathBuf,
    },
    Failed(JobFailure),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded { .. } | JobStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub request_id: Uuid,
    pub folder_path: PathBuf,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-process outcome store keyed by request id. Lives as long as the process.
///
/// Records are never evicted, so the map grows by one entry per request
/// served. Nothing reads old entries yet; a retention bound belongs here once
/// a status lookup exists.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pending(&self, request_id: Uuid, folder_path: PathBuf) {
        let now = Utc::now();
        let record = JobRecord {
            request_id,
            folder_path,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.write().insert(request_id, record);
    }

    pub fn mark_running(&self, request_id: Uuid) {
        self.set_status(request_id, JobStatus::Running);
    }

    pub fn finish(&self, request_id: Uuid, status: JobStatus) {
        debug_assert!(status.is_terminal());
        self.set_status(request_id, status);
    }

    pub fn get(&self, request_id: Uuid) -> Option<JobRecord> {
        self.read().get(&request_id).cloned()
    }

    pub fn status(&self, request_id: Uuid) -> Option<JobStatus> {
        self.read().get(&request_id).map(|r| r.status.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn set_status(&self, request_id: Uuid, status: JobStatus) {
        if let Some(record) = self.write().get_mut(&request_id) {
            record.status = status;
            record.updated_at = Utc::now();
        } else {
            tracing::warn!(%request_id, "status update for unknown job");
        }
    }

    // Records are replaced whole; a poisoned map is still consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, JobRecord>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, JobRecord>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        registry.insert_pending(id, PathBuf::from("results/x"));
        assert_eq!(registry.status(id), Some(JobStatus::Pending));

        registry.mark_running(id);
        assert_eq!(registry.status(id), Some(JobStatus::Running));

        registry.finish(
            id,
            JobStatus::Succeeded {
                output_html: "a.html".into(),
                output_docx: "a.html.docx".into(),
            },
        );
        let record = registry.get(id).unwrap();
        assert!(record.status.is_terminal());
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let registry = JobRegistry::new();
        registry.mark_running(Uuid::new_v4());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failure_message_prefix() {
        let id = Uuid::new_v4();
        let failure = JobFailure::new(id, FailureStage::TemplateDownload, "404 Not Found");
        assert_eq!(failure.error, "Failed to fetch template HTML: 404 Not Found");
        assert_eq!(failure.request_id, id);
    }

    #[test]
    fn test_status_serialization() {
        let id = Uuid::nil();
        let failed = JobStatus::Failed(JobFailure::new(id, FailureStage::FileDownload, "boom"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "file_download");
        assert_eq!(json["error"], "Failed to download files: boom");

        let pending = serde_json::to_value(JobStatus::Pending).unwrap();
        assert_eq!(pending, serde_json::json!({"status": "pending"}));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = JobRegistry::new();
        let other = registry.clone();
        let id = Uuid::new_v4();
        registry.insert_pending(id, PathBuf::from("results/y"));
        assert_eq!(other.len(), 1);
    }
}
