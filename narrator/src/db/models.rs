//! Durable job record and its status enum (§3).

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Extracting,
    Synthesizing,
    Building,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Synthesizing => "synthesizing",
            JobStatus::Building => "building",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            JobStatus::Extracting | JobStatus::Synthesizing | JobStatus::Building
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "extracting" => Ok(JobStatus::Extracting),
            "synthesizing" => Ok(JobStatus::Synthesizing),
            "building" => Ok(JobStatus::Building),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// A durable job record (§3). Field layout mirrors the `jobs` table 1:1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub library_book_id: i64,
    pub title: String,
    pub author: String,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub voice: String,
    pub status: JobStatus,
    pub chapters_total: i64,
    pub chapters_done: i64,
    pub error_message: Option<String>,
    pub source_path: String,
    pub output_path: Option<String>,
    pub queue_position: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub file_size_bytes: Option<i64>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Fields needed to enqueue a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub library_book_id: i64,
    pub title: String,
    pub author: String,
    pub voice: String,
    pub source_path: String,
    pub series: Option<String>,
    pub series_index: Option<f64>,
}
