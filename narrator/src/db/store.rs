//! The durable job queue (C6): all operations are synchronous and meant to be
//! invoked off the async event loop (`tokio::task::spawn_blocking`).

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Job, JobStatus, NewJob};
use crate::error::{NarratorError, Result};

pub struct JobStore {
    conn: Mutex<Connection>,
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get("id")?,
        library_book_id: row.get("library_book_id")?,
        title: row.get("title")?,
        author: row.get("author")?,
        series: row.get("series")?,
        series_index: row.get("series_index")?,
        voice: row.get("voice")?,
        status: row.get("status")?,
        chapters_total: row.get("chapters_total")?,
        chapters_done: row.get("chapters_done")?,
        error_message: row.get("error_message")?,
        source_path: row.get("source_path")?,
        output_path: row.get("output_path")?,
        queue_position: row.get("queue_position")?,
        duration_seconds: row.get("duration_seconds")?,
        file_size_bytes: row.get("file_size_bytes")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

impl JobStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn enqueue(&self, fields: NewJob) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let max_pos: i64 = conn.query_row(
            "SELECT COALESCE(MAX(COALESCE(queue_position, id)), 0) FROM jobs WHERE status = 'pending'",
            [],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT INTO jobs (library_book_id, title, author, voice, source_path, series, series_index, status, queue_position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
            params![
                fields.library_book_id,
                fields.title,
                fields.author,
                fields.voice,
                fields.source_path,
                fields.series,
                fields.series_index,
                max_pos + 1,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_job(id)
    }

    pub fn is_duplicate(&self, library_book_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM jobs WHERE library_book_id = ?1 AND status != 'failed'",
                params![library_book_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn next_pending(&self) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                "SELECT * FROM jobs WHERE status = 'pending' ORDER BY COALESCE(queue_position, id) LIMIT 1",
                [],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    pub fn get_job(&self, id: i64) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
            .optional()?
            .ok_or(NarratorError::JobNotFound(id))
    }

    pub fn start_job(&self, id: i64, status: JobStatus, chapters_total: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = ?1, started_at = datetime('now'), chapters_total = ?2 WHERE id = ?3",
            params![status, chapters_total, id],
        )?;
        Ok(())
    }

    pub fn update_progress(&self, id: i64, status: JobStatus, chapters_done: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = ?1, chapters_done = ?2 WHERE id = ?3",
            params![status, chapters_done, id],
        )?;
        Ok(())
    }

    pub fn complete_job(
        &self,
        id: i64,
        output_path: &str,
        duration_seconds: i64,
        file_size_bytes: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'complete', output_path = ?1, completed_at = datetime('now'),
             duration_seconds = ?2, file_size_bytes = ?3 WHERE id = ?4",
            params![output_path, duration_seconds, file_size_bytes, id],
        )?;
        Ok(())
    }

    pub fn fail_job(&self, id: i64, error_message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = ?1, completed_at = datetime('now') WHERE id = ?2",
            params![error_message, id],
        )?;
        Ok(())
    }

    pub fn cancel_job(&self, id: i64) -> Result<()> {
        let job = self.get_job(id)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = 'Cancelled by user', completed_at = datetime('now') WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn retry_job(&self, id: i64) -> Result<Job> {
        let job = self.get_job(id)?;
        if job.status != JobStatus::Failed {
            return Err(NarratorError::JobStateConflict {
                id,
                from: job.status,
                requested: "retry",
            });
        }
        let conn = self.conn.lock().unwrap();
        let max_pos: i64 = conn.query_row(
            "SELECT COALESCE(MAX(queue_position), 0) FROM jobs WHERE status = 'pending'",
            [],
            |r| r.get(0),
        )?;
        conn.execute(
            "UPDATE jobs SET status = 'pending', error_message = NULL, started_at = NULL,
             completed_at = NULL, chapters_done = 0, queue_position = ?1 WHERE id = ?2",
            params![max_pos + 1, id],
        )?;
        drop(conn);
        self.get_job(id)
    }

    pub fn reorder(&self, job_ids: &[i64]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for (idx, id) in job_ids.iter().enumerate() {
            conn.execute(
                "UPDATE jobs SET queue_position = ?1 WHERE id = ?2 AND status = 'pending'",
                params![(idx as i64) + 1, id],
            )?;
        }
        Ok(())
    }

    pub fn get_resumable(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status IN ('extracting','synthesizing','building') ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_jobs(&self, status: Option<JobStatus>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = match status {
            Some(s) => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?1",
                params![s],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?,
        };
        Ok(count)
    }

    pub fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from("SELECT * FROM jobs");
        if status.is_some() {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map(params![s], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map([], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    pub fn queue_summary(&self) -> Result<HashMap<String, i64>> {
        let conn = self.conn.lock().unwrap();
        let mut summary = HashMap::new();
        for s in [
            JobStatus::Pending,
            JobStatus::Extracting,
            JobStatus::Synthesizing,
            JobStatus::Building,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            summary.insert(s.as_str().to_string(), 0);
        }
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            summary.insert(status, count);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn store() -> JobStore {
        JobStore::new(open_in_memory().unwrap())
    }

    fn new_job(book_id: i64) -> NewJob {
        NewJob {
            library_book_id: book_id,
            title: "Test Book".into(),
            author: "Test Author".into(),
            voice: "af_heart".into(),
            source_path: "/tmp/test.epub".into(),
            series: None,
            series_index: None,
        }
    }

    #[test]
    fn enqueue_assigns_pending_and_queue_position() {
        let store = store();
        let job = store.enqueue(new_job(1)).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.queue_position, Some(1));
        assert_eq!(job.chapters_done, 0);
    }

    #[test]
    fn is_duplicate_ignores_failed_jobs() {
        let store = store();
        let job = store.enqueue(new_job(42)).unwrap();
        assert!(store.is_duplicate(42).unwrap());
        store.fail_job(job.id, "boom").unwrap();
        assert!(!store.is_duplicate(42).unwrap());
    }

    #[test]
    fn next_pending_orders_by_queue_position() {
        let store = store();
        let a = store.enqueue(new_job(1)).unwrap();
        let b = store.enqueue(new_job(2)).unwrap();
        let next = store.next_pending().unwrap().unwrap();
        assert_eq!(next.id, a.id);
        store.reorder(&[b.id, a.id]).unwrap();
        let next = store.next_pending().unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[test]
    fn full_lifecycle_to_complete() {
        let store = store();
        let job = store.enqueue(new_job(1)).unwrap();
        store.start_job(job.id, JobStatus::Extracting, 0).unwrap();
        store.start_job(job.id, JobStatus::Synthesizing, 3).unwrap();
        store.update_progress(job.id, JobStatus::Synthesizing, 2).unwrap();
        store.update_progress(job.id, JobStatus::Building, 3).unwrap();
        store.complete_job(job.id, "/out/book.m4b", 120, 4096).unwrap();
        let job = store.get_job(job.id).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.completed_at.is_some());
        assert_eq!(job.output_path.as_deref(), Some("/out/book.m4b"));
    }

    #[test]
    fn retry_only_allowed_from_failed() {
        let store = store();
        let job = store.enqueue(new_job(1)).unwrap();
        let err = store.retry_job(job.id).unwrap_err();
        assert!(matches!(err, NarratorError::JobStateConflict { .. }));
        store.fail_job(job.id, "oops").unwrap();
        let retried = store.retry_job(job.id).unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.chapters_done, 0);
        assert!(retried.error_message.is_none());
    }

    #[test]
    fn cancel_is_noop_on_terminal_job() {
        let store = store();
        let job = store.enqueue(new_job(1)).unwrap();
        store.fail_job(job.id, "already done").unwrap();
        store.cancel_job(job.id).unwrap();
        let job = store.get_job(job.id).unwrap();
        assert_eq!(job.error_message.as_deref(), Some("already done"));
    }

    #[test]
    fn get_resumable_returns_only_inflight_statuses() {
        let store = store();
        let a = store.enqueue(new_job(1)).unwrap();
        let b = store.enqueue(new_job(2)).unwrap();
        store.start_job(a.id, JobStatus::Extracting, 0).unwrap();
        store.start_job(b.id, JobStatus::Synthesizing, 2).unwrap();
        let resumable = store.get_resumable().unwrap();
        assert_eq!(resumable.len(), 2);
    }

    #[test]
    fn reorder_skips_non_pending_ids() {
        let store = store();
        let a = store.enqueue(new_job(1)).unwrap();
        let b = store.enqueue(new_job(2)).unwrap();
        store.fail_job(b.id, "x").unwrap();
        store.reorder(&[b.id, a.id]).unwrap();
        let a_after = store.get_job(a.id).unwrap();
        assert_eq!(a_after.queue_position, Some(2));
    }

    #[test]
    fn duplicate_guard_across_two_enqueues_is_not_automatic() {
        // enqueue() itself does not dedupe; callers must pre-check is_duplicate.
        let store = store();
        store.enqueue(new_job(7)).unwrap();
        let second = store.enqueue(new_job(7)).unwrap();
        assert_eq!(second.library_book_id, 7);
    }
}
