//! Worker / Scheduler (C7): a single-writer loop that dequeues one job at a
//! time, walks it through extraction, synthesis, and muxing, and publishes
//! lifecycle events along the way. At most one job processes at a time
//! process-wide; the JobStore itself holds no OS-level lock, so this
//! invariant is entirely a property of this loop never running twice.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use serde_json::json;
use tempfile::TempDir;

use crate::db::{Job, JobStatus, JobStore};
use crate::error::{NarratorError, Result};
use crate::events::{EventBus, EventType};
use crate::models::QueueState;
use crate::output::{OutputWriter, PlacementInput};
use crate::settings::Settings;
use crate::tts::TtsClient;

const PAUSED_POLL_SECS: u64 = 5;
const QUIET_HOURS_POLL_SECS: u64 = 60;
const IDLE_POLL_SECS: u64 = 5;

fn join_err(e: tokio::task::JoinError) -> NarratorError {
    NarratorError::TaskJoinError(e.to_string())
}

/// Single-writer worker loop (C7). Holds everything `process_job` needs
/// behind cheaply-cloneable handles so its blocking calls can be offloaded to
/// `tokio::task::spawn_blocking` without cloning the loop itself.
pub struct Worker {
    job_store: Arc<JobStore>,
    tts: Arc<TtsClient>,
    queue_state: Arc<QueueState>,
    events: Arc<EventBus>,
    settings: Settings,
    output_writer: OutputWriter,
    running: Arc<AtomicBool>,
}

/// Clears `QueueState.current_job_id` on every exit path out of
/// `process_job`, cancellation and error returns included.
struct CurrentJobGuard<'a> {
    queue_state: &'a QueueState,
}

impl Drop for CurrentJobGuard<'_> {
    fn drop(&mut self) {
        self.queue_state.set_current_job(None);
    }
}

impl Worker {
    pub fn new(
        job_store: Arc<JobStore>,
        tts: Arc<TtsClient>,
        queue_state: Arc<QueueState>,
        events: Arc<EventBus>,
        settings: Settings,
        output_writer: OutputWriter,
    ) -> Self {
        Self {
            job_store,
            tts,
            queue_state,
            events,
            settings,
            output_writer,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Signals the loop to stop after the chapter currently in flight
    /// finishes; never interrupts mid-chapter, so no partial WAV is ever
    /// committed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs until `stop()` is called. Resets any jobs left mid-flight by a
    /// previous crash back to `pending` before entering the main loop.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("worker starting");
        if let Err(e) = self.resume_interrupted().await {
            tracing::error!(error = %e, "failed to reset resumable jobs on startup");
        }

        while self.running.load(Ordering::SeqCst) {
            if self.queue_state.is_paused() {
                tokio::time::sleep(Duration::from_secs(PAUSED_POLL_SECS)).await;
                continue;
            }
            if self.in_quiet_hours() {
                tokio::time::sleep(Duration::from_secs(QUIET_HOURS_POLL_SECS)).await;
                continue;
            }

            let next = match self.next_pending().await {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(error = %e, "failed to poll for next pending job");
                    tokio::time::sleep(Duration::from_secs(IDLE_POLL_SECS)).await;
                    continue;
                }
            };
            let Some(job) = next else {
                tokio::time::sleep(Duration::from_secs(IDLE_POLL_SECS)).await;
                continue;
            };

            if self.settings.delay_between_books_secs > 0 {
                tokio::time::sleep(Duration::from_secs(self.settings.delay_between_books_secs)).await;
            }

            self.process_job(job.id).await;
        }
        tracing::info!("worker stopped");
    }

    fn in_quiet_hours(&self) -> bool {
        let (Some(start), Some(end)) = (&self.settings.quiet_hours_start, &self.settings.quiet_hours_end) else {
            return false;
        };
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(start, "%H:%M"),
            NaiveTime::parse_from_str(end, "%H:%M"),
        ) else {
            return false;
        };
        let now = Local::now().time();
        if start <= end {
            now >= start && now < end
        } else {
            // wraps midnight, e.g. 22:00 - 06:00
            now >= start || now < end
        }
    }

    async fn resume_interrupted(&self) -> Result<()> {
        let store = self.job_store.clone();
        let resumable = tokio::task::spawn_blocking(move || store.get_resumable())
            .await
            .map_err(join_err)??;

        for job in resumable {
            tracing::warn!(job_id = job.id, "resetting interrupted job to pending");
            let store = self.job_store.clone();
            let id = job.id;
            tokio::task::spawn_blocking(move || store.update_progress(id, JobStatus::Pending, 0))
                .await
                .map_err(join_err)??;
        }
        Ok(())
    }

    async fn next_pending(&self) -> Result<Option<Job>> {
        let store = self.job_store.clone();
        tokio::task::spawn_blocking(move || store.next_pending())
            .await
            .map_err(join_err)?
    }

    async fn get_job(&self, id: i64) -> Result<Job> {
        let store = self.job_store.clone();
        tokio::task::spawn_blocking(move || store.get_job(id)).await.map_err(join_err)?
    }

    async fn start_job(&self, id: i64, status: JobStatus, chapters_total: i64) -> Result<()> {
        let store = self.job_store.clone();
        tokio::task::spawn_blocking(move || store.start_job(id, status, chapters_total))
            .await
            .map_err(join_err)?
    }

    async fn update_progress(&self, id: i64, status: JobStatus, chapters_done: i64) -> Result<()> {
        let store = self.job_store.clone();
        tokio::task::spawn_blocking(move || store.update_progress(id, status, chapters_done))
            .await
            .map_err(join_err)?
    }

    async fn complete_job(
        &self,
        id: i64,
        output_path: String,
        duration_seconds: i64,
        file_size_bytes: i64,
    ) -> Result<()> {
        let store = self.job_store.clone();
        tokio::task::spawn_blocking(move || {
            store.complete_job(id, &output_path, duration_seconds, file_size_bytes)
        })
        .await
        .map_err(join_err)?
    }

    /// Runs one job end to end. Never returns an error: every failure is
    /// caught, recorded on the Job, and published as `job_failed` so the
    /// loop keeps turning.
    async fn process_job(&self, job_id: i64) {
        self.queue_state.set_current_job(Some(job_id));
        let _guard = CurrentJobGuard {
            queue_state: &self.queue_state,
        };

        if let Err(e) = self.run_job(job_id).await {
            let message = e.to_string();
            tracing::error!(job_id, error = %message, "job failed");
            let store = self.job_store.clone();
            let fail_message = message.clone();
            let fail_result = tokio::task::spawn_blocking(move || store.fail_job(job_id, &fail_message)).await;
            match fail_result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(job_id, error = %e, "failed to record job failure"),
                Err(e) => tracing::error!(job_id, error = %e, "fail_job task panicked"),
            }
            self.events
                .publish(EventType::JobFailed, json!({"job_id": job_id, "error": message}));
        }
    }

    async fn run_job(&self, job_id: i64) -> Result<()> {
        let job = self.get_job(job_id).await?;
        self.start_job(job_id, JobStatus::Extracting, 0).await?;
        self.events
            .publish(EventType::JobStarted, json!({"job_id": job_id, "title": job.title}));

        let source_path = PathBuf::from(&job.source_path);
        let settings = self.settings.clone();
        let extract_path = source_path.clone();
        let extracted = tokio::task::spawn_blocking(move || crate::epub::extract(&extract_path, &settings))
            .await
            .map_err(join_err)??;

        let chapter_count = extracted.chapters.len() as i64;
        self.start_job(job_id, JobStatus::Synthesizing, chapter_count).await?;
        self.tts.wait_until_ready().await?;

        let temp_dir = TempDir::new().map_err(NarratorError::Io)?;
        let total = extracted.chapters.len();
        let mut chapter_wavs: Vec<(String, PathBuf)> = Vec::with_capacity(total);

        for (i, chapter) in extracted.chapters.iter().enumerate() {
            let chapter_num = i + 1;

            if !self.running.load(Ordering::SeqCst) {
                // job stays at its current status; crash-resume handles it on restart.
                return Ok(());
            }
            if self.queue_state.is_paused() {
                self.update_progress(job_id, JobStatus::Pending, i as i64).await?;
                return Ok(());
            }

            self.events.publish(
                EventType::ChapterStarted,
                json!({"job_id": job_id, "chapter": chapter_num, "title": chapter.title}),
            );

            let wav_path = temp_dir.path().join(format!("chapter_{i:04}.wav"));
            let wav_path = self
                .tts
                .synthesize_chapter(&chapter.title, &chapter.text, &job.voice, &wav_path, chapter_num, total)
                .await?;
            chapter_wavs.push((chapter.title.clone(), wav_path));

            self.events
                .publish(EventType::ChapterCompleted, json!({"job_id": job_id, "chapter": chapter_num}));
            self.update_progress(job_id, JobStatus::Synthesizing, chapter_num as i64).await?;
        }

        self.update_progress(job_id, JobStatus::Building, chapter_count).await?;

        let cover_path = extracted.cover_image.as_ref().map(|bytes| {
            let path = temp_dir.path().join("cover.img");
            let _ = std::fs::write(&path, bytes);
            path
        });

        let title = extracted.metadata.title.clone();
        let author = extracted.metadata.author.clone();
        let aac_bitrate = self.settings.aac_bitrate.clone();
        let output_m4b = temp_dir.path().join("combined.m4b");

        let build_output = output_m4b.clone();
        let build_cover = cover_path.clone();
        let validation = tokio::task::spawn_blocking(move || {
            crate::audio::build_m4b(
                &chapter_wavs,
                &title,
                &author,
                None,
                build_cover.as_deref(),
                &build_output,
                &aac_bitrate,
                true,
            )
        })
        .await
        .map_err(join_err)??;

        let writer = self.output_writer.clone();
        let meta_author = extracted.metadata.author.clone();
        let meta_title = extracted.metadata.title.clone();
        let meta_series = extracted.metadata.series.clone();
        let meta_description = extracted.metadata.description.clone();
        let voice = job.voice.clone();
        let cover_image = extracted.cover_image.clone();
        let validated_path = validation.path.clone();

        let m4b_path = tokio::task::spawn_blocking(move || {
            let input = PlacementInput {
                author: &meta_author,
                title: &meta_title,
                series: meta_series.as_deref(),
                description: meta_description.as_deref(),
                voice: &voice,
                cover_image: cover_image.as_deref(),
            };
            writer.write(&validated_path, &input)
        })
        .await
        .map_err(join_err)??;

        self.complete_job(
            job_id,
            m4b_path.to_string_lossy().to_string(),
            (validation.duration_ms / 1000) as i64,
            validation.size_bytes as i64,
        )
        .await?;

        self.events.publish(
            EventType::JobCompleted,
            json!({"job_id": job_id, "output_path": m4b_path.to_string_lossy()}),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_quiet_hours(start: &str, end: &str) -> Settings {
        Settings {
            quiet_hours_start: Some(start.to_string()),
            quiet_hours_end: Some(end.to_string()),
            ..Settings::default()
        }
    }

    fn worker_with(settings: Settings) -> Worker {
        let job_store = Arc::new(JobStore::new(crate::db::open_in_memory().unwrap()));
        let tts = Arc::new(TtsClient::new(&settings));
        let queue_state = Arc::new(QueueState::new());
        let events = Arc::new(EventBus::new());
        let output_writer = OutputWriter::new(std::env::temp_dir());
        Worker::new(job_store, tts, queue_state, events, settings, output_writer)
    }

    #[test]
    fn quiet_hours_absent_never_blocks() {
        let worker = worker_with(Settings::default());
        assert!(!worker.in_quiet_hours());
    }

    #[test]
    fn quiet_hours_non_wrapping_window() {
        let worker = worker_with(settings_with_quiet_hours("00:00", "00:00"));
        // a zero-length window (start == end) never matches.
        assert!(!worker.in_quiet_hours());
    }

    #[test]
    fn stop_flips_running_flag() {
        let worker = worker_with(Settings::default());
        assert!(worker.running.load(Ordering::SeqCst));
        worker.stop();
        assert!(!worker.running.load(Ordering::SeqCst));
    }
}
