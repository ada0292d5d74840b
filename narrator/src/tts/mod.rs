//! TTSClient (C2): a resilient adapter over a remote, GPU-backed synthesis
//! endpoint. The endpoint is observed to drop requests under load, so a
//! failed chunk doesn't just retry the POST — it re-runs the full readiness
//! handshake (voices probe + warm-up), since the service may have crashed and
//! restarted underneath it.

mod wav;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::json;

use crate::error::{NarratorError, Result};
use crate::settings::Settings;
use crate::text::chunk_text;

const WARMUP_TEXT: &str = "This is a warmup request to initialize the text to speech model. \
The quick brown fox jumps over the lazy dog near the bank of a quiet river. \
She sells seashells by the seashore while the waves crash gently on the sand.";
const MODEL: &str = "kokoro";
const WARMUP_VOICE: &str = "af_heart";
const WARMUP_SETTLE_SECS: u64 = 5;
const VOICES_PROBE_INTERVAL_SECS: u64 = 5;

pub struct TtsClient {
    url: String,
    client: Client,
    max_retries: u32,
    startup_timeout_secs: u64,
    warmup_pause_secs: u64,
    cooldown_secs: f32,
    rest_interval: u32,
    rest_duration_secs: u64,
    crossfade_ms: u32,
    token_limit: usize,
    token_floor: usize,
    chars_per_token: f32,
}

impl TtsClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            url: settings.tts_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            max_retries: settings.max_retries,
            startup_timeout_secs: settings.tts_startup_timeout_secs,
            warmup_pause_secs: settings.tts_warmup_pause_secs,
            cooldown_secs: settings.tts_cooldown_secs,
            rest_interval: settings.tts_rest_interval,
            rest_duration_secs: settings.tts_rest_duration_secs,
            crossfade_ms: settings.crossfade_ms,
            token_limit: settings.token_limit,
            token_floor: settings.token_floor,
            chars_per_token: settings.chars_per_token,
        }
    }

    /// Polls `/v1/audio/voices` until it answers, then runs [`Self::warmup`].
    pub async fn wait_until_ready(&self) -> Result<()> {
        tracing::info!(url = %self.url, "waiting for tts server");
        let deadline = Instant::now() + Duration::from_secs(self.startup_timeout_secs);
        loop {
            if self.probe_voices().await {
                tracing::info!("tts server responding");
                break;
            }
            if Instant::now() >= deadline {
                return Err(NarratorError::TtsUnavailable(format!(
                    "tts server not reachable after {}s",
                    self.startup_timeout_secs
                )));
            }
            tokio::time::sleep(Duration::from_secs(VOICES_PROBE_INTERVAL_SECS)).await;
        }
        self.warmup().await
    }

    async fn probe_voices(&self) -> bool {
        let url = format!("{}/v1/audio/voices", self.url);
        match self.client.get(&url).timeout(Duration::from_secs(10)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn warmup(&self) -> Result<()> {
        for attempt in 1..=3 {
            tracing::info!(attempt, "warming up tts model");
            let payload = json!({
                "model": MODEL,
                "input": WARMUP_TEXT,
                "voice": WARMUP_VOICE,
                "response_format": "wav",
            });
            let sent = self
                .client
                .post(format!("{}/v1/audio/speech", self.url))
                .json(&payload)
                .timeout(Duration::from_secs(60))
                .send()
                .await;

            match sent {
                Ok(resp) if resp.status().is_success() => {
                    tokio::time::sleep(Duration::from_secs(WARMUP_SETTLE_SECS)).await;
                    tracing::info!("tts server ready");
                    return Ok(());
                }
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), "warmup failed, restarting health check");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "warmup failed, restarting health check");
                }
            }

            tokio::time::sleep(Duration::from_secs(self.warmup_pause_secs)).await;
            let deadline = Instant::now() + Duration::from_secs(self.startup_timeout_secs);
            while Instant::now() < deadline {
                if self.probe_voices().await {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(VOICES_PROBE_INTERVAL_SECS)).await;
            }
        }
        Err(NarratorError::TtsUnavailable(
            "tts server failed to stabilize after warmup attempts".to_string(),
        ))
    }

    /// Synthesizes one chapter to `out_path`. Idempotent: if `out_path`
    /// already exists, returns it unchanged without contacting the endpoint.
    pub async fn synthesize_chapter(
        &self,
        title: &str,
        text: &str,
        voice: &str,
        out_path: &Path,
        chapter_num: usize,
        total_chapters: usize,
    ) -> Result<PathBuf> {
        if out_path.exists() {
            tracing::info!(chapter_num, total_chapters, title, "chapter cached, skipping synthesis");
            return Ok(out_path.to_path_buf());
        }

        let spoken_title = if is_all_upper(title) { to_title_case(title) } else { title.to_string() };
        let mut chunks = vec![format!("{spoken_title}.")];
        chunks.extend(chunk_text(text, self.token_limit, self.token_floor, self.chars_per_token));
        let total_chunks = chunks.len();

        let mut segments = Vec::with_capacity(total_chunks);
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_idx = i + 1;
            if chunk_idx > 1 && (chunk_idx - 1) % self.rest_interval as usize == 0 {
                tracing::info!(seconds = self.rest_duration_secs, "resting to let tts recover vram");
                tokio::time::sleep(Duration::from_secs(self.rest_duration_secs)).await;
            }

            tracing::info!(chapter_num, total_chapters, chunk_idx, total_chunks, title, "synthesizing chunk");
            let bytes = self.request_with_retry(chunk, voice).await?;
            segments.push(wav::decode(&bytes)?);

            if chunk_idx < total_chunks {
                tokio::time::sleep(Duration::from_secs_f32(self.cooldown_secs)).await;
            }
        }

        if segments.is_empty() {
            return Err(NarratorError::TtsSynthesisError(format!(
                "no audio segments produced for chapter: {title}"
            )));
        }

        let combined = wav::crossfade_concat(segments, self.crossfade_ms);
        wav::write(out_path, &combined)?;
        Ok(out_path.to_path_buf())
    }

    async fn request_with_retry(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let payload = json!({
            "model": MODEL,
            "input": text,
            "voice": voice,
            "response_format": "wav",
        });

        for attempt in 0..self.max_retries {
            let sent = self
                .client
                .post(format!("{}/v1/audio/speech", self.url))
                .json(&payload)
                .timeout(Duration::from_secs(120))
                .send()
                .await;

            match sent {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.bytes().await?.to_vec());
                }
                Ok(resp) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        status = %resp.status(),
                        "tts request failed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "tts request failed"
                    );
                }
            }

            if attempt + 1 < self.max_retries {
                tracing::info!("waiting for tts server to recover...");
                self.wait_until_ready().await?;
            }
        }

        Err(NarratorError::TtsSynthesisError(format!(
            "tts request failed after {} attempts",
            self.max_retries
        )))
    }
}

fn is_all_upper(s: &str) -> bool {
    let mut has_cased = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            has_cased = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    has_cased
}

fn to_title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_upper_requires_at_least_one_cased_char() {
        assert!(is_all_upper("CHAPTER ONE"));
        assert!(!is_all_upper("Chapter One"));
        assert!(!is_all_upper("123"));
    }

    #[test]
    fn title_case_lowercases_remaining_letters() {
        assert_eq!(to_title_case("CHAPTER ONE"), "Chapter One");
    }
}
