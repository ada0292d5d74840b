//! narrator - convert an EPUB/KEPUB into a chaptered M4B audiobook via a
//! remote TTS endpoint, queued through a durable SQLite-backed job store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use narrator::db::{JobStore, NewJob};
use narrator::events::EventBus;
use narrator::models::QueueState;
use narrator::output::{OutputWriter, PlacementInput};
use narrator::settings::Settings;
use narrator::tts::TtsClient;
use narrator::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "narrator")]
#[command(about = "Convert EPUB/KEPUB files to chaptered M4B audiobooks via a remote TTS endpoint")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a single EPUB/KEPUB directly, without going through the job queue.
    Convert {
        /// Path to the EPUB/KEPUB file.
        epub_file: PathBuf,
        /// Root directory audiobooks are placed under.
        #[arg(short, long, default_value = "./output")]
        output_root: PathBuf,
        /// Voice identifier to request from the TTS endpoint.
        #[arg(long)]
        voice: Option<String>,
    },
    /// Add a book to the durable job queue without running the worker.
    Enqueue {
        /// Path to the EPUB/KEPUB file.
        epub_file: PathBuf,
        /// Path to the SQLite job store.
        #[arg(long, default_value = "./narrator.db")]
        db: PathBuf,
        /// Library book id this job corresponds to (used for duplicate detection).
        #[arg(long)]
        library_book_id: i64,
        /// Title, if known; otherwise discovered at extraction time.
        #[arg(long, default_value = "Untitled")]
        title: String,
        /// Author, if known.
        #[arg(long, default_value = "Unknown Author")]
        author: String,
        /// Voice identifier to request from the TTS endpoint.
        #[arg(long)]
        voice: Option<String>,
    },
    /// Run the worker loop, processing jobs from the queue until interrupted.
    Serve {
        /// Path to the SQLite job store.
        #[arg(long, default_value = "./narrator.db")]
        db: PathBuf,
        /// Root directory audiobooks are placed under.
        #[arg(short, long, default_value = "./output")]
        output_root: PathBuf,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the current settings, as loaded from `~/.config/narrator/narrator.toml`.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("narrator=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Convert { epub_file, output_root, voice } => convert(epub_file, output_root, voice).await,
        Commands::Enqueue { epub_file, db, library_book_id, title, author, voice } => {
            enqueue(epub_file, db, library_book_id, title, author, voice)
        }
        Commands::Serve { db, output_root } => serve(db, output_root).await,
        Commands::Config { action: ConfigAction::Show } => show_config(),
    }
}

async fn convert(epub_file: PathBuf, output_root: PathBuf, voice: Option<String>) -> Result<()> {
    if !epub_file.exists() {
        anyhow::bail!("file not found: {}", epub_file.display());
    }

    let settings = Settings::load().context("failed to load settings")?;
    let voice = voice.unwrap_or_else(|| settings.voice.clone());

    tracing::info!(file = %epub_file.display(), "extracting");
    let extracted = narrator::epub::extract(&epub_file, &settings)?;
    tracing::info!(chapters = extracted.chapters.len(), title = %extracted.metadata.title, "extracted");

    let tts = TtsClient::new(&settings);
    tts.wait_until_ready().await?;

    let temp_dir = tempfile::TempDir::new()?;
    let mut chapter_wavs = Vec::with_capacity(extracted.chapters.len());
    let total = extracted.chapters.len();

    for (i, chapter) in extracted.chapters.iter().enumerate() {
        let wav_path = temp_dir.path().join(format!("chapter_{i:04}.wav"));
        let wav_path = tts
            .synthesize_chapter(&chapter.title, &chapter.text, &voice, &wav_path, i + 1, total)
            .await?;
        chapter_wavs.push((chapter.title.clone(), wav_path));
        tracing::info!(chapter = i + 1, total, "chapter synthesized");
    }

    let cover_path = extracted.cover_image.as_ref().map(|bytes| {
        let path = temp_dir.path().join("cover.img");
        let _ = std::fs::write(&path, bytes);
        path
    });

    let combined = temp_dir.path().join("combined.m4b");
    let validation = narrator::audio::build_m4b(
        &chapter_wavs,
        &extracted.metadata.title,
        &extracted.metadata.author,
        None,
        cover_path.as_deref(),
        &combined,
        &settings.aac_bitrate,
        true,
    )?;

    let writer = OutputWriter::new(output_root);
    let input = PlacementInput {
        author: &extracted.metadata.author,
        title: &extracted.metadata.title,
        series: extracted.metadata.series.as_deref(),
        description: extracted.metadata.description.as_deref(),
        voice: &voice,
        cover_image: extracted.cover_image.as_deref(),
    };
    let m4b_path = writer.write(&validation.path, &input)?;

    println!("{}", m4b_path.display());
    Ok(())
}

fn enqueue(
    epub_file: PathBuf,
    db: PathBuf,
    library_book_id: i64,
    title: String,
    author: String,
    voice: Option<String>,
) -> Result<()> {
    if !epub_file.exists() {
        anyhow::bail!("file not found: {}", epub_file.display());
    }
    let settings = Settings::load().unwrap_or_default();
    let conn = narrator::db::open(&db).context("failed to open job store")?;
    let store = JobStore::new(conn);

    if store.is_duplicate(library_book_id)? {
        anyhow::bail!("a non-failed job already exists for library_book_id {library_book_id}");
    }

    let job = store.enqueue(NewJob {
        library_book_id,
        title,
        author,
        voice: voice.unwrap_or(settings.voice),
        source_path: epub_file.to_string_lossy().to_string(),
        series: None,
        series_index: None,
    })?;

    println!("enqueued job {} (queue position {:?})", job.id, job.queue_position);
    Ok(())
}

async fn serve(db: PathBuf, output_root: PathBuf) -> Result<()> {
    let settings = Settings::load().unwrap_or_default();
    let conn = narrator::db::open(&db).context("failed to open job store")?;
    let job_store = Arc::new(JobStore::new(conn));
    let tts = Arc::new(TtsClient::new(&settings));
    let queue_state = Arc::new(QueueState::new());
    let events = Arc::new(EventBus::new());
    let output_writer = OutputWriter::new(output_root);

    let worker = Arc::new(Worker::new(job_store, tts, queue_state, events, settings, output_writer));

    let stop_handle = worker.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, stopping after the current chapter");
        stop_handle.stop();
    });

    worker.run().await;
    Ok(())
}

fn show_config() -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    println!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}
