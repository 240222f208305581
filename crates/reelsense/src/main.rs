use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reelsense::analysis::{Analyzer, OpenAiClient};
use reelsense::config::{load_config, Config};
use reelsense::db::{default_database_path, Database};
use reelsense::error::{ConfigError, IngestError};
use reelsense::ingest::Ingestor;
use reelsense::media::{FfmpegToolchain, MediaToolchain};
use reelsense::pipeline::{Pipeline, PipelineSettings};
use reelsense::queue::JobQueue;
use reelsense::sanitize::{redact_path, redact_url};
use reelsense::secrets::{expand_home, resolve_api_key};
use reelsense::transcription::{Transcriber, WhisperClient};
use reelsense::worker::{PoolConfig, RetryPolicy, WorkerPool};

/// User id recorded for files registered from the command line.
const CLI_USER_ID: i64 = 0;

#[derive(Parser)]
#[command(
    name = "reelsense",
    version,
    about = "Extracts cover text and transcripts from uploaded videos and reports their sentiment"
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "reelsense.json")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// On Ctrl-C, finish every queued video instead of cancelling
    #[arg(long)]
    drain: bool,

    /// Video files to register at startup
    files: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(format: LogFormat) {
    // Forward `log` records (database layer) into tracing.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    if let Err(e) = result {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}

async fn run(cli: Cli) -> reelsense::Result<()> {
    let Cli {
        config: config_path,
        drain,
        files,
        ..
    } = cli;
    info!("Starting reelsense v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&config_path)?;
    info!("Configuration loaded from {}", redact_path(&config_path));

    let db_path = match config.database_path.as_deref() {
        Some(p) => PathBuf::from(expand_home(p)),
        None => default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "database_path is not set and no home directory was found".to_string(),
        })?,
    };
    let db = Database::open(&db_path)?;

    // A missing key is a startup error, never a per-job one.
    let api_key = resolve_api_key(&config.analysis)?;

    let media: Arc<dyn MediaToolchain> = Arc::new(FfmpegToolchain::new(&config.media));
    let analyzer: Arc<dyn Analyzer> = Arc::new(OpenAiClient::new(&config.analysis, api_key)?);
    let transcriber = connect_transcriber(&config).await?;

    let pipeline = Arc::new(Pipeline::new(
        db.clone(),
        media.clone(),
        transcriber,
        analyzer,
        PipelineSettings::from_config(&config),
    ));

    let queue = JobQueue::new(config.queue_capacity);
    let pool = WorkerPool::start(
        queue.clone(),
        pipeline,
        PoolConfig {
            worker_count: config.worker_count,
            retry: RetryPolicy::from_config(&config.retry),
        },
    );

    let ingestor = Ingestor::new(db, queue, media, config.max_file_size)
        .with_upload_directory(expand_home(&config.upload_directory));
    let intake = tokio::spawn(async move {
        match ingestor.recover().await {
            Ok(0) => {}
            Ok(count) => info!(count, "Re-enqueued unfinished jobs"),
            Err(e) => error!(error = %e, "Recovery failed"),
        }
        for path in files {
            match ingestor.import_file(CLI_USER_ID, &path).await {
                Ok(video_id) => info!(video_id, file = %redact_path(&path), "Queued"),
                Err(IngestError::QueueClosed) => {
                    warn!("Queue closed, remaining files are not registered");
                    break;
                }
                Err(e) => error!(file = %redact_path(&path), error = %e, "Skipping file"),
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }

    if drain {
        info!("Ctrl-C received, draining queue");
        pool.drain().await;
    } else {
        info!("Ctrl-C received, shutting down");
        pool.shutdown();
        pool.wait().await;
    }

    if let Err(e) = intake.await {
        error!("Intake task panicked: {}", e);
    }

    info!("Stopped");
    Ok(())
}

/// Builds the transcription client and checks the service once. A failed
/// check disables transcription until restart.
async fn connect_transcriber(config: &Config) -> reelsense::Result<Option<Arc<dyn Transcriber>>> {
    if !config.transcription.enabled {
        info!("Transcription disabled by configuration");
        return Ok(None);
    }

    let client = WhisperClient::new(&config.transcription)?;
    match client.health_check().await {
        Ok(()) => {
            info!(url = %redact_url(client.base_url()), "Transcription service available");
            Ok(Some(Arc::new(client)))
        }
        Err(e) => {
            warn!(
                url = %redact_url(client.base_url()),
                error = %e,
                "Transcription service unavailable, transcripts disabled"
            );
            Ok(None)
        }
    }
}
