//! clio-restore: restore a FriendFeed archive into FreeFeed.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clio_core::ArchiveSource;
use clio_db::{log_pool_metrics, Database};
use clio_restore::app::{Restorer, Services};
use clio_restore::archive::ZipArchiveSource;
use clio_restore::config::{Cli, DateFilter, RestoreConfig};
use clio_restore::fetch::HttpFetcher;
use clio_restore::storage::build_store;
use clio_restore::transcoder::GmTranscoder;

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // LOG_FILE   - path to log file (optional, enables file logging)
    // RUST_LOG   - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clio_restore=info,clio_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = Path::new(path);
        let dir = path.parent().unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("clio-restore.log");
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RestoreConfig::from_env()?;

    let source: Arc<dyn ArchiveSource> = Arc::new(ZipArchiveSource::open(&cli.archive)?);
    let mp3_source = match &config.mp3_zip {
        Some(path) => {
            info!(path = %path.display(), "Using MP3 archive");
            Some(Arc::new(ZipArchiveSource::open(path)?) as Arc<dyn ArchiveSource>)
        }
        None => None,
    };

    let db = Arc::new(Database::connect(&config.database_url).await?);
    log_pool_metrics(&db.pool);

    let services = Services {
        fetcher: Arc::new(HttpFetcher::new(config.fetch_timeout)?),
        store: Arc::from(build_store(&config.store)?),
        transcoder: Arc::new(GmTranscoder::new(config.transcoder.clone())),
        attachments_url: config.attachments_url.clone(),
    };

    let restorer = Restorer::prepare(
        db,
        source,
        mp3_source,
        services,
        DateFilter::new(cli.from_date, cli.to_date),
    )
    .await?;
    restorer.run().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    info!(archive = %cli.archive.display(), "Starting clio-restore");
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Restore aborted");
            ExitCode::FAILURE
        }
    }
}
