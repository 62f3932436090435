use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use album_bot::{run_upload_notifier, BotHandler, Config, TelegramTransport};
use album_core::{AlbumPipeline, SqliteRepository};
use database::Database;
use telegram_client::TelegramClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "album_bot=info,album_core=info,telegram_client=info,database=info";

const NOTIFIER_DRAIN: Duration = Duration::from_secs(5);

/// Create the parent directory of a file-backed SQLite URL.
fn ensure_db_dir(sqlite_url: &str) -> std::io::Result<()> {
    let Some(rest) = sqlite_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration: {:?}", config);

    let client = TelegramClient::connect(config.bot_config()).await?;
    let me = client.get_me().await?;
    let bot_username = me.username.clone().ok_or("bot account has no username")?;
    info!("Connected as @{} ({})", bot_username, me.id);

    ensure_db_dir(&config.sqlite_url)?;
    let db = Database::connect(&config.sqlite_url).await?;
    db.migrate().await?;

    let repo = Arc::new(SqliteRepository::new(db.clone()));
    let transport = Arc::new(TelegramTransport::new(
        client.clone(),
        config.archive_chat.clone(),
    ));

    let (pipeline, events) = AlbumPipeline::new(repo, transport, config.core_config());
    let pipeline = Arc::new(pipeline);
    let sweeper = match pipeline.start().await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start album pipeline: {}", e);
            return Err(e.into());
        }
    };

    let notifier = tokio::spawn(run_upload_notifier(
        client.clone(),
        events,
        bot_username.clone(),
    ));

    let handler = Arc::new(BotHandler::new(
        client,
        Arc::clone(&pipeline),
        Arc::clone(&config),
        bot_username,
    ));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    let result = handler.run_with_shutdown(shutdown).await;

    sweeper.abort();
    drop(pipeline);
    // Give the notifier a moment to report uploads finalized by the flush
    if tokio::time::timeout(NOTIFIER_DRAIN, notifier).await.is_err() {
        info!("Upload notifier still busy, exiting anyway");
    }
    db.close().await;
    info!("Album bot stopped");

    result.map_err(Into::into)
}
