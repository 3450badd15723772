mod config;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weago_chat::{ConversationService, RecordTemplate, WriteBack, run_write_back_loop};
use weago_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weago=debug,weago_chat=debug,weago_db=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let chats = Arc::new(Database::open(&config.chat_db_path)?);
    chats.ensure_conversation_table()?;
    let stored = chats.conversation_ids()?.len();
    info!("{} stored conversations, loaded on first message", stored);

    // Settings tables are created per chat on first use; opening the file
    // here makes a bad path fail at startup instead of on the first message.
    Database::open(&config.settings_db_path)?;

    let template = match &config.persona {
        Some(persona) => RecordTemplate::with_persona(persona.clone()),
        None => RecordTemplate::default(),
    };
    let service = Arc::new(ConversationService::new(chats, template));
    let write_back = Arc::new(WriteBack::new(service.clone()));

    let shutdown = CancellationToken::new();
    let flusher = tokio::spawn(run_write_back_loop(
        write_back.clone(),
        config.flush_interval,
        shutdown.clone(),
    ));

    info!(
        "Weago ready (chats: {}, settings: {}, text budget: {} chars)",
        config.chat_db_path.display(),
        config.settings_db_path.display(),
        config.max_turn_chars
    );

    shutdown_signal().await;
    shutdown.cancel();
    if let Err(e) = flusher.await {
        warn!("Write-back loop ended abnormally: {}", e);
    }

    // Pick up turns appended after the last tick.
    let report = tokio::task::spawn_blocking(move || write_back.flush_once()).await?;
    match report {
        Some(report) if report.failed > 0 => warn!(
            "Final flush: saved {} conversations, {} failed",
            report.saved, report.failed
        ),
        Some(report) => info!("Final flush: saved {} conversations", report.saved),
        None => warn!("Final flush skipped, another pass was still running"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
