use std::path::PathBuf;

use quizforge::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, PartialEq)]
struct Settings {
    bind: String,
    bank: Option<PathBuf>,
}

/// Reads `PORT` and `QUIZ_BANK`. Empty values count as unset.
fn settings(port: Option<String>, bank: Option<String>) -> Result<Settings, String> {
    let port = match port.filter(|p| !p.trim().is_empty()) {
        Some(p) => p.trim().parse::<u16>().map_err(|e| format!("invalid PORT {p:?}: {e}"))?,
        None => DEFAULT_PORT,
    };
    Ok(Settings {
        bind: format!("0.0.0.0:{port}"),
        bank: bank.filter(|b| !b.trim().is_empty()).map(PathBuf::from),
    })
}

fn load_bank(path: Option<&PathBuf>) -> Result<QuestionBank, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(QuestionBank::default());
    };
    let json = std::fs::read_to_string(path)?;
    let bank = QuestionBank::from_json(&json)?;
    tracing::info!(path = %path.display(), questions = bank.len(), "loaded question bank");
    Ok(bank)
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = settings(std::env::var("PORT").ok(), std::env::var("QUIZ_BANK").ok())?;
    let bank = load_bank(settings.bank.as_ref())?;

    let server = QuizServer::builder()
        .bind(&settings.bind)
        .bank(bank)
        .build()
        .await?;
    tracing::info!(addr = %settings.bind, "quiz server listening");

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on ctrl-c, or on SIGTERM where the platform has one.
///
/// A signal that cannot be listened for is logged and then ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("ctrl-c received"),
            Err(e) => {
                tracing::error!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("SIGTERM received");
            }
            Err(e) => {
                tracing::error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
