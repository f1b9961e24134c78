//! `pstudio-watcher` -- headless job watcher daemon.
//!
//! Observes every generation job stored for one account scope, polls the
//! studio server until each job finishes, and logs one notification per
//! finished job.
//!
//! # Environment variables
//!
//! | Variable                  | Default                 | Description                          |
//! |---------------------------|-------------------------|--------------------------------------|
//! | `PS_API_BASE_URL`         | `http://localhost:8000` | Studio server root                   |
//! | `PS_POLL_INTERVAL_MS`     | `2000`                  | Milliseconds between status checks   |
//! | `PS_REQUEST_TIMEOUT_SECS` | `15`                    | Per-request HTTP timeout             |
//! | `PS_INBOX_CAPACITY`       | `4`                     | Active notifications kept            |
//! | `PS_POINTER_STORE_PATH`   | --                      | Pointer file; unset keeps memory only|
//! | `PS_ACCOUNT_SCOPE`        | `guest`                 | Account whose jobs are observed      |
//! | `PS_LOG_JSON`             | `false`                 | JSON-lines log output                |

use pstudio_jobs::TrackerConfig;
use pstudio_watcher::daemon::Daemon;
use pstudio_watcher::logging;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = TrackerConfig::from_env().unwrap_or_else(|e| {
        logging::init(false);
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    logging::init(config.log_json);

    tracing::info!(
        api_base_url = %config.api_base_url,
        scope = %config.account_scope,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        pointer_store = ?config.pointer_store_path,
        "Starting pstudio-watcher",
    );

    let daemon = Daemon::new(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build status client");
        std::process::exit(1);
    });

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    daemon.run(cancel).await;
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
