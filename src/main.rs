//! Process bootstrap: logging, environment validation, listener.

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ttt_relay::config::RelayConfig;
use ttt_relay::server::{router, AppState};

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("starting server");

    let state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        }
    };

    info!("listening on {}", config.listen_addr);
    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}

/// Console plus `ttt.log` file output, level taken from `LOG_LEVEL` (or
/// `RUST_LOG`), defaulting to `info`.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::never(".", "ttt.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}
