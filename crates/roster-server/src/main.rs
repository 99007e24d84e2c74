//! `roster-server` entry point.
//!
//! Usage: `roster-server [CONFIG]`. The config path falls back to
//! `ROSTER_CONFIG_PATH`, then `config.toml`.

use roster_server::config::{self, Config, LoggingConfig};
use roster_server::{app, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Picks the config file and names where the choice came from.
fn config_location() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();

    if let Some(path) = std::env::args().nth(1).filter(non_blank) {
        (path, "argument")
    } else if let Some(path) = std::env::var("ROSTER_CONFIG_PATH").ok().filter(non_blank) {
        (path, "ROSTER_CONFIG_PATH")
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), "default")
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Prepares the connection manager and brings the schema up to date.
fn prepare_database(config: &Config) -> roster_db::Database {
    let db = roster_db::Database::open(&config.database.path, config.database.runtime_settings())
        .expect("unusable [database] settings");

    let conn = db
        .acquire()
        .expect("database unreachable at startup, cannot migrate");
    let applied = roster_db::run_migrations(&conn).expect("schema migration failed");
    if applied > 0 {
        tracing::info!(count = applied, "schema migrated");
    }

    db
}

#[tokio::main]
async fn main() {
    let (config_path, chosen_by) = config_location();
    let config = config::load_config(Some(config_path.as_str())).expect("cannot load configuration");

    init_tracing(&config.logging);
    tracing::info!(path = %config_path, chosen_by, "configuration loaded");

    let db = prepare_database(&config);
    if config.admin.token.is_none() {
        tracing::warn!("admin.token unset: /db/tables and /api/tables are public");
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot listen on {addr}: {e}"));
    tracing::info!(%addr, "roster listening");

    axum::serve(listener, app(AppState::new(db, &config.admin)))
        .with_graceful_shutdown(stop_requested())
        .await
        .expect("http server failed");

    tracing::info!("roster stopped");
}

/// Resolves on Ctrl+C, or on SIGTERM where that exists.
async fn stop_requested() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down, draining requests");
}
