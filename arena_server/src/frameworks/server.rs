// Framework bootstrap for the arena server runtime.

use crate::frameworks::config::{self, ServerSettings};
use crate::frameworks::shutdown::{spawn_signal_listener, wait_for_shutdown};
use crate::interface_adapters::net::{health_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::AppRegistry;

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc, sync::atomic::AtomicU64};
use tokio::sync::watch;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves one session on `listener` until `shutdown` flips to true.
///
/// The session task can flip `shutdown` itself (inactivity), which stops the server too.
pub async fn run(
    listener: tokio::net::TcpListener,
    settings: ServerSettings,
    apps: &AppRegistry,
    shutdown: watch::Sender<bool>,
) -> Result<()> {
    let address = listener.local_addr()?;

    let manifest = apps
        .get(&settings.session.app_id)
        .map_err(std::io::Error::other)?;
    let session = (manifest.launch)(settings.session.clone(), shutdown.clone());
    tracing::info!(
        app_id = manifest.id,
        app_name = manifest.name,
        session_id = %settings.session.session_id,
        "session launched"
    );

    let state = Arc::new(AppState {
        session_id: Arc::from(settings.session.session_id.as_str()),
        app_id: Arc::from(manifest.id),
        events_tx: session.events_tx,
        status_rx: session.status_rx,
        shutdown_rx: shutdown.subscribe(),
        next_conn_id: Arc::new(AtomicU64::new(1)),
        outbound_capacity: config::OUTBOUND_CHANNEL_CAPACITY,
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.subscribe()))
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    // Make sure the session winds down even when serving failed.
    shutdown.send_replace(true);
    if let Err(e) = session.task.await {
        tracing::error!(error = %e, "session task failed");
    }
    tracing::info!("server stopped");
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let settings = config::server_settings();
    let apps = AppRegistry::with_builtin_apps();
    tracing::debug!(apps = ?apps.ids(), "apps registered");

    let address = SocketAddr::from((settings.host, settings.port));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    let (shutdown_tx, _shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx.clone());

    run(listener, settings, &apps, shutdown_tx).await
}
