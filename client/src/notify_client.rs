use std::sync::Arc;

use anyhow::{Context, Result};
use lib_realtime::ingestors::WebSocketConnector;
use lib_realtime::retrieve::RestBackend;
use lib_realtime::session::SessionFile;
use lib_realtime::{ConnectOutcome, Credential, RealtimeClient};
use tokio::signal;

mod client_logic;
use client_logic::{config, logger, monitor};

/// Explicit token first, then the persisted session.
fn resolve_credential(config: &config::Config) -> Result<Credential> {
    if let Some(credential) = config.token.clone().and_then(Credential::new) {
        log::info!("Using the token from the command line / environment.");
        return Ok(credential);
    }

    let path = match config.session_path.clone() {
        Some(path) => path,
        None => SessionFile::default_path().context("Could not determine the platform data directory")?,
    };
    let session = SessionFile::load(&path)?
        .with_context(|| format!("No session at {}; sign in first or pass --token", path.display()))?;

    if let Some(user) = &session.user {
        log::info!("Signed in as {} ({})", user.name.as_deref().unwrap_or(&user.id), user.role.as_deref().unwrap_or("unknown role"));
    }
    session
        .credential()
        .with_context(|| format!("Session at {} holds an empty token", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    let log_path = logger::setup_logging(&config.log_dir(), config.log_level())?;
    log::info!("Logging to {}", log_path.display());

    let realtime = config.to_realtime();
    realtime.validate()?;
    let credential = resolve_credential(&config)?;

    let backend = Arc::new(RestBackend::new(&realtime.api_base_url, &credential)?);
    let connector = Arc::new(WebSocketConnector::new(realtime.socket_url.clone()));
    let mut client = RealtimeClient::init(realtime, connector, backend)?;

    let event_log = monitor::attach_event_log(client.registry());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor::run(
        client.connection().clone(),
        client.notifications().watch(),
        shutdown_tx.subscribe(),
    ));

    match client.login(credential.expose()).await {
        ConnectOutcome::Started => log::info!("Connecting..."),
        other => log::warn!("Login did not start a connection: {:?}", other),
    }

    match client.notifications().server_unread_count().await {
        Ok(count) => log::info!("Server reports {} unread notification(s).", count),
        Err(e) => log::warn!("{}", e),
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Could not listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    let _ = shutdown_tx.send(());
    for subscription in event_log {
        subscription.unsubscribe();
    }
    client.teardown().await;
    let _ = monitor_handle.await;

    log::info!("Shutdown complete.");
    Ok(())
}
