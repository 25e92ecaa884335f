//! GarageBuddy engine daemon.
//!
//! Initializes the database and runs the two background sweeps with the
//! tracing-backed delivery. In a full deployment the chat front-end links
//! against the library, supplies its own [`garage_buddy::notify::Notifier`]
//! and drives the `core` operations from its conversation handlers; this
//! binary is the engine running standalone.

use dotenvy::dotenv;
use garage_buddy::{
    config, errors::Result, jobs::scheduler, notify::LogNotifier,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load engine settings (config.toml, or defaults)
    let settings = config::settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load engine settings: {e}"))?;
    info!("Engine settings loaded.");

    // 4. Initialize database
    let db = config::database::create_connection()
        .await
        .inspect(|_| info!("Database connected."))
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database tables ready."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Spawn the background sweeps
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let notification_task = scheduler::spawn_notification_scheduler(
        db.clone(),
        LogNotifier,
        settings.clone(),
        shutdown_rx.clone(),
    );
    let reminder_task = scheduler::spawn_mileage_reminder_sweep(
        db.clone(),
        LogNotifier,
        settings,
        shutdown_rx,
    );

    // 6. Run until interrupted, then let the current sweep finish
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");
    let _ = shutdown_tx.send(true);

    let _ = notification_task.await;
    let _ = reminder_task.await;
    info!("Engine stopped.");

    Ok(())
}
