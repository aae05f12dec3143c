use std::env;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vigil_core::ModerationConfig;
use vigil_core::time::now_unix_secs;
use vigil_database::{Database, MIGRATOR};
use vigil_moderation::ModerationManager;

const DEFAULT_DATABASE_URL: &str = "sqlite://vigil.db";
const DEFAULT_TICK_SECONDS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry().with(fmt_layer).init();

    // Load the .env file
    dotenvy::dotenv().ok();

    let config = ModerationConfig::from_env()?;
    info!(
        max_messages = config.max_messages,
        window_seconds = config.window_seconds,
        escalation_tiers = config.escalation_durations.len(),
        admins = config.admin_ids.len(),
        whitelisted = config.whitelisted_ids.len(),
        "Moderation config loaded."
    );

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let connect_options: SqliteConnectOptions = database_url.parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options.create_if_missing(true))
        .await?;
    info!("SQLite connection established.");

    MIGRATOR.run(&pool).await?;
    info!("Database migrations applied.");

    let manager = ModerationManager::new(config, Database::new(pool))?;

    // Transport adapters embed the manager directly; the daemon's only
    // standing duty is the maintenance cadence.
    let tick_seconds = env_u64("MAINTENANCE_TICK_SECONDS", DEFAULT_TICK_SECONDS);
    let mut tick = tokio::time::interval(Duration::from_secs(tick_seconds.max(1)));
    info!(tick_seconds, "Vigil is awake; maintenance loop running.");

    loop {
        tick.tick().await;
        let report = manager.run_due_maintenance(now_unix_secs()).await;
        if !report.errors.is_empty() {
            warn!(
                failures = report.errors.len(),
                "maintenance pass had failures; will retry on the next tick"
            );
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}
