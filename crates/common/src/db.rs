use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

/// Pool size. SQLite serializes writes anyway; a handful of connections
/// covers the announce cycle and the update loop reading concurrently.
const MAX_CONNECTIONS: u32 = 5;

/// Create a SQLite connection pool, creating the database file on first run.
///
/// WAL keeps readers unblocked while an announcement is being recorded, and
/// `synchronous = FULL` makes a committed ledger row survive power loss; the
/// ledger is the only thing standing between the bot and double-announcing.
pub async fn create_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::info!(database_url, "Connected to SQLite");
    Ok(pool)
}
