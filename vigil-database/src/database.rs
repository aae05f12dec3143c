use std::sync::Arc;

use sqlx::{SqlitePool, migrate::Migrator};
use tokio::sync::{Mutex, MutexGuard};

/// Compile-time discovered SQLx migrations for the `vigil-database` crate.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Shared database handle passed across crates.
///
/// Carries the connection pool plus a cross-task write lock: SQLite has no
/// advisory locks, so compound read-then-write sequences (the escalation
/// count + insert) serialize through `write_guard` instead.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Create a database handle from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Expose the underlying pool for query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Serialize a compound read-then-write sequence against all other
    /// holders of this handle. Individual statements do not need this;
    /// SQLite already applies them atomically.
    pub async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
