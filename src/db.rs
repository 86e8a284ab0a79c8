// task_manager/src/db.rs
use crate::config::AppConfig;
use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

// an R2D2 connection pool
pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection pragmas. SQLite keeps both settings per connection, so they are
/// applied every time the pool opens a new one.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Initialize the database pool.
pub fn init_pool(config: &AppConfig) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let builder = r2d2::Pool::builder().connection_customizer(Box::new(ConnectionOptions {
        busy_timeout: BUSY_TIMEOUT,
    }));

    // Every `:memory:` connection is its own database: keep exactly one alive forever.
    let builder = if config.is_in_memory() {
        builder
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        builder.max_size(config.pool_size)
    };

    builder
        .build(manager)
        .with_context(|| format!("failed to create database pool for {}", config.database_url))
}

/// Applies any migration embedded in the binary that the database has not seen yet.
pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut pooled = pool
        .get()
        .context("failed to get a connection for migrations")?;
    let conn: &mut SqliteConnection = &mut pooled;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run database migrations: {e}"))?;
    tracing::info!(count = applied.len(), "database migrations applied");
    Ok(())
}
