//! SQLite connection pool and schema migrations for the metrics tables.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

use crate::error::{Error, Result};

/// Metrics table migrations, embedded at compile time.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pool of SQLite connections to the metrics database.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const DEFAULT_POOL_SIZE: u32 = 5;

/// How long a writer waits on a locked database before failing the record.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection settings applied whenever the pool hands out a connection.
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    busy_timeout: Duration,
}

impl ConnectionSettings {
    fn apply(self, conn: &mut SqliteConnection) -> QueryResult<()> {
        let busy_timeout_ms = self.busy_timeout.as_millis();
        diesel::sql_query(format!("PRAGMA busy_timeout = {busy_timeout_ms}")).execute(conn)?;
        diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;
        Ok(())
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionSettings {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        self.apply(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pool for the database at `database_url` with the default size.
///
/// # Errors
/// Returns [`Error::Connection`] if no connection can be opened.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    create_pool_with_size(database_url, DEFAULT_POOL_SIZE)
}

/// Pool holding at most `max_size` connections.
///
/// Every `:memory:` connection is its own database, so in-memory pools must
/// have a size of 1.
///
/// # Errors
/// Returns [`Error::Connection`] if no connection can be opened.
pub fn create_pool_with_size(database_url: &str, max_size: u32) -> Result<DbPool> {
    let settings = ConnectionSettings {
        busy_timeout: BUSY_TIMEOUT,
    };
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(settings))
        .build(ConnectionManager::<SqliteConnection>::new(database_url))
        .map_err(|e| Error::Connection(format!("{database_url}: {e}")))?;
    debug!(database = database_url, max_size, "SQLite pool opened");
    Ok(pool)
}

/// Bring the schema up to date. Already applied migrations are skipped.
///
/// # Errors
/// Returns [`Error::Connection`] if a migration fails.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Connection(format!("migration failed: {e}")))?;
    if !applied.is_empty() {
        debug!(count = applied.len(), "Applied metrics migrations");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::sql_types::{BigInt, Integer, Text};

    #[derive(QueryableByName)]
    struct Name {
        #[diesel(sql_type = Text)]
        name: String,
    }

    #[derive(QueryableByName)]
    struct BusyTimeout {
        #[diesel(sql_type = Integer)]
        timeout: i32,
    }

    #[derive(QueryableByName)]
    struct ForeignKeys {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[derive(QueryableByName)]
    struct Total {
        #[diesel(sql_type = BigInt)]
        total: i64,
    }

    fn metrics_tables(conn: &mut SqliteConnection) -> Vec<String> {
        diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name LIKE '%provider_%' ORDER BY name",
        )
        .load::<Name>(conn)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect()
    }

    #[test]
    fn migrations_create_metrics_tables() {
        let pool = create_pool_with_size(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        assert_eq!(
            metrics_tables(&mut conn),
            vec![
                "active_provider_markets",
                "calculated_provider_metrics",
                "historical_provider_metrics",
                "staging_provider_metrics",
            ]
        );
    }

    #[test]
    fn migrations_can_run_twice() {
        let pool = create_pool_with_size(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        let applied = diesel::sql_query("SELECT COUNT(*) AS total FROM __diesel_schema_migrations")
            .get_result::<Total>(&mut conn)
            .unwrap();
        assert_eq!(applied.total, 1);
    }

    #[test]
    fn pooled_connections_wait_on_locks_and_enforce_foreign_keys() {
        let pool = create_pool_with_size(":memory:", 1).unwrap();
        let mut conn = pool.get().unwrap();

        let busy = diesel::sql_query("PRAGMA busy_timeout")
            .get_result::<BusyTimeout>(&mut conn)
            .unwrap();
        let fks = diesel::sql_query("PRAGMA foreign_keys")
            .get_result::<ForeignKeys>(&mut conn)
            .unwrap();

        assert_eq!(busy.timeout, 5000);
        assert_eq!(fks.foreign_keys, 1);
    }
}
