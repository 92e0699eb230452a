use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tempfile::TempDir;

use clinical_kpi::adapter::outbound::sqlite::database::connection::{
    create_pool, run_migrations, DbPool,
};
use clinical_kpi::adapter::outbound::sqlite::SqliteMetricsStore;
use clinical_kpi::domain::{HistoricalMetricRecord, KpiSnapshot, ProviderId};
use clinical_kpi::port::outbound::store::MetricsStore;
use clinical_kpi::testkit::domain::historical;

#[derive(QueryableByName)]
struct RowCount {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

/// Temporary SQLite database file for integration tests.
pub struct TempDb {
    _dir: TempDir,
    path: PathBuf,
    pool: DbPool,
}

impl TempDb {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("clinical_kpi.db");
        let pool = create_pool(&path.display().to_string()).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");

        Self {
            _dir: dir,
            path,
            pool,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn store(&self) -> Arc<SqliteMetricsStore> {
        Arc::new(SqliteMetricsStore::new(self.pool.clone()))
    }

    /// Execute raw SQL, e.g. to install a failing trigger.
    pub fn execute(&self, sql: &str) {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(sql).execute(&mut conn).expect("execute sql");
    }

    pub fn count(&self, table: &str) -> i64 {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {table}"))
            .get_result::<RowCount>(&mut conn)
            .expect("count rows")
            .count
    }

    pub fn seed_historical(
        &self,
        provider: i64,
        kpis: KpiSnapshot,
        created_at: DateTime<Utc>,
    ) -> HistoricalMetricRecord {
        self.store()
            .in_transaction(|tx| tx.insert_historical(&historical(provider, kpis, created_at)))
            .expect("seed historical metric")
    }

    pub fn historical_count(&self, provider: i64) -> usize {
        self.store()
            .historical_for_provider(ProviderId::new(provider))
            .expect("load historical metrics")
            .len()
    }
}
