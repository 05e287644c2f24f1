use std::{
    fmt, fs,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use sqlx::{
    Connection, Sqlite, Transaction,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::error::{CrmError, CrmResult};

const MAX_CONNECTIONS: u32 = 5;

/// Pool over the store's SQLite file. The lock lets [`StoreState::close`]
/// wait for every borrowed connection before checkpointing.
pub(super) struct StoreState {
    db_file: PathBuf,
    pool: RwLock<SqlitePool>,
}

impl fmt::Debug for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreState").field("db_file", &self.db_file).finish()
    }
}

fn connect_options(db_file: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
}

fn ensure_parent_dir(db_file: &Path) -> CrmResult<()> {
    let Some(parent) = db_file.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent)
        .map_err(|e| CrmError::Malformed(format!("cannot create directory {}: {e}", parent.display())))
}

impl StoreState {
    /// Opens (or creates) the database file and brings its schema up to date.
    pub(super) async fn new<P: AsRef<Path>>(db_file: P) -> CrmResult<Self> {
        let db_file = db_file.as_ref().to_path_buf();
        ensure_parent_dir(&db_file)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(connect_options(&db_file))
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(db_file = %db_file.display(), "local store opened");

        Ok(Self {
            db_file,
            pool: RwLock::new(pool),
        })
    }

    /// A pooled connection. The pool's read lock is held until the returned
    /// guard is dropped.
    pub(super) async fn conn(&self) -> CrmResult<StoreConn<'_>> {
        let pool = self.pool.read().await;
        let conn = pool.acquire().await?;
        Ok(StoreConn { _pool: pool, conn })
    }

    /// Checkpoints the WAL into the main file and closes the pool.
    pub(super) async fn close(&self) -> CrmResult<()> {
        let pool = self.pool.write().await;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool)
            .await?;
        pool.close().await;
        tracing::debug!(db_file = %self.db_file.display(), "local store closed");
        Ok(())
    }
}

pub(super) struct StoreConn<'a> {
    _pool: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl Deref for StoreConn<'_> {
    type Target = PoolConnection<Sqlite>;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for StoreConn<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl StoreConn<'_> {
    pub(super) async fn begin_transaction(&mut self) -> CrmResult<Transaction<'_, Sqlite>> {
        Ok(self.conn.begin().await?)
    }
}
