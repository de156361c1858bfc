//! Database Connection Management
//!
//! This module provides the catalog's connection handling and schema
//! initialization using libsql.
//!
//! # Architecture
//!
//! - **Explicit handle**: the service layer receives an `Arc<DatabaseService>`;
//!   there is no process-wide engine state
//! - **WAL mode**: Write-Ahead Logging so concurrent readers never block on
//!   a writer
//! - **Foreign keys**: enabled per connection; the cascade invariants
//!   (building -> organizations -> activity links) depend on it
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS`, safe to run on
//!   every startup
//!
//! # Connection pattern
//!
//! Use `connect_with_timeout()` in async code. It hands out a fresh
//! connection with a busy timeout applied, so concurrent writers wait and
//! retry instead of failing immediately with `SQLITE_BUSY`, and with
//! foreign-key enforcement switched on (SQLite scopes that pragma to the
//! connection, not the file).

use crate::config::CatalogConfig;
use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service managing the libsql handle and schema.
///
/// # Examples
///
/// ```no_run
/// use orgatlas_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/orgatlas.db")).await?;
///     let conn = db.connect_with_timeout().await?;
///     # let _ = conn;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    /// Busy timeout applied to every connection, milliseconds
    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` with default settings
    /// and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created,
    /// the connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::open(db_path, CatalogConfig::default().busy_timeout_ms).await
    }

    /// Open the database described by a [`CatalogConfig`].
    pub async fn from_config(config: &CatalogConfig) -> Result<Self, DatabaseError> {
        Self::open(config.db_path.clone(), config.busy_timeout_ms).await
    }

    async fn open(db_path: PathBuf, busy_timeout_ms: u64) -> Result<Self, DatabaseError> {
        // Only checkpoint the WAL for databases created by this call; for
        // existing files the checkpoint is unnecessary overhead.
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        tracing::info!(
            path = %service.db_path.display(),
            "catalog database initialized"
        );

        Ok(service)
    }

    /// Execute a PRAGMA statement.
    ///
    /// PRAGMA statements return rows, so query() must be used instead of
    /// execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Get a connection configured for async use.
    ///
    /// Applies the busy timeout (concurrent writers wait instead of failing
    /// with `SQLITE_BUSY`) and enables foreign-key enforcement, which SQLite
    /// scopes per connection.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.db.connect().map_err(DatabaseError::LibsqlError)?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON").await?;

        Ok(conn)
    }

    /// Initialize database schema and configuration.
    ///
    /// Creates tables and indexes with `CREATE TABLE IF NOT EXISTS`, so the
    /// call is idempotent and safe on every startup.
    ///
    /// # Schema
    ///
    /// - `activities`: taxonomy nodes; `path` UNIQUE doubles as the ordered
    ///   index for descendant range scans, `depth` supports exact-depth
    ///   sibling lookups
    /// - `buildings`: unique address plus coordinates
    /// - `organizations`: unique title, required owning building with
    ///   cascade delete
    /// - `org_activities`: (org, activity) link pairs, composite primary
    ///   key, cascade delete with either parent
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                depth INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create activities table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS buildings (
                id TEXT PRIMARY KEY,
                address TEXT NOT NULL UNIQUE,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create buildings table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL UNIQUE,
                phones TEXT NOT NULL DEFAULT '[]',
                building_id TEXT NOT NULL
                    REFERENCES buildings(id) ON DELETE CASCADE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create organizations table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS org_activities (
                org_id TEXT NOT NULL
                    REFERENCES organizations(id) ON DELETE CASCADE,
                act_id TEXT NOT NULL
                    REFERENCES activities(id) ON DELETE CASCADE,
                PRIMARY KEY (org_id, act_id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create org_activities table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        // Flush the schema to disk for newly created databases so rapid
        // open/reopen sequences in tests never observe missing tables.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Exact-depth sibling lookup (root/child resolution by label)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_activities_depth_label
             ON activities(depth, label)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_activities_depth_label': {}",
                e
            ))
        })?;

        // Organizations per building (cascade checks, by-building listing)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_organizations_building
             ON organizations(building_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_organizations_building': {}",
                e
            ))
        })?;

        // Reverse direction of the link table (organizations by activity)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_org_activities_act
             ON org_activities(act_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_org_activities_act': {}",
                e
            ))
        })?;

        // Latitude band prefilter for radius queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_buildings_latitude
             ON buildings(latitude)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_buildings_latitude': {}",
                e
            ))
        })?;

        Ok(())
    }
}

/// Begin an IMMEDIATE transaction on the connection.
///
/// IMMEDIATE takes the write lock up front, so a multi-step mutation never
/// observes another writer's commits between its own steps.
pub(crate) async fn begin_immediate(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e)))?;
    Ok(())
}

/// Commit the open transaction.
pub(crate) async fn commit(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    conn.execute("COMMIT", ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e)))?;
    Ok(())
}

/// Roll back the open transaction, best effort.
///
/// Used on error paths where the original failure is the error worth
/// surfacing; a rollback failure only gets a log line.
pub(crate) async fn rollback(conn: &libsql::Connection) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        tracing::warn!("Failed to roll back transaction: {}", e);
    }
}
