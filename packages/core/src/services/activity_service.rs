//! Activity Service - Hierarchy Store Operations
//!
//! Owns the activity taxonomy: label lookups at exact depth, idempotent
//! chain creation, and descendant queries over the materialized path index.
//!
//! # Chain creation
//!
//! `create_chain(["Food", "Groceries", "Dairy"])` walks the labels in
//! order, reusing each node that already exists at the right position and
//! creating the ones that do not, all inside one IMMEDIATE transaction.
//! Resubmitting the same chain creates nothing and returns the same leaf.
//!
//! The `UNIQUE(path)` constraint is the backstop for the lookup-then-insert
//! race: a loser whose insert is rejected re-reads the node at that path
//! and adopts it when the labels agree. When they disagree the two labels
//! normalize to the same token - a codec collision - and the chain fails
//! with a conflict rather than conflating distinct activities.

use crate::db::{self, DatabaseError, DatabaseService};
use crate::models::time::parse_timestamp;
use crate::models::{normalize_label, ActivityNode, ActivityPath, ValidationError};
use crate::services::error::{CatalogError, CatalogResult};
use libsql::params::IntoParams;
use libsql::Connection;
use std::sync::Arc;
use uuid::Uuid;

const ACTIVITY_COLUMNS: &str = "id, label, path, depth, created_at";

/// Service for taxonomy operations.
///
/// # Examples
///
/// ```no_run
/// use orgatlas_core::db::DatabaseService;
/// use orgatlas_core::services::ActivityService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/orgatlas.db")).await?);
///     let activities = ActivityService::new(db);
///
///     let dairy = activities
///         .create_chain(&["Food", "Groceries", "Dairy"])
///         .await?;
///     assert_eq!(dairy.depth, 3);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ActivityService {
    /// Shared database handle
    db: Arc<DatabaseService>,
}

impl ActivityService {
    /// Create a new ActivityService over a database handle.
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Find a node with the given label at depth 1 (no parent).
    pub async fn find_root_node(&self, label: &str) -> CatalogResult<Option<ActivityNode>> {
        let conn = self.db.connect_with_timeout().await?;
        find_root_in(&conn, label).await
    }

    /// Among the strict children of `parent`, find one whose label matches.
    ///
    /// Filters on exact depth: a matching label deeper in the subtree is
    /// not a child and is not returned.
    pub async fn find_child_node(
        &self,
        parent: &ActivityNode,
        label: &str,
    ) -> CatalogResult<Option<ActivityNode>> {
        let conn = self.db.connect_with_timeout().await?;
        find_child_in(&conn, parent, label).await
    }

    /// Look up a node by id.
    pub async fn get_node(&self, id: &str) -> CatalogResult<Option<ActivityNode>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!("SELECT {} FROM activities WHERE id = ?", ACTIVITY_COLUMNS);
        query_one(&conn, &sql, [id]).await
    }

    /// All nodes carrying the given label, anywhere in the tree.
    ///
    /// Labels are only unique among siblings, so this can return several
    /// nodes; they come back in path order.
    pub async fn find_nodes_by_label(&self, label: &str) -> CatalogResult<Vec<ActivityNode>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {} FROM activities WHERE label = ? ORDER BY path",
            ACTIVITY_COLUMNS
        );
        query_all(&conn, &sql, [label]).await
    }

    /// The node itself plus every strict descendant, in path order.
    pub async fn descendants_of(&self, node: &ActivityNode) -> CatalogResult<Vec<ActivityNode>> {
        let conn = self.db.connect_with_timeout().await?;
        descendants_in(&conn, node).await
    }

    /// Resolve a chain of labels from the root, creating missing nodes.
    ///
    /// Idempotent: the same chain always resolves to the same leaf and a
    /// resubmission creates nothing. Partial chains are completed - labels
    /// that already exist at their position are reused and the remainder is
    /// created beneath them. Safe to retry on a `Store` error: the
    /// transaction either committed every node of the chain or none.
    ///
    /// # Errors
    ///
    /// - `Validation` - empty chain, or a label normalizing to an empty token
    /// - `Conflict` - a label collides with a differently-labeled node at
    ///   the same path (token collision)
    pub async fn create_chain(&self, labels: &[&str]) -> CatalogResult<ActivityNode> {
        if labels.is_empty() {
            return Err(ValidationError::EmptyChain.into());
        }

        let conn = self.db.connect_with_timeout().await?;
        db::begin_immediate(&conn).await?;

        match self.create_chain_in(&conn, labels).await {
            Ok(leaf) => {
                db::commit(&conn).await?;
                tracing::debug!(path = %leaf.path, "activity chain resolved");
                Ok(leaf)
            }
            Err(e) => {
                db::rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn create_chain_in(
        &self,
        conn: &Connection,
        labels: &[&str],
    ) -> CatalogResult<ActivityNode> {
        let mut parent: Option<ActivityNode> = None;

        for &label in labels {
            let existing = match &parent {
                None => find_root_in(conn, label).await?,
                Some(p) => find_child_in(conn, p, label).await?,
            };

            let node = match existing {
                Some(node) => node,
                None => self.insert_node(conn, parent.as_ref(), label).await?,
            };
            parent = Some(node);
        }

        parent.ok_or_else(|| CatalogError::invariant("chain resolution produced no leaf"))
    }

    async fn insert_node(
        &self,
        conn: &Connection,
        parent: Option<&ActivityNode>,
        label: &str,
    ) -> CatalogResult<ActivityNode> {
        let token = normalize_label(label);
        if token.is_empty() {
            return Err(ValidationError::EmptyToken(label.to_string()).into());
        }

        let path = match parent {
            None => ActivityPath::root(&token),
            Some(p) => p.path.child(&token),
        }
        .map_err(ValidationError::from)?;

        let id = Uuid::new_v4().to_string();
        let insert = conn
            .execute(
                "INSERT INTO activities (id, label, path, depth) VALUES (?, ?, ?, ?)",
                (id.as_str(), label, path.as_str(), path.depth() as i64),
            )
            .await;

        if let Err(e) = insert {
            let err = DatabaseError::from_sql("insert activity node", e);
            if !err.is_unique_violation() {
                return Err(err.into());
            }
            // The path is already taken: a concurrent creator of the same
            // node (adopt it), or a different label whose token collides.
            return match fetch_by_path(conn, &path).await? {
                Some(existing) if existing.label == label => {
                    tracing::debug!(path = %path, "adopted concurrently created activity node");
                    Ok(existing)
                }
                Some(existing) => Err(CatalogError::conflict(format!(
                    "label {:?} normalizes to token {:?}, already taken by {:?} at path {}",
                    label, token, existing.label, path
                ))),
                None => Err(CatalogError::invariant(format!(
                    "unique violation for path {} but no row is visible",
                    path
                ))),
            };
        }

        fetch_by_path(conn, &path).await?.ok_or_else(|| {
            CatalogError::invariant(format!("activity node at {} vanished after insert", path))
        })
    }
}

pub(crate) async fn find_root_in(
    conn: &Connection,
    label: &str,
) -> CatalogResult<Option<ActivityNode>> {
    let sql = format!(
        "SELECT {} FROM activities WHERE label = ? AND depth = 1",
        ACTIVITY_COLUMNS
    );
    query_one(conn, &sql, [label]).await
}

pub(crate) async fn find_child_in(
    conn: &Connection,
    parent: &ActivityNode,
    label: &str,
) -> CatalogResult<Option<ActivityNode>> {
    let (lower, upper) = parent.path.descendant_range();
    let sql = format!(
        "SELECT {} FROM activities
         WHERE label = ? AND depth = ? AND path >= ? AND path < ?",
        ACTIVITY_COLUMNS
    );
    query_one(
        conn,
        &sql,
        (label, parent.depth + 1, lower.as_str(), upper.as_str()),
    )
    .await
}

pub(crate) async fn descendants_in(
    conn: &Connection,
    node: &ActivityNode,
) -> CatalogResult<Vec<ActivityNode>> {
    let (lower, upper) = node.path.descendant_range();
    let sql = format!(
        "SELECT {} FROM activities
         WHERE path = ? OR (path >= ? AND path < ?)
         ORDER BY path",
        ACTIVITY_COLUMNS
    );
    query_all(
        conn,
        &sql,
        (node.path.as_str(), lower.as_str(), upper.as_str()),
    )
    .await
}

async fn fetch_by_path(
    conn: &Connection,
    path: &ActivityPath,
) -> CatalogResult<Option<ActivityNode>> {
    let sql = format!("SELECT {} FROM activities WHERE path = ?", ACTIVITY_COLUMNS);
    query_one(conn, &sql, [path.as_str()]).await
}

async fn query_one(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> CatalogResult<Option<ActivityNode>> {
    let mut stmt = conn.prepare(sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare activity query: {}", e))
    })?;
    let mut rows = stmt.query(params).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute activity query: {}", e))
    })?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_activity(&row)?)),
        None => Ok(None),
    }
}

async fn query_all(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> CatalogResult<Vec<ActivityNode>> {
    let mut stmt = conn.prepare(sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare activity query: {}", e))
    })?;
    let mut rows = stmt.query(params).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute activity query: {}", e))
    })?;

    let mut nodes = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        nodes.push(row_to_activity(&row)?);
    }
    Ok(nodes)
}

/// Convert a result row to an [`ActivityNode`].
///
/// Expected columns, in order: id, label, path, depth, created_at.
fn row_to_activity(row: &libsql::Row) -> CatalogResult<ActivityNode> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get id: {}", e)))?;
    let label: String = row
        .get(1)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get label: {}", e)))?;
    let raw_path: String = row
        .get(2)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get path: {}", e)))?;
    let depth: i64 = row
        .get(3)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get depth: {}", e)))?;
    let created_at_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get created_at: {}", e)))?;

    let path = ActivityPath::parse(&raw_path)
        .map_err(|e| CatalogError::invariant(format!("stored path {:?} is invalid: {}", raw_path, e)))?;
    let created_at = parse_timestamp(&created_at_str)
        .map_err(|e| CatalogError::invariant(format!("stored created_at is invalid: {}", e)))?;

    Ok(ActivityNode {
        id,
        label,
        path,
        depth,
        created_at,
    })
}
