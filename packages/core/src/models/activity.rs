//! Activity taxonomy node record.

use crate::models::path::ActivityPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One node of the hierarchical activity taxonomy.
///
/// Nodes are addressed by their materialized [`ActivityPath`]; the `label`
/// is display text and is only unique among siblings. `depth` is persisted
/// (always equal to the path's segment count) so sibling lookups can filter
/// on exact depth without parsing paths.
///
/// Nodes are immutable after creation — the taxonomy supports neither
/// rename nor delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNode {
    /// Unique identifier (UUID), assigned on creation
    pub id: String,

    /// Display label as submitted by the caller
    pub label: String,

    /// Materialized path from the root to this node
    pub path: ActivityPath,

    /// Depth in the tree; equals `path.depth()`
    pub depth: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
