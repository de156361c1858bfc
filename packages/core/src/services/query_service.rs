//! Query Service - Read-Side Façade
//!
//! Composes the hierarchy store and the organization repository to answer
//! the catalog's read queries:
//!
//! - organizations by activity label, strict or hierarchy-inclusive
//! - organizations/buildings within a radius of a point
//! - case-insensitive title substring search
//! - organizations inside one building
//!
//! Results are plain records; the transport layer owns serialization.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{Building, Organization, ValidationError};
use crate::services::activity_service::ActivityService;
use crate::services::error::{CatalogError, CatalogResult};
use crate::services::geo;
use crate::services::organization_service::{
    hydrate_activity_ids, placeholders, row_to_building, row_to_organization,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read-side service over the catalog.
///
/// # Examples
///
/// ```no_run
/// use orgatlas_core::db::DatabaseService;
/// use orgatlas_core::services::QueryService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/orgatlas.db")).await?);
///     let queries = QueryService::new(db);
///
///     let nearby = queries
///         .organizations_within_radius(55.75, 37.61, 2_000.0)
///         .await?;
///     println!("{} organizations nearby", nearby.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct QueryService {
    /// Shared database handle
    db: Arc<DatabaseService>,

    /// Hierarchy store, used to resolve labels and subtrees
    activities: ActivityService,
}

impl QueryService {
    /// Create a new QueryService over a database handle.
    pub fn new(db: Arc<DatabaseService>) -> Self {
        let activities = ActivityService::new(db.clone());
        Self { db, activities }
    }

    /// Organizations tagged with an activity label.
    ///
    /// Labels are only unique among siblings, so every node carrying the
    /// label participates. With `strict` the match is limited to those
    /// exact nodes; otherwise each node expands to its whole subtree
    /// (itself included). Results are deduplicated.
    ///
    /// # Errors
    ///
    /// `NotFound` when no node in the tree carries the label.
    pub async fn organizations_by_activity(
        &self,
        label: &str,
        strict: bool,
    ) -> CatalogResult<Vec<Organization>> {
        if label.trim().is_empty() {
            return Err(ValidationError::MissingField("label").into());
        }

        let nodes = self.activities.find_nodes_by_label(label).await?;
        if nodes.is_empty() {
            return Err(CatalogError::not_found("activity label", label));
        }

        // BTreeSet keeps the id list deterministic across label duplicates
        let mut act_ids = BTreeSet::new();
        if strict {
            for node in &nodes {
                act_ids.insert(node.id.clone());
            }
        } else {
            for node in &nodes {
                for descendant in self.activities.descendants_of(node).await? {
                    act_ids.insert(descendant.id);
                }
            }
        }

        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT DISTINCT o.id, o.title, o.phones, o.building_id, o.created_at, o.modified_at
             FROM organizations o
             JOIN org_activities r ON r.org_id = o.id
             WHERE r.act_id IN ({})
             ORDER BY o.title",
            placeholders(act_ids.len())
        );
        let params: Vec<libsql::Value> = act_ids.into_iter().map(libsql::Value::Text).collect();

        let mut stmt = conn.prepare(&sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare activity search: {}", e))
        })?;
        let mut rows = stmt
            .query(libsql::params_from_iter(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute activity search: {}", e))
            })?;

        let mut orgs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            orgs.push(row_to_organization(&row)?);
        }

        hydrate_activity_ids(&conn, &mut orgs).await?;
        tracing::debug!(label, strict, count = orgs.len(), "activity search served");
        Ok(orgs)
    }

    /// Organizations whose owning building lies within `radius_meters` of
    /// the center point. The radius is inclusive: a building exactly at
    /// the boundary qualifies.
    pub async fn organizations_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> CatalogResult<Vec<Organization>> {
        geo::validate_radius_query(latitude, longitude, radius_meters)?;

        let conn = self.db.connect_with_timeout().await?;
        let (min_lat, max_lat) = geo::latitude_band(latitude, radius_meters);

        // Latitude band in SQL, exact great-circle predicate in Rust
        let mut stmt = conn
            .prepare(
                "SELECT o.id, o.title, o.phones, o.building_id, o.created_at, o.modified_at,
                        b.latitude, b.longitude
                 FROM organizations o
                 JOIN buildings b ON b.id = o.building_id
                 WHERE b.latitude BETWEEN ? AND ?
                 ORDER BY o.title",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare radius query: {}", e))
            })?;
        let mut rows = stmt.query((min_lat, max_lat)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute radius query: {}", e))
        })?;

        let mut orgs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let building_lat: f64 = row.get(6).map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to get latitude: {}", e))
            })?;
            let building_lon: f64 = row.get(7).map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to get longitude: {}", e))
            })?;

            let distance =
                geo::haversine_distance(latitude, longitude, building_lat, building_lon);
            if distance <= radius_meters {
                orgs.push(row_to_organization(&row)?);
            }
        }

        hydrate_activity_ids(&conn, &mut orgs).await?;
        tracing::debug!(count = orgs.len(), "organization radius query served");
        Ok(orgs)
    }

    /// Buildings within `radius_meters` of the center point, inclusive.
    pub async fn buildings_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> CatalogResult<Vec<Building>> {
        geo::validate_radius_query(latitude, longitude, radius_meters)?;

        let conn = self.db.connect_with_timeout().await?;
        let (min_lat, max_lat) = geo::latitude_band(latitude, radius_meters);

        let mut stmt = conn
            .prepare(
                "SELECT id, address, latitude, longitude, created_at, modified_at
                 FROM buildings
                 WHERE latitude BETWEEN ? AND ?
                 ORDER BY address",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare radius query: {}", e))
            })?;
        let mut rows = stmt.query((min_lat, max_lat)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute radius query: {}", e))
        })?;

        let mut buildings = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let building = row_to_building(&row)?;
            let distance = geo::haversine_distance(
                latitude,
                longitude,
                building.latitude,
                building.longitude,
            );
            if distance <= radius_meters {
                buildings.push(building);
            }
        }

        tracing::debug!(count = buildings.len(), "building radius query served");
        Ok(buildings)
    }

    /// Case-insensitive substring search on organization titles.
    ///
    /// `LIKE` metacharacters in the query are escaped, so `100%` matches
    /// literally.
    pub async fn search_organizations_by_title(
        &self,
        query: &str,
    ) -> CatalogResult<Vec<Organization>> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptySearchQuery.into());
        }

        let conn = self.db.connect_with_timeout().await?;
        let pattern = format!("%{}%", escape_like(query));

        let mut stmt = conn
            .prepare(
                "SELECT id, title, phones, building_id, created_at, modified_at
                 FROM organizations
                 WHERE title LIKE ? ESCAPE '\\'
                 ORDER BY title",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare title search: {}", e))
            })?;
        let mut rows = stmt.query([pattern.as_str()]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute title search: {}", e))
        })?;

        let mut orgs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            orgs.push(row_to_organization(&row)?);
        }

        hydrate_activity_ids(&conn, &mut orgs).await?;
        Ok(orgs)
    }

    /// Organizations located in one building.
    ///
    /// # Errors
    ///
    /// `NotFound` when the building does not exist (an existing building
    /// with no organizations yields an empty list).
    pub async fn organizations_in_building(
        &self,
        building_id: &str,
    ) -> CatalogResult<Vec<Organization>> {
        let conn = self.db.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare("SELECT 1 FROM buildings WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare building check: {}", e))
            })?;
        let mut rows = stmt.query([building_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute building check: {}", e))
        })?;
        if rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .is_none()
        {
            return Err(CatalogError::not_found("building", building_id));
        }

        let mut stmt = conn
            .prepare(
                "SELECT id, title, phones, building_id, created_at, modified_at
                 FROM organizations
                 WHERE building_id = ?
                 ORDER BY title",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare building listing: {}", e))
            })?;
        let mut rows = stmt.query([building_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute building listing: {}", e))
        })?;

        let mut orgs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            orgs.push(row_to_organization(&row)?);
        }

        hydrate_activity_ids(&conn, &mut orgs).await?;
        Ok(orgs)
    }
}

/// Escape `LIKE` metacharacters so the query matches literally.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_metacharacters() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like(r"back\slash"), r"back\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
