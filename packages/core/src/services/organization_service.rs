//! Organization Service - Repository Operations
//!
//! Owns organization and building records and their links into the
//! activity taxonomy. Every multi-step mutation (create with links,
//! activity-set diff, reassignment by title) runs inside a single
//! IMMEDIATE transaction: either all steps commit or none do, and no
//! concurrent reader observes an intermediate state.
//!
//! Uniqueness (organization title, building address) and referential
//! integrity (owning building, linked activities) are validated in the
//! transaction and backed by the schema's constraints; constraint failures
//! surface as `Conflict`, dangling references as `NotFound`.

use crate::db::{self, DatabaseError, DatabaseService};
use crate::models::time::parse_timestamp;
use crate::models::{
    Building, BuildingDraft, BuildingPatch, Organization, OrganizationDraft, OrganizationPatch,
};
use crate::services::error::{CatalogError, CatalogResult};
use libsql::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const ORGANIZATION_COLUMNS: &str =
    "id, title, phones, building_id, created_at, modified_at";
pub(crate) const BUILDING_COLUMNS: &str =
    "id, address, latitude, longitude, created_at, modified_at";

/// Service for organization and building mutations.
///
/// # Examples
///
/// ```no_run
/// use orgatlas_core::db::DatabaseService;
/// use orgatlas_core::models::{BuildingDraft, OrganizationDraft};
/// use orgatlas_core::services::OrganizationService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/orgatlas.db")).await?);
///     let organizations = OrganizationService::new(db);
///
///     let building = organizations
///         .create_building(BuildingDraft {
///             address: "1 Pushkin street".to_string(),
///             latitude: 55.75,
///             longitude: 37.61,
///             organization_titles: None,
///         })
///         .await?;
///
///     let org = organizations
///         .create_organization(OrganizationDraft {
///             title: "Romashka LLC".to_string(),
///             phones: vec!["2-222-222".to_string()],
///             building_id: building.id.clone(),
///             activity_ids: vec![],
///         })
///         .await?;
///     assert_eq!(org.building_id, building.id);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct OrganizationService {
    /// Shared database handle
    db: Arc<DatabaseService>,
}

impl OrganizationService {
    /// Create a new OrganizationService over a database handle.
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Create an organization together with its activity links.
    ///
    /// # Errors
    ///
    /// - `NotFound` - the owning building or a linked activity id does not
    ///   exist
    /// - `Conflict` - the title is already taken
    ///
    /// Not safe to blind-retry on a `Store` error: a retry of an already
    /// committed create surfaces as `Conflict` on the title.
    pub async fn create_organization(
        &self,
        draft: OrganizationDraft,
    ) -> CatalogResult<Organization> {
        draft.validate()?;

        let conn = self.db.connect_with_timeout().await?;
        db::begin_immediate(&conn).await?;

        match self.create_organization_in(&conn, &draft).await {
            Ok(org) => {
                db::commit(&conn).await?;
                tracing::info!(id = %org.id, title = %org.title, "organization created");
                Ok(org)
            }
            Err(e) => {
                db::rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn create_organization_in(
        &self,
        conn: &Connection,
        draft: &OrganizationDraft,
    ) -> CatalogResult<Organization> {
        if !building_exists(conn, &draft.building_id).await? {
            return Err(CatalogError::not_found("building", &draft.building_id));
        }

        let id = Uuid::new_v4().to_string();
        let phones = serde_json::to_string(&draft.phones)
            .map_err(|e| CatalogError::invariant(format!("failed to serialize phones: {}", e)))?;

        let insert = conn
            .execute(
                "INSERT INTO organizations (id, title, phones, building_id)
                 VALUES (?, ?, ?, ?)",
                (
                    id.as_str(),
                    draft.title.as_str(),
                    phones.as_str(),
                    draft.building_id.as_str(),
                ),
            )
            .await;

        if let Err(e) = insert {
            let err = DatabaseError::from_sql("insert organization", e);
            if err.is_unique_violation() {
                return Err(CatalogError::conflict(format!(
                    "organization title {:?} already exists",
                    draft.title
                )));
            }
            return Err(err.into());
        }

        insert_activity_links(conn, &id, &draft.activity_ids).await?;

        let mut org = fetch_organization(conn, &id)
            .await?
            .ok_or_else(|| CatalogError::invariant("organization vanished after insert"))?;
        hydrate_activity_ids(conn, std::slice::from_mut(&mut org)).await?;
        Ok(org)
    }

    /// Create a building, optionally moving existing organizations into it.
    ///
    /// Every existing organization whose title appears in
    /// `organization_titles` is reassigned to the new building; titles with
    /// no match are silently skipped.
    ///
    /// # Errors
    ///
    /// `Conflict` when the address is already taken. Not safe to
    /// blind-retry on a `Store` error (retry of a committed create
    /// surfaces as `Conflict` on the address).
    pub async fn create_building(&self, draft: BuildingDraft) -> CatalogResult<Building> {
        draft.validate()?;

        let conn = self.db.connect_with_timeout().await?;
        db::begin_immediate(&conn).await?;

        match self.create_building_in(&conn, &draft).await {
            Ok(building) => {
                db::commit(&conn).await?;
                tracing::info!(id = %building.id, address = %building.address, "building created");
                Ok(building)
            }
            Err(e) => {
                db::rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn create_building_in(
        &self,
        conn: &Connection,
        draft: &BuildingDraft,
    ) -> CatalogResult<Building> {
        let id = Uuid::new_v4().to_string();

        let insert = conn
            .execute(
                "INSERT INTO buildings (id, address, latitude, longitude)
                 VALUES (?, ?, ?, ?)",
                (
                    id.as_str(),
                    draft.address.as_str(),
                    draft.latitude,
                    draft.longitude,
                ),
            )
            .await;

        if let Err(e) = insert {
            let err = DatabaseError::from_sql("insert building", e);
            if err.is_unique_violation() {
                return Err(CatalogError::conflict(format!(
                    "building address {:?} already exists",
                    draft.address
                )));
            }
            return Err(err.into());
        }

        if let Some(titles) = &draft.organization_titles {
            if !titles.is_empty() {
                let sql = format!(
                    "UPDATE organizations
                     SET building_id = ?, modified_at = CURRENT_TIMESTAMP
                     WHERE title IN ({})",
                    placeholders(titles.len())
                );

                let mut params = Vec::<libsql::Value>::with_capacity(titles.len() + 1);
                params.push(libsql::Value::Text(id.clone()));
                for title in titles {
                    params.push(libsql::Value::Text(title.clone()));
                }

                let moved = conn
                    .execute(&sql, libsql::params_from_iter(params))
                    .await
                    .map_err(|e| DatabaseError::from_sql("reassign organizations", e))?;
                tracing::debug!(moved, "organizations reassigned to new building");
            }
        }

        fetch_building(conn, &id)
            .await?
            .ok_or_else(|| CatalogError::invariant("building vanished after insert"))
    }

    /// Apply a partial update to an organization.
    ///
    /// Only supplied fields change. A supplied `activity_ids` replaces the
    /// whole activity set via a diff: links in `current − new` are deleted,
    /// links in `new − current` inserted, the rest untouched - so the final
    /// set equals the request regardless of prior state.
    ///
    /// # Errors
    ///
    /// - `NotFound` - unknown organization id, target building, or added
    ///   activity id
    /// - `Conflict` - new title already taken
    pub async fn update_organization(
        &self,
        id: &str,
        patch: OrganizationPatch,
    ) -> CatalogResult<Organization> {
        patch.validate()?;

        let conn = self.db.connect_with_timeout().await?;
        db::begin_immediate(&conn).await?;

        match self.update_organization_in(&conn, id, patch).await {
            Ok(org) => {
                db::commit(&conn).await?;
                tracing::info!(id = %org.id, "organization updated");
                Ok(org)
            }
            Err(e) => {
                db::rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn update_organization_in(
        &self,
        conn: &Connection,
        id: &str,
        patch: OrganizationPatch,
    ) -> CatalogResult<Organization> {
        let current = fetch_organization(conn, id)
            .await?
            .ok_or_else(|| CatalogError::not_found("organization", id))?;

        if let Some(building_id) = &patch.building_id {
            if !building_exists(conn, building_id).await? {
                return Err(CatalogError::not_found("building", building_id));
            }
        }

        let title = patch.title.unwrap_or(current.title);
        let phones = patch.phones.unwrap_or(current.phones);
        let building_id = patch.building_id.unwrap_or(current.building_id);
        let phones_json = serde_json::to_string(&phones)
            .map_err(|e| CatalogError::invariant(format!("failed to serialize phones: {}", e)))?;

        let update = conn
            .execute(
                "UPDATE organizations
                 SET title = ?, phones = ?, building_id = ?, modified_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                (title.as_str(), phones_json.as_str(), building_id.as_str(), id),
            )
            .await;

        if let Err(e) = update {
            let err = DatabaseError::from_sql("update organization", e);
            if err.is_unique_violation() {
                return Err(CatalogError::conflict(format!(
                    "organization title {:?} already exists",
                    title
                )));
            }
            return Err(err.into());
        }

        if let Some(new_ids) = patch.activity_ids {
            self.replace_activity_set(conn, id, new_ids).await?;
        }

        let mut org = fetch_organization(conn, id)
            .await?
            .ok_or_else(|| CatalogError::invariant("organization vanished during update"))?;
        hydrate_activity_ids(conn, std::slice::from_mut(&mut org)).await?;
        Ok(org)
    }

    /// Replace the activity set of an organization by diffing against the
    /// current links. Order-independent: only the symmetric difference is
    /// touched.
    async fn replace_activity_set(
        &self,
        conn: &Connection,
        org_id: &str,
        new_ids: Vec<String>,
    ) -> CatalogResult<()> {
        let current: HashSet<String> = load_activity_ids(conn, org_id).await?.into_iter().collect();
        let requested: HashSet<String> = new_ids.into_iter().collect();

        let to_remove: Vec<&String> = current.difference(&requested).collect();
        let to_add: Vec<&String> = requested.difference(&current).collect();

        if !to_remove.is_empty() {
            let sql = format!(
                "DELETE FROM org_activities WHERE org_id = ? AND act_id IN ({})",
                placeholders(to_remove.len())
            );
            let mut params = Vec::<libsql::Value>::with_capacity(to_remove.len() + 1);
            params.push(libsql::Value::Text(org_id.to_string()));
            for act_id in &to_remove {
                params.push(libsql::Value::Text((*act_id).clone()));
            }
            conn.execute(&sql, libsql::params_from_iter(params))
                .await
                .map_err(|e| DatabaseError::from_sql("delete activity links", e))?;
        }

        let added: Vec<String> = to_add.into_iter().cloned().collect();
        insert_activity_links(conn, org_id, &added).await?;

        tracing::debug!(
            org_id,
            removed = to_remove.len(),
            added = added.len(),
            "activity set replaced"
        );
        Ok(())
    }

    /// Apply a partial update to a building.
    ///
    /// Coordinate changes do not touch organizations - they reference the
    /// building by id, not by copied coordinates.
    ///
    /// # Errors
    ///
    /// `NotFound` on an unknown id, `Conflict` when the new address is
    /// already taken.
    pub async fn update_building(&self, id: &str, patch: BuildingPatch) -> CatalogResult<Building> {
        patch.validate()?;

        let conn = self.db.connect_with_timeout().await?;
        db::begin_immediate(&conn).await?;

        match self.update_building_in(&conn, id, patch).await {
            Ok(building) => {
                db::commit(&conn).await?;
                tracing::info!(id = %building.id, "building updated");
                Ok(building)
            }
            Err(e) => {
                db::rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn update_building_in(
        &self,
        conn: &Connection,
        id: &str,
        patch: BuildingPatch,
    ) -> CatalogResult<Building> {
        let current = fetch_building(conn, id)
            .await?
            .ok_or_else(|| CatalogError::not_found("building", id))?;

        let address = patch.address.unwrap_or(current.address);
        let latitude = patch.latitude.unwrap_or(current.latitude);
        let longitude = patch.longitude.unwrap_or(current.longitude);

        let update = conn
            .execute(
                "UPDATE buildings
                 SET address = ?, latitude = ?, longitude = ?, modified_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                (address.as_str(), latitude, longitude, id),
            )
            .await;

        if let Err(e) = update {
            let err = DatabaseError::from_sql("update building", e);
            if err.is_unique_violation() {
                return Err(CatalogError::conflict(format!(
                    "building address {:?} already exists",
                    address
                )));
            }
            return Err(err.into());
        }

        fetch_building(conn, id)
            .await?
            .ok_or_else(|| CatalogError::invariant("building vanished during update"))
    }

    /// Delete an organization and its activity links.
    ///
    /// Idempotent: returns `false` for an unknown id, never an error. Safe
    /// to retry on a `Store` error.
    pub async fn delete_organization(&self, id: &str) -> CatalogResult<bool> {
        let conn = self.db.connect_with_timeout().await?;
        let removed = conn
            .execute("DELETE FROM organizations WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::from_sql("delete organization", e))?;

        if removed > 0 {
            tracing::info!(id, "organization deleted");
        }
        Ok(removed > 0)
    }

    /// Delete a building, cascading to its organizations and their links.
    ///
    /// Idempotent: returns `false` for an unknown id, never an error. Safe
    /// to retry on a `Store` error.
    pub async fn delete_building(&self, id: &str) -> CatalogResult<bool> {
        let conn = self.db.connect_with_timeout().await?;
        let removed = conn
            .execute("DELETE FROM buildings WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::from_sql("delete building", e))?;

        if removed > 0 {
            tracing::info!(id, "building deleted with its organizations");
        }
        Ok(removed > 0)
    }

    /// Look up an organization by id, with its activity links hydrated.
    pub async fn get_organization(&self, id: &str) -> CatalogResult<Option<Organization>> {
        let conn = self.db.connect_with_timeout().await?;
        match fetch_organization(&conn, id).await? {
            Some(mut org) => {
                hydrate_activity_ids(&conn, std::slice::from_mut(&mut org)).await?;
                Ok(Some(org))
            }
            None => Ok(None),
        }
    }

    /// Look up a building by id.
    pub async fn get_building(&self, id: &str) -> CatalogResult<Option<Building>> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_building(&conn, id).await
    }
}

/// `?, ?, ...` list for a dynamic `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

async fn building_exists(conn: &Connection, id: &str) -> CatalogResult<bool> {
    row_exists(conn, "SELECT 1 FROM buildings WHERE id = ?", id).await
}

async fn activity_exists(conn: &Connection, id: &str) -> CatalogResult<bool> {
    row_exists(conn, "SELECT 1 FROM activities WHERE id = ?", id).await
}

async fn row_exists(conn: &Connection, sql: &str, id: &str) -> CatalogResult<bool> {
    let mut stmt = conn.prepare(sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare existence query: {}", e))
    })?;
    let mut rows = stmt.query([id]).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute existence query: {}", e))
    })?;
    Ok(rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        .is_some())
}

/// Insert links from an organization to each activity id, deduplicating
/// the input. Every referenced activity must exist.
async fn insert_activity_links(
    conn: &Connection,
    org_id: &str,
    activity_ids: &[String],
) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    for act_id in activity_ids {
        if !seen.insert(act_id.as_str()) {
            continue;
        }
        if !activity_exists(conn, act_id).await? {
            return Err(CatalogError::not_found("activity", act_id));
        }
        conn.execute(
            "INSERT INTO org_activities (org_id, act_id) VALUES (?, ?)",
            (org_id, act_id.as_str()),
        )
        .await
        .map_err(|e| DatabaseError::from_sql("insert activity link", e))?;
    }
    Ok(())
}

/// Activity ids linked to one organization, in stable order.
async fn load_activity_ids(conn: &Connection, org_id: &str) -> CatalogResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT act_id FROM org_activities WHERE org_id = ? ORDER BY act_id")
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare links query: {}", e))
        })?;
    let mut rows = stmt.query([org_id]).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute links query: {}", e))
    })?;

    let mut ids = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        let act_id: String = row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to get act_id: {}", e)))?;
        ids.push(act_id);
    }
    Ok(ids)
}

/// Populate `activity_ids` for a batch of organizations with one query.
pub(crate) async fn hydrate_activity_ids(
    conn: &Connection,
    orgs: &mut [Organization],
) -> CatalogResult<()> {
    if orgs.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "SELECT org_id, act_id FROM org_activities
         WHERE org_id IN ({})
         ORDER BY org_id, act_id",
        placeholders(orgs.len())
    );
    let params: Vec<libsql::Value> = orgs
        .iter()
        .map(|org| libsql::Value::Text(org.id.clone()))
        .collect();

    let mut stmt = conn.prepare(&sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare links query: {}", e))
    })?;
    let mut rows = stmt
        .query(libsql::params_from_iter(params))
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute links query: {}", e))
        })?;

    let mut by_org: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        let org_id: String = row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to get org_id: {}", e)))?;
        let act_id: String = row
            .get(1)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to get act_id: {}", e)))?;
        by_org.entry(org_id).or_default().push(act_id);
    }

    for org in orgs {
        org.activity_ids = by_org.remove(&org.id).unwrap_or_default();
    }
    Ok(())
}

pub(crate) async fn fetch_organization(
    conn: &Connection,
    id: &str,
) -> CatalogResult<Option<Organization>> {
    let sql = format!(
        "SELECT {} FROM organizations WHERE id = ?",
        ORGANIZATION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare organization query: {}", e))
    })?;
    let mut rows = stmt.query([id]).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute organization query: {}", e))
    })?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_organization(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_building(
    conn: &Connection,
    id: &str,
) -> CatalogResult<Option<Building>> {
    let sql = format!("SELECT {} FROM buildings WHERE id = ?", BUILDING_COLUMNS);
    let mut stmt = conn.prepare(&sql).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare building query: {}", e))
    })?;
    let mut rows = stmt.query([id]).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute building query: {}", e))
    })?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_building(&row)?)),
        None => Ok(None),
    }
}

/// Convert a result row to an [`Organization`] (activity links not yet
/// hydrated).
///
/// Expected columns, in order: id, title, phones, building_id, created_at,
/// modified_at.
pub(crate) fn row_to_organization(row: &libsql::Row) -> CatalogResult<Organization> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get id: {}", e)))?;
    let title: String = row
        .get(1)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get title: {}", e)))?;
    let phones_json: String = row
        .get(2)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get phones: {}", e)))?;
    let building_id: String = row
        .get(3)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get building_id: {}", e)))?;
    let created_at_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get created_at: {}", e)))?;
    let modified_at_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get modified_at: {}", e)))?;

    let phones: Vec<String> = serde_json::from_str(&phones_json)
        .map_err(|e| CatalogError::invariant(format!("stored phones list is invalid: {}", e)))?;
    let created_at = parse_timestamp(&created_at_str)
        .map_err(|e| CatalogError::invariant(format!("stored created_at is invalid: {}", e)))?;
    let modified_at = parse_timestamp(&modified_at_str)
        .map_err(|e| CatalogError::invariant(format!("stored modified_at is invalid: {}", e)))?;

    Ok(Organization {
        id,
        title,
        phones,
        building_id,
        activity_ids: Vec::new(),
        created_at,
        modified_at,
    })
}

/// Convert a result row to a [`Building`].
///
/// Expected columns, in order: id, address, latitude, longitude,
/// created_at, modified_at.
pub(crate) fn row_to_building(row: &libsql::Row) -> CatalogResult<Building> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get id: {}", e)))?;
    let address: String = row
        .get(1)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get address: {}", e)))?;
    let latitude: f64 = row
        .get(2)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get latitude: {}", e)))?;
    let longitude: f64 = row
        .get(3)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get longitude: {}", e)))?;
    let created_at_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get created_at: {}", e)))?;
    let modified_at_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get modified_at: {}", e)))?;

    let created_at = parse_timestamp(&created_at_str)
        .map_err(|e| CatalogError::invariant(format!("stored created_at is invalid: {}", e)))?;
    let modified_at = parse_timestamp(&modified_at_str)
        .map_err(|e| CatalogError::invariant(format!("stored modified_at is invalid: {}", e)))?;

    Ok(Building {
        id,
        address,
        latitude,
        longitude,
        created_at,
        modified_at,
    })
}
