//! Organization repository integration tests.
//!
//! Covers atomic create/update/delete for organizations and buildings:
//! referential checks, uniqueness conflicts, rollback of half-applied
//! mutations, activity-set diff convergence, reassignment by title, and
//! cascade/idempotent deletes.

use anyhow::Result;
use orgatlas_core::db::DatabaseService;
use orgatlas_core::models::{BuildingDraft, BuildingPatch, OrganizationDraft, OrganizationPatch};
use orgatlas_core::services::{ActivityService, CatalogError, OrganizationService, QueryService};
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> Result<(Arc<DatabaseService>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await?);
    Ok((db, temp_dir))
}

fn building_draft(address: &str) -> BuildingDraft {
    BuildingDraft {
        address: address.to_string(),
        latitude: 55.75,
        longitude: 37.61,
        organization_titles: None,
    }
}

fn org_draft(title: &str, building_id: &str) -> OrganizationDraft {
    OrganizationDraft {
        title: title.to_string(),
        phones: vec!["2-222-222".to_string()],
        building_id: building_id.to_string(),
        activity_ids: vec![],
    }
}

#[tokio::test]
async fn create_organization_requires_existing_building() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let err = orgs
        .create_organization(org_draft("Romashka LLC", "no-such-building"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err}");
    Ok(())
}

#[tokio::test]
async fn create_organization_rejects_duplicate_title() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    orgs.create_organization(org_draft("Romashka LLC", &building.id))
        .await?;

    let err = orgs
        .create_organization(org_draft("Romashka LLC", &building.id))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    Ok(())
}

#[tokio::test]
async fn create_organization_links_activities_atomically() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let activities = ActivityService::new(db.clone());
    let orgs = OrganizationService::new(db.clone());
    let queries = QueryService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let dairy = activities.create_chain(&["Food", "Dairy"]).await?;

    // Duplicate ids in the input collapse to one link
    let mut draft = org_draft("Milk & Co", &building.id);
    draft.activity_ids = vec![dairy.id.clone(), dairy.id.clone()];
    let org = orgs.create_organization(draft).await?;
    assert_eq!(org.activity_ids, vec![dairy.id.clone()]);

    // A dangling activity id fails the whole creation
    let mut bad = org_draft("Half Created", &building.id);
    bad.activity_ids = vec![dairy.id.clone(), "no-such-activity".to_string()];
    let err = orgs.create_organization(bad).await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err}");

    // Rolled back: the organization is not observable
    let found = queries.search_organizations_by_title("Half Created").await?;
    assert!(found.is_empty(), "rolled-back organization must not persist");
    Ok(())
}

#[tokio::test]
async fn create_building_conflict_leaves_store_unchanged() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db.clone());
    let queries = QueryService::new(db);

    let first = orgs.create_building(building_draft("1 Main st")).await?;

    let mut duplicate = building_draft("1 Main st");
    duplicate.latitude = 10.0;
    let err = orgs.create_building(duplicate).await.unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got: {err}");

    // Still exactly one building, with the original coordinates
    let all = queries
        .buildings_within_radius(55.75, 37.61, 1_000_000.0)
        .await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, first.id);
    assert_eq!(all[0].latitude, 55.75);
    Ok(())
}

#[tokio::test]
async fn create_building_reassigns_matching_titles() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let old = orgs.create_building(building_draft("1 Main st")).await?;
    let moving = orgs
        .create_organization(org_draft("Moving Co", &old.id))
        .await?;
    let staying = orgs
        .create_organization(org_draft("Staying Co", &old.id))
        .await?;

    // Unknown titles are silently skipped, not an error
    let new = orgs
        .create_building(BuildingDraft {
            address: "2 Side st".to_string(),
            latitude: 55.8,
            longitude: 37.7,
            organization_titles: Some(vec![
                "Moving Co".to_string(),
                "No Such Org".to_string(),
            ]),
        })
        .await?;

    let moved = orgs.get_organization(&moving.id).await?.unwrap();
    assert_eq!(moved.building_id, new.id);

    let stayed = orgs.get_organization(&staying.id).await?.unwrap();
    assert_eq!(stayed.building_id, old.id);
    Ok(())
}

#[tokio::test]
async fn update_organization_applies_only_supplied_fields() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let org = orgs
        .create_organization(org_draft("Romashka LLC", &building.id))
        .await?;

    let updated = orgs
        .update_organization(
            &org.id,
            OrganizationPatch {
                phones: Some(vec!["9-999-999".to_string()]),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.title, "Romashka LLC");
    assert_eq!(updated.phones, vec!["9-999-999".to_string()]);
    assert_eq!(updated.building_id, building.id);
    Ok(())
}

#[tokio::test]
async fn update_organization_unknown_id_is_not_found() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let err = orgs
        .update_organization("no-such-org", OrganizationPatch::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err}");
    Ok(())
}

#[tokio::test]
async fn update_organization_activity_set_converges() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let activities = ActivityService::new(db.clone());
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let a1 = activities.create_chain(&["Alpha"]).await?;
    let a2 = activities.create_chain(&["Beta"]).await?;
    let a3 = activities.create_chain(&["Gamma"]).await?;
    let a4 = activities.create_chain(&["Delta"]).await?;

    let mut draft = org_draft("Romashka LLC", &building.id);
    draft.activity_ids = vec![a1.id.clone(), a2.id.clone(), a3.id.clone()];
    let org = orgs.create_organization(draft).await?;

    let updated = orgs
        .update_organization(
            &org.id,
            OrganizationPatch {
                activity_ids: Some(vec![a2.id.clone(), a3.id.clone(), a4.id.clone()]),
                ..Default::default()
            },
        )
        .await?;

    let mut expected = vec![a2.id, a3.id, a4.id];
    expected.sort();
    assert_eq!(updated.activity_ids, expected);

    // Re-applying the same set is a no-op and still converges
    let again = orgs
        .update_organization(
            &org.id,
            OrganizationPatch {
                activity_ids: Some(expected.clone()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(again.activity_ids, expected);
    Ok(())
}

#[tokio::test]
async fn update_organization_rejects_dangling_building() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let org = orgs
        .create_organization(org_draft("Romashka LLC", &building.id))
        .await?;

    let err = orgs
        .update_organization(
            &org.id,
            OrganizationPatch {
                building_id: Some("no-such-building".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err}");

    // The organization still points at its original building
    let unchanged = orgs.get_organization(&org.id).await?.unwrap();
    assert_eq!(unchanged.building_id, building.id);
    Ok(())
}

#[tokio::test]
async fn update_building_partial_and_not_found() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let org = orgs
        .create_organization(org_draft("Romashka LLC", &building.id))
        .await?;

    let updated = orgs
        .update_building(
            &building.id,
            BuildingPatch {
                latitude: Some(56.0),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.latitude, 56.0);
    assert_eq!(updated.address, "1 Main st");
    assert_eq!(updated.longitude, 37.61);

    // Coordinate change does not cascade into organizations
    let unchanged = orgs.get_organization(&org.id).await?.unwrap();
    assert_eq!(unchanged.building_id, building.id);

    let err = orgs
        .update_building("no-such-building", BuildingPatch::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err}");
    Ok(())
}

#[tokio::test]
async fn update_building_duplicate_address_is_conflict() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    orgs.create_building(building_draft("1 Main st")).await?;
    let other = orgs.create_building(building_draft("2 Side st")).await?;

    let err = orgs
        .update_building(
            &other.id,
            BuildingPatch {
                address: Some("1 Main st".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    Ok(())
}

#[tokio::test]
async fn delete_building_cascades_to_organizations_and_links() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let activities = ActivityService::new(db.clone());
    let orgs = OrganizationService::new(db.clone());
    let queries = QueryService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let dairy = activities.create_chain(&["Food", "Dairy"]).await?;

    let mut d1 = org_draft("First Org", &building.id);
    d1.activity_ids = vec![dairy.id.clone()];
    let first = orgs.create_organization(d1).await?;

    let mut d2 = org_draft("Second Org", &building.id);
    d2.activity_ids = vec![dairy.id.clone()];
    let second = orgs.create_organization(d2).await?;

    assert!(orgs.delete_building(&building.id).await?);

    assert!(orgs.get_organization(&first.id).await?.is_none());
    assert!(orgs.get_organization(&second.id).await?.is_none());

    // Links died with the organizations
    let tagged = queries.organizations_by_activity("Dairy", true).await?;
    assert!(tagged.is_empty());
    Ok(())
}

#[tokio::test]
async fn deletes_are_idempotent() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    assert!(!orgs.delete_organization("no-such-org").await?);
    assert!(!orgs.delete_building("no-such-building").await?);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let org = orgs
        .create_organization(org_draft("Romashka LLC", &building.id))
        .await?;

    assert!(orgs.delete_organization(&org.id).await?);
    assert!(!orgs.delete_organization(&org.id).await?);

    assert!(orgs.delete_building(&building.id).await?);
    assert!(!orgs.delete_building(&building.id).await?);
    Ok(())
}

#[tokio::test]
async fn organization_deletion_leaves_the_taxonomy_intact() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let activities = ActivityService::new(db.clone());
    let orgs = OrganizationService::new(db);

    let building = orgs.create_building(building_draft("1 Main st")).await?;
    let dairy = activities.create_chain(&["Food", "Dairy"]).await?;

    let mut draft = org_draft("Milk & Co", &building.id);
    draft.activity_ids = vec![dairy.id.clone()];
    let org = orgs.create_organization(draft).await?;

    assert!(orgs.delete_organization(&org.id).await?);

    // Only the links went away, never the activity nodes
    assert!(activities.get_node(&dairy.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn validation_failures_surface_before_any_write() -> Result<()> {
    let (db, _temp_dir) = create_test_db().await?;
    let orgs = OrganizationService::new(db);

    let err = orgs
        .create_building(BuildingDraft {
            address: "Somewhere".to_string(),
            latitude: 95.0,
            longitude: 37.0,
            organization_titles: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let err = orgs
        .create_organization(org_draft("", "irrelevant"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));
    Ok(())
}
