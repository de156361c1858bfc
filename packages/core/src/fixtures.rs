//! Sample catalog seeding.
//!
//! Fills a database with a small, predictable catalog: five buildings, two
//! activity trees (education and medicine), and ten organizations spread
//! round-robin over the buildings with two activity links each. Used by
//! integration tests and demos; run it against a fresh database.

use crate::db::DatabaseService;
use crate::models::{BuildingDraft, OrganizationDraft};
use crate::services::{ActivityService, OrganizationService};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Ids of the seeded entities, in creation order.
#[derive(Debug, Clone)]
pub struct SampleCatalog {
    pub building_ids: Vec<String>,
    pub activity_ids: Vec<String>,
    pub organization_ids: Vec<String>,
}

/// Seed the sample catalog through the public services.
pub async fn seed_sample_catalog(db: Arc<DatabaseService>) -> Result<SampleCatalog> {
    let activities = ActivityService::new(db.clone());
    let organizations = OrganizationService::new(db);

    let mut building_ids = Vec::new();
    for i in 1..=5 {
        let building = organizations
            .create_building(BuildingDraft {
                address: format!("{} Pushkin street", i),
                latitude: 55.0 + i as f64,
                longitude: 37.0 + i as f64,
                organization_titles: None,
            })
            .await
            .with_context(|| format!("seeding building #{}", i))?;
        building_ids.push(building.id);
    }

    // Two small trees; the leaves come back from create_chain, the roots
    // are looked up afterwards so the id list mirrors creation order.
    let mut activity_ids = Vec::new();
    let secondary = activities
        .create_chain(&["Education", "Secondary education"])
        .await
        .context("seeding education tree")?;
    let higher = activities
        .create_chain(&["Education", "Higher education"])
        .await
        .context("seeding education tree")?;
    let clinic = activities
        .create_chain(&["Medicine", "Clinic"])
        .await
        .context("seeding medicine tree")?;
    let hospital = activities
        .create_chain(&["Medicine", "Hospital"])
        .await
        .context("seeding medicine tree")?;

    let education = activities
        .find_root_node("Education")
        .await?
        .context("education root missing after seeding")?;
    let medicine = activities
        .find_root_node("Medicine")
        .await?
        .context("medicine root missing after seeding")?;

    activity_ids.push(education.id);
    activity_ids.push(secondary.id);
    activity_ids.push(higher.id);
    activity_ids.push(medicine.id);
    activity_ids.push(clinic.id);
    activity_ids.push(hospital.id);

    let mut organization_ids = Vec::new();
    for i in 0..10 {
        let org = organizations
            .create_organization(OrganizationDraft {
                title: format!("Organization #{}", i + 1),
                phones: vec![
                    "2-222-222".to_string(),
                    "3-333-333".to_string(),
                    "8-923-666-13-13".to_string(),
                ],
                building_id: building_ids[i % building_ids.len()].clone(),
                activity_ids: vec![
                    activity_ids[i % activity_ids.len()].clone(),
                    activity_ids[(i + 1) % activity_ids.len()].clone(),
                ],
            })
            .await
            .with_context(|| format!("seeding organization #{}", i + 1))?;
        organization_ids.push(org.id);
    }

    tracing::info!(
        buildings = building_ids.len(),
        activities = activity_ids.len(),
        organizations = organization_ids.len(),
        "sample catalog seeded"
    );

    Ok(SampleCatalog {
        building_ids,
        activity_ids,
        organization_ids,
    })
}
