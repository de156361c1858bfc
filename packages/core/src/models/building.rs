//! Building records and their input shapes.

use crate::models::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A building owning zero or more organizations.
///
/// The address is unique across the catalog. Deleting a building deletes
/// the organizations inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    /// Unique identifier (UUID), assigned on creation
    pub id: String,

    /// Postal address, unique across the catalog
    pub address: String,

    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,

    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

/// Input for creating a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingDraft {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Titles of existing organizations to move into the new building.
    /// Titles with no matching organization are silently skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_titles: Option<Vec<String>>,
}

impl BuildingDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::MissingField("address"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Partial update for a building; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl BuildingPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(address) = &self.address {
            if address.trim().is_empty() {
                return Err(ValidationError::MissingField("address"));
            }
        }
        if let Some(latitude) = self.latitude {
            validate_latitude(latitude)?;
        }
        if let Some(longitude) = self.longitude {
            validate_longitude(longitude)?;
        }
        Ok(())
    }
}

/// Validate a coordinate pair. Also used by the radius queries for their
/// center point.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    validate_latitude(latitude)?;
    validate_longitude(longitude)
}

fn validate_latitude(latitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::CoordinateOutOfRange {
            field: "latitude",
            value: latitude,
        });
    }
    Ok(())
}

fn validate_longitude(longitude: f64) -> Result<(), ValidationError> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::CoordinateOutOfRange {
            field: "longitude",
            value: longitude,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_rejects_blank_address_and_bad_coordinates() {
        let draft = BuildingDraft {
            address: "  ".to_string(),
            latitude: 55.0,
            longitude: 37.0,
            organization_titles: None,
        };
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::MissingField("address"))
        ));

        let draft = BuildingDraft {
            address: "1 Main st".to_string(),
            latitude: 91.0,
            longitude: 37.0,
            organization_titles: None,
        };
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::CoordinateOutOfRange { field: "latitude", .. })
        ));
    }

    #[test]
    fn patch_validates_only_supplied_fields() {
        assert!(BuildingPatch::default().validate().is_ok());

        let patch = BuildingPatch {
            longitude: Some(181.0),
            ..Default::default()
        };
        assert!(matches!(
            patch.validate(),
            Err(ValidationError::CoordinateOutOfRange { field: "longitude", .. })
        ));
    }
}
