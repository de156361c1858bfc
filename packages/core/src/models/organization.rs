//! Organization records and their input shapes.

use crate::models::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization located in exactly one building and tagged with a set
/// of activity nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Unique identifier (UUID), assigned on creation
    pub id: String,

    /// Title, unique across the catalog
    pub title: String,

    /// Ordered list of phone numbers
    pub phones: Vec<String>,

    /// Owning building (always references an existing building)
    pub building_id: String,

    /// Linked activity node ids, set semantics, hydrated on read
    #[serde(default)]
    pub activity_ids: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

/// Input for creating an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDraft {
    pub title: String,

    #[serde(default)]
    pub phones: Vec<String>,

    pub building_id: String,

    /// Activity nodes to link; duplicates are collapsed
    #[serde(default)]
    pub activity_ids: Vec<String>,
}

impl OrganizationDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.building_id.trim().is_empty() {
            return Err(ValidationError::MissingField("buildingId"));
        }
        Ok(())
    }
}

/// Partial update for an organization; `None` fields are left untouched.
///
/// A supplied `activity_ids` replaces the whole activity set (computed as a
/// diff against the current links, so unchanged links are untouched).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_ids: Option<Vec<String>>,
}

impl OrganizationPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::MissingField("title"));
            }
        }
        if let Some(building_id) = &self.building_id {
            if building_id.trim().is_empty() {
                return Err(ValidationError::MissingField("buildingId"));
            }
        }
        Ok(())
    }
}
