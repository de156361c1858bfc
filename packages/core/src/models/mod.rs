//! Data Models
//!
//! This module contains the plain records exchanged with the transport
//! layer and the value types they are built from:
//!
//! - [`ActivityNode`] - one node of the hierarchical activity taxonomy
//! - [`Building`] / [`Organization`] - catalog entities with draft/patch
//!   input shapes
//! - [`ActivityPath`] - materialized path codec for taxonomy addressing
//!
//! Records serialize with camelCase field names for the transport layer.

mod activity;
mod building;
mod organization;
pub mod path;
pub(crate) mod time;

pub use activity::ActivityNode;
pub use building::{validate_coordinates, Building, BuildingDraft, BuildingPatch};
pub use organization::{Organization, OrganizationDraft, OrganizationPatch};
pub use path::{normalize_label, ActivityPath, PathError, PATH_SEPARATOR};

use thiserror::Error;

/// Validation errors for caller-supplied data, beyond primitive type checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field missing or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Latitude/longitude outside its legal range
    #[error("Coordinate out of range: {field} = {value}")]
    CoordinateOutOfRange { field: &'static str, value: f64 },

    /// Search radius must be non-negative and finite
    #[error("Invalid search radius: {0}")]
    InvalidRadius(f64),

    /// Chain creation needs at least one label
    #[error("Activity chain must contain at least one label")]
    EmptyChain,

    /// Label normalizes to an empty path token
    #[error("Activity label {0:?} normalizes to an empty path token")]
    EmptyToken(String),

    /// Malformed materialized path
    #[error("Invalid activity path: {0}")]
    InvalidPath(#[from] PathError),

    /// Title search needs a non-empty query
    #[error("Search query must not be empty")]
    EmptySearchQuery,
}
