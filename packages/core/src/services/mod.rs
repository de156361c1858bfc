//! Business Services
//!
//! This module contains the catalog's operation contract:
//!
//! - `ActivityService` - hierarchy store: label lookups, idempotent chain
//!   creation, descendant queries
//! - `OrganizationService` - repository: organization/building mutations
//!   with transactional link maintenance
//! - `QueryService` - read façade: activity search, radius queries, title
//!   search
//!
//! Services hold a shared `Arc<DatabaseService>` and are cheap to clone.
//! The transport layer calls these operations and maps [`CatalogError`]
//! variants to protocol responses.

pub mod activity_service;
pub mod error;
pub mod geo;
pub mod organization_service;
pub mod query_service;

pub use activity_service::ActivityService;
pub use error::{CatalogError, CatalogResult};
pub use organization_service::OrganizationService;
pub use query_service::QueryService;
