//! OrgAtlas Catalog Core
//!
//! This crate is the storage and query core of a catalog of organizations
//! located in buildings, each organization tagged with entries from a
//! hierarchical activity taxonomy, with geospatial proximity search over
//! building coordinates.
//!
//! # Architecture
//!
//! - **Materialized paths**: the taxonomy is a tree stored as dotted path
//!   strings over an ordered unique index, so descendant queries are key
//!   range scans rather than recursive traversals
//! - **libsql**: embedded SQLite-compatible database; WAL mode, per-call
//!   connections, IMMEDIATE transactions around every multi-step mutation
//! - **Explicit store handle**: services receive an `Arc<DatabaseService>`;
//!   no process-global state
//! - **Typed outcomes**: every operation returns the [`services::CatalogError`]
//!   taxonomy (`NotFound` / `Conflict` / `Validation` / `Store` /
//!   `Invariant`) for the transport layer to map onto protocol responses
//!
//! # Modules
//!
//! - [`models`] - plain records and the path codec
//! - [`services`] - the operation contract (hierarchy store, repository,
//!   query façade)
//! - [`db`] - connection management and schema
//! - [`config`] - runtime configuration and tracing setup
//! - [`fixtures`] - sample-catalog seeding

pub mod config;
pub mod db;
pub mod fixtures;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
