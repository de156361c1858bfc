//! Database Layer
//!
//! This module handles all database plumbing using libsql:
//!
//! - Connection management with per-connection busy timeout and
//!   foreign-key enforcement
//! - Idempotent schema and index initialization
//! - Classification of constraint failures for the service layer
//!
//! The services own the SQL for their operations; this layer owns the
//! handle, the schema, and the error taxonomy beneath them.

mod database;
mod error;

pub use database::DatabaseService;
pub use error::DatabaseError;

pub(crate) use database::{begin_immediate, commit, rollback};
