//! `db` crate — persistence layer for form process mappers.
//!
//! Provides a connection pool, typed row structs, a query builder for the
//! tenant-scoped listings, and repository functions for the
//! `form_process_mapper` table. No HTTP or authentication logic lives here.

pub mod error;
pub mod pool;
pub mod query;
pub mod repository;
pub mod models;

pub use pool::DbPool;
pub use error::{BadRequest, DbError};
pub use query::{
    Condition, MapperFilter, MapperQuery, Pagination, Sort, SortField, SortOrder, UserContext,
};
