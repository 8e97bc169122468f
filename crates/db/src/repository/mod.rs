//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`,
//! except `create_from_dict`, which answers with a generic `BadRequest`.

pub mod form_process_mappers;
