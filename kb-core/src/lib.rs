//! Record Operations (spec §4.8): `create`, `createEdge`, `select`,
//! `update`, `remove`, `selectFromList`, `selectByKeyword`, `selectCounts`,
//! composing the Schema Registry (`kb_schema`), the query builder
//! (`kb_query`) and the session pool / permission gate (`kb_connector`)
//! against a live session.

pub mod counts;
pub mod create;
pub mod decycle;
pub mod ops;
pub mod record_io;
pub mod remove;
pub mod select;
#[cfg(test)]
mod tests_support;
pub mod trim;
pub mod update;

pub use counts::{select_counts, ClassCount, CountsOptions};
pub use create::{create, create_edge};
pub use decycle::decycle;
pub use ops::RecordOperations;
pub use remove::remove;
pub use select::{select, select_by_keyword, select_from_list, SelectOptions};
pub use update::update;

pub(crate) fn query_error(err: kb_query::QueryError) -> kb_connector::DomainError {
    kb_connector::DomainError::validation(err.to_string())
}
