//! The query builder.
//!
//! Start with [`SelectQuery::from`] or [`InsertQuery::into`] and chain methods
//! to construct statements. Each builder produces a final SQL string and bound
//! parameter list executed through `rusqlite`.

pub mod clause;
pub mod insert;
pub mod select;

pub use insert::InsertQuery;
pub use select::SelectQuery;
