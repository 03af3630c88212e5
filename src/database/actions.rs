//! Postgres queries, one function per store operation.

pub mod follows;
pub mod ingredients;
pub mod recipes;
pub mod relations;
pub mod tags;
pub mod tokens;
pub mod users;
