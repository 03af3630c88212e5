mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod pagination;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod services {
    pub mod authoring;
    pub mod follows;
    pub mod relations;
    pub mod shopping;
    pub mod users;
}
mod constants;

pub mod config;
pub mod images;
pub mod seed;
pub mod server;
pub mod views;

pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use services::*;
