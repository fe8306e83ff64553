//! Bootstrap module for initializing the Catalogizer core
//!
//! Handles database initialization and service wiring. Configuration
//! loading lives in `crate::config`; logging setup in `crate::logging`.

pub mod database;
pub mod services;

pub use database::init_database;
pub use services::{init_services, Services};
