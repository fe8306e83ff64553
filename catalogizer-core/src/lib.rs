pub mod bootstrap;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod models;
pub mod provider;
pub mod repository;
pub mod service;
pub mod transaction;

pub use cache::KeyBuilder;
pub use config::Config;
pub use error::{Error, Result};
pub use transaction::with_transaction;
