pub mod access;
pub mod batch;
pub mod booths;
pub mod config;
pub mod error;
pub mod migrate;
pub mod partition;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod rollback;
pub mod run_mode;
pub mod store;

pub use error::{AcError, Result};
