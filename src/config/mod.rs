//! Extraction configuration
//!
//! Defaults live on the schema types; an optional TOML file overrides them
//! and command line flags override the file.

mod schema;
mod store;

pub use schema::*;
pub use store::{load_config, save_config};
