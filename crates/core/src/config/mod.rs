//! Configuration loading and schema definitions
//!
//! Settings shared by the API client, telemetry and the CLI.

mod loader;
mod schema;

pub use loader::{apply_overrides, Config};
pub use schema::*;
