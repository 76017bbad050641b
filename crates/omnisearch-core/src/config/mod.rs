//! Configuration for the search client
//!
//! A single YAML file describes the model endpoints, where sessions are
//! stored, how speech is decoded and played, and where logs go.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::errors::SearchError;
use std::path::Path;

/// Load a configuration from a YAML file, falling back to defaults when it is absent
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<OmniConfig, SearchError> {
    ConfigLoader::load_or_default(path).await
}
