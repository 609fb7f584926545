//! Global properties supplied by the configuration layer.

use serde::{Deserialize, Serialize};

/// Runtime properties that influence statement processing.
///
/// Loaded from the middleware configuration; all fields default so a missing
/// section yields usable settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UmbraProperties {
    /// Log every rewritten SQL text (observability only; parameters are
    /// never logged).
    #[serde(default)]
    pub sql_show: bool,
}

impl Default for UmbraProperties {
    fn default() -> Self {
        Self { sql_show: false }
    }
}
