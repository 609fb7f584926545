//! umbradb-commons
//!
//! Shared types for the UmbraDB shadow-routing core: the `SqlUnit` execution
//! value, the shadow routing rule, global properties, and the common error
//! type. Kept dependency-light so every other crate can use them.

pub mod errors;
pub mod models;
pub mod properties;

pub use errors::{Result, UmbraError};
pub use models::{ShadowRule, SqlUnit};
pub use properties::UmbraProperties;
