//! Shadow statement executor for UmbraDB.
//!
//! Pairs an actual and a shadow data source behind one prepared-statement
//! surface. Each execution is judged and rewritten by `umbradb-sql`, then
//! delegated to a driver-backed statement on the chosen target.

pub mod connection;
pub mod statement;

pub use connection::{
    PhysicalStatement, ResultHandle, ResultSetConcurrency, ResultSetHoldability, ResultSetKind,
    ShadowConnection, StatementConfig, StatementSetting, TargetConnection,
};
pub use statement::ShadowPreparedStatement;
