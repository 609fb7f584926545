//! Connection seam
//!
//! The executor never talks to a driver directly. Physical data sources are
//! injected through [`TargetConnection`], a factory for driver-backed
//! prepared statements; the shadow connection pairs one actual and one
//! shadow target and owns the routing rule, runtime properties, and the
//! table-metadata source used by statement builds.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use umbradb_commons::{Result, ShadowRule, UmbraProperties};
use umbradb_sql::TableMetadataProvider;

/// Opaque driver result (result set, generated keys). The executor routes
/// handles; it never inspects them.
pub type ResultHandle = Arc<dyn Any + Send + Sync>;

/// Statement creation shape, fixed at prepare time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementConfig {
    Default,
    ResultSet {
        kind: ResultSetKind,
        concurrency: ResultSetConcurrency,
        holdability: Option<ResultSetHoldability>,
    },
    ReturnGeneratedKeys,
    KeyColumnIndexes(Vec<usize>),
    KeyColumnNames(Vec<String>),
}

impl StatementConfig {
    /// Whether the driver was asked to surface generated keys.
    pub fn returns_generated_keys(&self) -> bool {
        matches!(
            self,
            Self::ReturnGeneratedKeys | Self::KeyColumnIndexes(_) | Self::KeyColumnNames(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetKind {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetConcurrency {
    ReadOnly,
    Updatable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetHoldability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// Tuning applied to a statement after creation. Recorded by the executor
/// and replayed onto every physical statement it prepares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementSetting {
    FetchSize(u32),
    MaxRows(u32),
    QueryTimeout(Duration),
}

/// One driver-backed prepared statement on a single physical data source.
pub trait PhysicalStatement: Send {
    fn apply_setting(&mut self, setting: &StatementSetting) -> Result<()>;

    fn execute_query(&mut self, parameters: &[JsonValue]) -> Result<ResultHandle>;
    fn execute_update(&mut self, parameters: &[JsonValue]) -> Result<u64>;
    /// Returns true when the execution produced a result set.
    fn execute(&mut self, parameters: &[JsonValue]) -> Result<bool>;

    fn result_set(&mut self) -> Result<ResultHandle>;
    fn generated_keys(&mut self) -> Result<ResultHandle>;

    fn add_batch(&mut self, parameters: &[JsonValue]) -> Result<()>;
    fn execute_batch(&mut self) -> Result<Vec<u64>>;
    fn clear_batch(&mut self) -> Result<()>;
}

/// Factory for physical statements on one data source.
pub trait TargetConnection: Send + Sync {
    fn prepare(&self, sql: &str, config: &StatementConfig)
        -> Result<Box<dyn PhysicalStatement>>;
}

/// A paired actual/shadow data source with the routing state statements
/// need. Statements hold it behind an `Arc` and stay independent of each
/// other.
pub struct ShadowConnection {
    actual: Box<dyn TargetConnection>,
    shadow: Box<dyn TargetConnection>,
    metadata: Box<dyn TableMetadataProvider + Send + Sync>,
    rule: ShadowRule,
    properties: UmbraProperties,
}

impl ShadowConnection {
    pub fn new(
        actual: Box<dyn TargetConnection>,
        shadow: Box<dyn TargetConnection>,
        metadata: Box<dyn TableMetadataProvider + Send + Sync>,
        rule: ShadowRule,
        properties: UmbraProperties,
    ) -> Self {
        Self {
            actual,
            shadow,
            metadata,
            rule,
            properties,
        }
    }

    pub fn target_for(&self, shadow: bool) -> &dyn TargetConnection {
        if shadow {
            self.shadow.as_ref()
        } else {
            self.actual.as_ref()
        }
    }

    pub fn metadata(&self) -> &(dyn TableMetadataProvider + Send + Sync) {
        self.metadata.as_ref()
    }

    pub fn rule(&self) -> &ShadowRule {
        &self.rule
    }

    pub fn properties(&self) -> &UmbraProperties {
        &self.properties
    }
}
