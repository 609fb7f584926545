//! Shadow prepared statement
//!
//! Long-lived statement handle over a [`ShadowConnection`]. Every execution
//! rebuilds the routed SQL unit from the current parameters and metadata,
//! prepares a physical statement on the judged target, replays recorded
//! settings, and runs it. Parameters are cleared after every execution
//! attempt, successful or not, so a failed run never leaks bindings into
//! the next one.

use std::sync::Arc;

use log::debug;
use serde_json::Value as JsonValue;
use umbradb_commons::{Result, UmbraError};
use umbradb_sql::{RoutedSqlUnit, ShadowRewriter};

use crate::connection::{
    PhysicalStatement, ResultHandle, ShadowConnection, StatementConfig, StatementSetting,
};

/// Physical statement retained from the most recent execution, tagged with
/// its route.
struct RoutedStatement {
    statement: Box<dyn PhysicalStatement>,
    shadow: bool,
}

/// Prepared statement that routes each execution to the shadow or actual
/// data source.
pub struct ShadowPreparedStatement {
    connection: Arc<ShadowConnection>,
    sql: String,
    config: StatementConfig,
    parameters: Vec<JsonValue>,
    settings: Vec<StatementSetting>,
    batch: Vec<RoutedSqlUnit>,
    /// Physical statements from the most recent build. At most one entry;
    /// every build replaces the previous one.
    routed: Vec<RoutedStatement>,
}

impl ShadowPreparedStatement {
    pub fn new(
        connection: Arc<ShadowConnection>,
        sql: impl Into<String>,
        config: StatementConfig,
    ) -> Self {
        Self {
            connection,
            sql: sql.into(),
            config,
            parameters: Vec::new(),
            settings: Vec::new(),
            batch: Vec::new(),
            routed: Vec::new(),
        }
    }

    /// Bind a parameter at a 1-based ordinal. Binding past the current end
    /// null-fills the gap.
    pub fn set_parameter(&mut self, index: usize, value: JsonValue) -> Result<()> {
        if index == 0 {
            return Err(UmbraError::state("Parameter ordinals are 1-based"));
        }
        if index > self.parameters.len() {
            self.parameters.resize(index, JsonValue::Null);
        }
        self.parameters[index - 1] = value;
        Ok(())
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Record a setting; replayed onto every physical statement this handle
    /// prepares, in application order.
    pub fn apply_setting(&mut self, setting: StatementSetting) {
        self.settings.push(setting);
    }

    pub fn execute_query(&mut self) -> Result<ResultHandle> {
        let result = self.execute_query_inner();
        self.clear_parameters();
        result
    }

    fn execute_query_inner(&mut self) -> Result<ResultHandle> {
        let routed = self.build_unit()?;
        let mut statement = self.prepare_routed(&routed)?;
        let handle = statement.execute_query(routed.unit.parameters())?;
        self.retain_routed(statement, routed.shadow);
        Ok(handle)
    }

    pub fn execute_update(&mut self) -> Result<u64> {
        let result = self.execute_update_inner();
        self.clear_parameters();
        result
    }

    fn execute_update_inner(&mut self) -> Result<u64> {
        let routed = self.build_unit()?;
        let mut statement = self.prepare_routed(&routed)?;
        let affected = statement.execute_update(routed.unit.parameters())?;
        self.retain_routed(statement, routed.shadow);
        Ok(affected)
    }

    /// Generic execute; returns whether a result set was produced. Retrieve
    /// it through [`Self::result_set`].
    pub fn execute(&mut self) -> Result<bool> {
        let result = self.execute_inner();
        self.clear_parameters();
        result
    }

    fn execute_inner(&mut self) -> Result<bool> {
        let routed = self.build_unit()?;
        let mut statement = self.prepare_routed(&routed)?;
        let has_results = statement.execute(routed.unit.parameters())?;
        self.retain_routed(statement, routed.shadow);
        Ok(has_results)
    }

    /// Result set of the most recent execution.
    pub fn result_set(&mut self) -> Result<ResultHandle> {
        match self.routed.last_mut() {
            Some(routed) => routed.statement.result_set(),
            None => Err(UmbraError::state(
                "Result set requested before any execution",
            )),
        }
    }

    /// Generated keys of the most recent execution. The statement must have
    /// been configured to return them.
    pub fn generated_keys(&mut self) -> Result<ResultHandle> {
        if !self.config.returns_generated_keys() {
            return Err(UmbraError::state(
                "Statement was not configured to return generated keys",
            ));
        }
        match self.routed.last_mut() {
            Some(routed) => routed.statement.generated_keys(),
            None => Err(UmbraError::state(
                "Generated keys requested before any execution",
            )),
        }
    }

    /// Route of the most recent execution, if any. True means shadow.
    pub fn current_route(&self) -> Option<bool> {
        self.routed.last().map(|routed| routed.shadow)
    }

    /// Physical statements currently associated with this handle. Empty
    /// before any execution; at most one entry afterwards, since every
    /// build resolves to a single target and replaces the prior handle.
    pub fn routed_statements(&self) -> Vec<&dyn PhysicalStatement> {
        self.routed
            .iter()
            .map(|routed| routed.statement.as_ref())
            .collect()
    }

    /// Whether one logical execution fans out to multiple physical targets.
    /// Shadow routing always resolves to exactly one, so this is false.
    pub fn is_accumulate(&self) -> bool {
        false
    }

    pub fn config(&self) -> &StatementConfig {
        &self.config
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn connection(&self) -> &ShadowConnection {
        &self.connection
    }

    /// Snapshot the current bindings into the batch and clear them.
    ///
    /// Routing is judged per entry at accumulation time; the rewritten unit
    /// is pinned so later metadata changes cannot retroactively alter an
    /// accumulated entry.
    pub fn add_batch(&mut self) -> Result<()> {
        let result = self.add_batch_inner();
        self.clear_parameters();
        result
    }

    fn add_batch_inner(&mut self) -> Result<()> {
        let routed = self.build_unit()?;
        self.batch.push(routed);
        Ok(())
    }

    /// Execute the accumulated batch.
    ///
    /// The physical statement is prepared from the first accumulated entry;
    /// its SQL text and route apply to the whole batch. Entries judged onto
    /// the other target are still executed on the pinned one, in
    /// accumulation order. An empty batch returns an empty slice without
    /// touching any data source. The batch is cleared on every attempt.
    pub fn execute_batch(&mut self) -> Result<Vec<u64>> {
        let result = self.execute_batch_inner();
        self.batch.clear();
        self.clear_parameters();
        result
    }

    fn execute_batch_inner(&mut self) -> Result<Vec<u64>> {
        let Some(first) = self.batch.first() else {
            return Ok(Vec::new());
        };
        if self.batch.iter().any(|entry| entry.shadow != first.shadow) {
            debug!(
                "Batch mixes shadow and actual entries; pinning to the {} target",
                if first.shadow { "shadow" } else { "actual" }
            );
        }

        let mut statement = self.prepare_routed(first)?;
        for entry in &self.batch {
            statement.add_batch(entry.unit.parameters())?;
        }
        let counts = statement.execute_batch()?;
        let shadow = first.shadow;
        self.retain_routed(statement, shadow);
        Ok(counts)
    }

    /// Drop accumulated batch entries, any pending parameter bindings, and
    /// the physical batch of the most recent statement if one exists.
    pub fn clear_batch(&mut self) -> Result<()> {
        self.batch.clear();
        self.clear_parameters();
        if let Some(routed) = self.routed.last_mut() {
            routed.statement.clear_batch()?;
        }
        Ok(())
    }

    fn retain_routed(&mut self, statement: Box<dyn PhysicalStatement>, shadow: bool) {
        self.routed.clear();
        self.routed.push(RoutedStatement { statement, shadow });
    }

    fn build_unit(&self) -> Result<RoutedSqlUnit> {
        let rewriter = ShadowRewriter::new(
            self.connection.rule(),
            self.connection.properties(),
        );
        rewriter.build(self.connection.metadata(), &self.sql, &self.parameters)
    }

    fn prepare_routed(&self, routed: &RoutedSqlUnit) -> Result<Box<dyn PhysicalStatement>> {
        let target = self.connection.target_for(routed.shadow);
        let mut statement = target.prepare(routed.unit.sql(), &self.config)?;
        for setting in &self.settings {
            statement.apply_setting(setting)?;
        }
        Ok(statement)
    }
}
