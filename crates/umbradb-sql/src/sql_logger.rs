//! Rewritten-SQL logging, enabled by the `sql_show` property.

use log::info;
use umbradb_commons::SqlUnit;

/// Log one statement build. Bound parameter values are deliberately left
/// out; only the parameter count is recorded.
pub fn log_sql(logic_sql: &str, shadow: bool, unit: &SqlUnit) {
    info!("Logic SQL: {}", logic_sql);
    info!(
        "Route: {}",
        if shadow { "shadow" } else { "actual" }
    );
    info!(
        "Actual SQL: {} [{} parameters]",
        unit.sql(),
        unit.parameters().len()
    );
}
