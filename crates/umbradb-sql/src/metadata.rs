//! Relation metadata
//!
//! Projects the externally supplied table schema into the minimal lookup the
//! rewrite pipeline needs: table name → ordered column names. Types and
//! constraints are irrelevant here.

use std::collections::HashMap;

/// External table-metadata source (owned by the connection layer).
///
/// Schema snapshots are not assumed immutable between executions of a
/// long-lived statement, so [`RelationMetas::build`] is called on every
/// statement build rather than cached.
pub trait TableMetadataProvider {
    fn all_table_names(&self) -> Vec<String>;
    fn columns_of(&self, table: &str) -> Vec<String>;
}

/// Table name → ordered column names, snapshotted for one statement build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationMetas {
    tables: HashMap<String, Vec<String>>,
}

impl RelationMetas {
    /// Snapshot the provider's current schema. An empty schema yields an
    /// empty mapping; this never fails.
    pub fn build(provider: &dyn TableMetadataProvider) -> Self {
        let mut tables = HashMap::new();
        for name in provider.all_table_names() {
            let columns = provider.columns_of(&name);
            tables.insert(name, columns);
        }
        Self { tables }
    }

    pub fn columns_of(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(|cols| cols.as_slice())
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
