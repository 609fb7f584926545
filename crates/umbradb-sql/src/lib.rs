//! SQL pipeline for UmbraDB shadow routing.
//!
//! One statement build runs parse, context binding, shadow judgement, and
//! marker rewrite, producing a [`RoutedSqlUnit`]: the physical SQL text plus
//! filtered parameters, tagged with the route decision. The executor crate
//! calls [`ShadowRewriter::build`] once per execution so routing always sees
//! the current parameters and the current table metadata.

pub mod context;
pub mod judgement;
pub mod metadata;
pub mod parser;
pub mod rewrite;
pub mod sql_logger;

use serde_json::Value as JsonValue;
use umbradb_commons::{Result, ShadowRule, SqlUnit, UmbraProperties};

pub use context::{InsertContext, PredicateContext, StatementContext, ValuePosition};
pub use judgement::ShadowJudgementEngine;
pub use metadata::{RelationMetas, TableMetadataProvider};
pub use parser::SqlParser;
pub use rewrite::{
    DefaultSqlRewriteEngine, RewriteToken, ShadowRewriteDecorator, SqlRewriteContext,
    TokenGenerator,
};

/// Physical SQL unit plus its route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedSqlUnit {
    pub unit: SqlUnit,
    pub shadow: bool,
}

/// Full build pipeline for one statement execution.
pub struct ShadowRewriter<'a> {
    rule: &'a ShadowRule,
    properties: &'a UmbraProperties,
}

impl<'a> ShadowRewriter<'a> {
    pub fn new(rule: &'a ShadowRule, properties: &'a UmbraProperties) -> Self {
        Self { rule, properties }
    }

    /// Build the physical SQL unit for one execution of `sql` with the
    /// currently bound `parameters`.
    ///
    /// Metadata is re-snapshotted on every call; a schema change between
    /// executions of a long-lived statement is picked up by the next build.
    pub fn build(
        &self,
        metadata: &dyn TableMetadataProvider,
        sql: &str,
        parameters: &[JsonValue],
    ) -> Result<RoutedSqlUnit> {
        let statement = SqlParser::new().parse_one(sql)?;
        let metas = RelationMetas::build(metadata);
        let context = StatementContext::new(statement, &metas)?;

        let engine = ShadowJudgementEngine::for_context(&context);
        let shadow = engine.is_shadow(&context, self.rule, parameters);

        let mut rewrite_context = SqlRewriteContext::new(&context, parameters);
        ShadowRewriteDecorator::new(self.rule).decorate(&mut rewrite_context);
        let unit = DefaultSqlRewriteEngine::rewrite(&rewrite_context)?;

        if self.properties.sql_show {
            sql_logger::log_sql(sql, shadow, &unit);
        }

        Ok(RoutedSqlUnit { unit, shadow })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct MapProvider(HashMap<String, Vec<String>>);

    impl TableMetadataProvider for MapProvider {
        fn all_table_names(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }

        fn columns_of(&self, table: &str) -> Vec<String> {
            self.0.get(table).cloned().unwrap_or_default()
        }
    }

    fn provider() -> MapProvider {
        let mut schema = HashMap::new();
        schema.insert(
            "orders".to_string(),
            vec![
                "id".to_string(),
                "is_shadow".to_string(),
                "amount".to_string(),
            ],
        );
        MapProvider(schema)
    }

    fn rewriter_parts() -> (ShadowRule, UmbraProperties) {
        (
            ShadowRule {
                column: "is_shadow".to_string(),
            },
            UmbraProperties::default(),
        )
    }

    #[test]
    fn test_build_routes_and_rewrites_insert() -> anyhow::Result<()> {
        let (rule, props) = rewriter_parts();
        let rewriter = ShadowRewriter::new(&rule, &props);

        let routed = rewriter.build(
            &provider(),
            "INSERT INTO orders (id, is_shadow, amount) VALUES (?, ?, ?)",
            &[json!(1), json!(true), json!(10)],
        )?;

        assert!(routed.shadow);
        assert_eq!(
            routed.unit.sql(),
            "INSERT INTO orders (id, amount) VALUES (?, ?)"
        );
        assert_eq!(routed.unit.parameters(), &[json!(1), json!(10)]);
        Ok(())
    }

    #[test]
    fn test_build_is_deterministic() {
        let (rule, props) = rewriter_parts();
        let rewriter = ShadowRewriter::new(&rule, &props);
        let sql = "SELECT amount FROM orders WHERE is_shadow = ? AND id = ?";
        let params = [json!(false), json!(3)];

        let first = rewriter.build(&provider(), sql, &params).unwrap();
        let second = rewriter.build(&provider(), sql, &params).unwrap();
        assert_eq!(first, second);
        assert!(!first.shadow);
        assert_eq!(first.unit.sql(), "SELECT amount FROM orders WHERE id = ?");
    }

    #[test]
    fn test_build_same_sql_different_parameters_changes_route() {
        let (rule, props) = rewriter_parts();
        let rewriter = ShadowRewriter::new(&rule, &props);
        let sql = "DELETE FROM orders WHERE is_shadow = ?";

        let shadowed = rewriter.build(&provider(), sql, &[json!(true)]).unwrap();
        let actual = rewriter.build(&provider(), sql, &[json!(false)]).unwrap();

        assert!(shadowed.shadow);
        assert!(!actual.shadow);
        // Both routes get the same marker-stripped text.
        assert_eq!(shadowed.unit.sql(), actual.unit.sql());
        assert_eq!(shadowed.unit.sql(), "DELETE FROM orders");
    }

    #[test]
    fn test_build_picks_up_metadata_changes() {
        let (rule, props) = rewriter_parts();
        let rewriter = ShadowRewriter::new(&rule, &props);
        let sql = "INSERT INTO orders VALUES (1, true, 10)";

        let routed = rewriter.build(&provider(), sql, &[]).unwrap();
        assert!(routed.shadow);
        assert_eq!(
            routed.unit.sql(),
            "INSERT INTO orders (id, amount) VALUES (1, 10)"
        );

        // Same statement against a schema without the marker column.
        let mut schema = HashMap::new();
        schema.insert(
            "orders".to_string(),
            vec![
                "id".to_string(),
                "region".to_string(),
                "amount".to_string(),
            ],
        );
        let routed = rewriter.build(&MapProvider(schema), sql, &[]).unwrap();
        assert!(!routed.shadow);
        assert_eq!(routed.unit.sql(), "INSERT INTO orders VALUES (1, true, 10)");
    }

    #[test]
    fn test_build_parse_error_propagates() {
        let (rule, props) = rewriter_parts();
        let rewriter = ShadowRewriter::new(&rule, &props);
        assert!(rewriter.build(&provider(), "INSRT INTO", &[]).is_err());
    }
}
