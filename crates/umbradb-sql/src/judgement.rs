//! Shadow judgement
//!
//! Decides whether one statement execution targets the shadow data source.
//! Judgement never fails: anything it cannot resolve routes to the actual
//! source, so a broken rule degrades to production behavior instead of
//! misrouting traffic.

use serde_json::Value as JsonValue;
use umbradb_commons::ShadowRule;

use crate::context::{StatementContext, ValuePosition};

/// Judgement engine variants.
///
/// The literal engine only trusts values written in the SQL text; the
/// prepared engine additionally resolves placeholder ordinals against the
/// bound parameter list. Selected per build from the statement context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowJudgementEngine {
    Literal,
    Prepared,
}

impl ShadowJudgementEngine {
    /// Pick the engine for one statement build.
    pub fn for_context(context: &StatementContext) -> Self {
        if context.has_placeholders() {
            Self::Prepared
        } else {
            Self::Literal
        }
    }

    /// Judge one execution. `parameters` is the bound list in ordinal order;
    /// the literal engine ignores it.
    pub fn is_shadow(
        &self,
        context: &StatementContext,
        rule: &ShadowRule,
        parameters: &[JsonValue],
    ) -> bool {
        if let Some(insert) = context.insert() {
            let Some(marker) = insert.column_index(&rule.column) else {
                return false;
            };
            // Any row carrying a truthy marker routes the whole statement.
            return insert.rows.iter().any(|row| {
                row.get(marker)
                    .and_then(|position| self.resolve(position, parameters))
                    .map(|value| rule.is_shadow_value(value))
                    .unwrap_or(false)
            });
        }

        context.predicates().iter().any(|predicate| {
            predicate.column.eq_ignore_ascii_case(&rule.column)
                && self
                    .resolve(&predicate.value, parameters)
                    .map(|value| rule.is_shadow_value(value))
                    .unwrap_or(false)
        })
    }

    fn resolve<'a>(
        &self,
        position: &'a ValuePosition,
        parameters: &'a [JsonValue],
    ) -> Option<&'a JsonValue> {
        match position {
            ValuePosition::Literal(value) => Some(value),
            ValuePosition::Parameter(ordinal) => match self {
                Self::Prepared => parameters.get(*ordinal),
                Self::Literal => None,
            },
            ValuePosition::Opaque => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{RelationMetas, TableMetadataProvider};
    use crate::parser::SqlParser;
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

    fn metas() -> RelationMetas {
        let mut schema = HashMap::new();
        schema.insert(
            "orders".to_string(),
            vec!["is_shadow".to_string(), "amount".to_string()],
        );
        RelationMetas::build(&MapProvider(schema))
    }

    fn rule() -> ShadowRule {
        ShadowRule {
            column: "is_shadow".to_string(),
        }
    }

    fn context(sql: &str) -> StatementContext {
        let statement = SqlParser::new().parse_one(sql).unwrap();
        StatementContext::new(statement, &metas()).unwrap()
    }

    #[test]
    fn test_prepared_insert_routes_on_parameter() {
        let ctx = context("INSERT INTO orders (is_shadow, amount) VALUES (?, ?)");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert_eq!(engine, ShadowJudgementEngine::Prepared);

        assert!(engine.is_shadow(&ctx, &rule(), &[json!(true), json!(10)]));
        assert!(!engine.is_shadow(&ctx, &rule(), &[json!(false), json!(10)]));
    }

    #[test]
    fn test_literal_insert_ignores_parameters() {
        let ctx = context("INSERT INTO orders (is_shadow, amount) VALUES (true, 10)");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert_eq!(engine, ShadowJudgementEngine::Literal);

        assert!(engine.is_shadow(&ctx, &rule(), &[]));
    }

    #[test]
    fn test_insert_without_marker_column_is_actual() {
        let ctx = context("INSERT INTO orders (amount) VALUES (?)");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert!(!engine.is_shadow(&ctx, &rule(), &[json!(true)]));
    }

    #[test]
    fn test_multi_row_insert_any_truthy_row() {
        let ctx = context("INSERT INTO orders (is_shadow, amount) VALUES (false, 1), (?, 2)");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert!(engine.is_shadow(&ctx, &rule(), &[json!(1)]));
        assert!(!engine.is_shadow(&ctx, &rule(), &[json!(0)]));
    }

    #[test]
    fn test_where_predicate_parameter() {
        let ctx = context("SELECT amount FROM orders WHERE is_shadow = ? AND amount > ?");
        let engine = ShadowJudgementEngine::for_context(&ctx);

        assert!(engine.is_shadow(&ctx, &rule(), &[json!("true"), json!(5)]));
        assert!(!engine.is_shadow(&ctx, &rule(), &[json!("no"), json!(5)]));
    }

    #[test]
    fn test_where_predicate_literal() {
        let ctx = context("DELETE FROM orders WHERE is_shadow = true");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert_eq!(engine, ShadowJudgementEngine::Literal);
        assert!(engine.is_shadow(&ctx, &rule(), &[]));
    }

    #[test]
    fn test_missing_parameter_is_actual() {
        let ctx = context("SELECT amount FROM orders WHERE is_shadow = ?");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert!(!engine.is_shadow(&ctx, &rule(), &[]));
    }

    #[test]
    fn test_marker_column_case_insensitive() {
        let ctx = context("UPDATE orders SET amount = 1 WHERE IS_SHADOW = true");
        let engine = ShadowJudgementEngine::for_context(&ctx);
        assert!(engine.is_shadow(&ctx, &rule(), &[]));
    }
}
