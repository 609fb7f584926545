//! SQL parser adapter
//!
//! Thin wrapper over sqlparser-rs with UmbraDB defaults (generic dialect,
//! trailing-comma tolerance, recursion limit). The shadow pipeline processes
//! exactly one statement per build, so multi-statement payloads are rejected
//! here rather than surprising the rewrite engine later.

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserOptions};
use umbradb_commons::{Result, UmbraError};

const DEFAULT_SQL_RECURSION_LIMIT: usize = 512;

/// Default sqlparser options used across UmbraDB
fn parser_options() -> ParserOptions {
    ParserOptions::new().with_trailing_commas(true)
}

/// SQL parser for shadow statement builds
pub struct SqlParser {
    dialect: GenericDialect,
}

impl SqlParser {
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse exactly one SQL statement.
    ///
    /// Fails with [`UmbraError::Parse`] on malformed SQL, empty input, or
    /// multi-statement payloads.
    pub fn parse_one(&self, sql: &str) -> Result<Statement> {
        let mut statements = Parser::new(&self.dialect)
            .with_options(parser_options())
            .with_recursion_limit(DEFAULT_SQL_RECURSION_LIMIT)
            .try_with_sql(sql)?
            .parse_statements()?;

        if statements.is_empty() {
            return Err(UmbraError::parse("No SQL statement found"));
        }
        if statements.len() > 1 {
            return Err(UmbraError::parse("Multiple statements not supported"));
        }

        Ok(statements.remove(0))
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}
