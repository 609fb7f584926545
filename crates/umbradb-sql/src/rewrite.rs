//! SQL rewrite pipeline
//!
//! The shadow marker column exists only in the logical schema; no physical
//! data source carries it. Rewriting therefore always strips the marker
//! before execution, on both the shadow and the actual route: INSERT loses
//! the marker column and its per-row value, WHERE clauses lose marker
//! conjuncts, and parameters bound to removed positions are dropped from
//! the list handed to the physical statement.
//!
//! The pipeline is token based: decorators inspect the statement context and
//! emit edit tokens; the engine applies them to a clone of the parsed AST
//! and renders the result. Rewriting never touches the caller's SQL text.

use serde_json::Value as JsonValue;
use sqlparser::ast::{BinaryOperator, Expr, Ident, SetExpr, Statement};
use umbradb_commons::{Result, ShadowRule, SqlUnit, UmbraError};

use crate::context::{flatten_conjuncts, StatementContext, ValuePosition};

/// One AST edit scheduled by a decorator.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteToken {
    /// Replace the INSERT column list (used when the original text had no
    /// explicit list and the marker must be projected out).
    SetInsertColumns { columns: Vec<String> },
    /// Remove one column from an explicit INSERT column list.
    RemoveInsertColumn { index: usize },
    /// Remove the cell at `index` from VALUES row `row`. `parameter` names
    /// the ordinal to drop from the bound list when the cell was a
    /// placeholder.
    RemoveInsertValue {
        row: usize,
        index: usize,
        parameter: Option<usize>,
    },
    /// Remove one conjunct from the WHERE clause AND-chain.
    RemovePredicate {
        conjunct: usize,
        parameter: Option<usize>,
    },
}

/// Emits rewrite tokens for one statement build.
pub trait TokenGenerator {
    fn generate(&self, context: &StatementContext) -> Vec<RewriteToken>;
}

/// Accumulates tokens from every decorator applied to one build.
pub struct SqlRewriteContext<'a> {
    context: &'a StatementContext,
    parameters: &'a [JsonValue],
    tokens: Vec<RewriteToken>,
}

impl<'a> SqlRewriteContext<'a> {
    pub fn new(context: &'a StatementContext, parameters: &'a [JsonValue]) -> Self {
        Self {
            context,
            parameters,
            tokens: Vec::new(),
        }
    }

    pub fn generate_tokens(&mut self, generator: &dyn TokenGenerator) {
        self.tokens.extend(generator.generate(self.context));
    }

    pub fn context(&self) -> &StatementContext {
        self.context
    }

    pub fn tokens(&self) -> &[RewriteToken] {
        &self.tokens
    }
}

/// Strips the shadow marker column from the statement.
pub struct ShadowRewriteDecorator<'a> {
    rule: &'a ShadowRule,
}

impl<'a> ShadowRewriteDecorator<'a> {
    pub fn new(rule: &'a ShadowRule) -> Self {
        Self { rule }
    }

    pub fn decorate(&self, rewrite_context: &mut SqlRewriteContext<'_>) {
        rewrite_context.generate_tokens(self);
    }
}

impl TokenGenerator for ShadowRewriteDecorator<'_> {
    fn generate(&self, context: &StatementContext) -> Vec<RewriteToken> {
        let mut tokens = Vec::new();

        if let Some(insert) = context.insert() {
            let Some(marker) = insert.column_index(&self.rule.column) else {
                return tokens;
            };
            if insert.explicit_columns {
                tokens.push(RewriteToken::RemoveInsertColumn { index: marker });
            } else {
                let columns = insert
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != marker)
                    .map(|(_, column)| column.clone())
                    .collect();
                tokens.push(RewriteToken::SetInsertColumns { columns });
            }
            for (row, positions) in insert.rows.iter().enumerate() {
                let parameter = match positions.get(marker) {
                    Some(ValuePosition::Parameter(ordinal)) => Some(*ordinal),
                    _ => None,
                };
                tokens.push(RewriteToken::RemoveInsertValue {
                    row,
                    index: marker,
                    parameter,
                });
            }
            return tokens;
        }

        for predicate in context.predicates() {
            if !predicate.column.eq_ignore_ascii_case(&self.rule.column) {
                continue;
            }
            let parameter = match &predicate.value {
                ValuePosition::Parameter(ordinal) => Some(*ordinal),
                _ => None,
            };
            tokens.push(RewriteToken::RemovePredicate {
                conjunct: predicate.conjunct,
                parameter,
            });
        }
        tokens
    }
}

/// Applies accumulated tokens and renders the physical SQL unit.
pub struct DefaultSqlRewriteEngine;

impl DefaultSqlRewriteEngine {
    pub fn rewrite(rewrite_context: &SqlRewriteContext<'_>) -> Result<SqlUnit> {
        let mut statement = rewrite_context.context().statement().clone();
        let mut removed_ordinals: Vec<usize> = Vec::new();
        let mut removed_conjuncts: Vec<usize> = Vec::new();

        for token in rewrite_context.tokens() {
            match token {
                RewriteToken::SetInsertColumns { columns } => {
                    set_insert_columns(&mut statement, columns)?;
                }
                RewriteToken::RemoveInsertColumn { index } => {
                    remove_insert_column(&mut statement, *index)?;
                }
                RewriteToken::RemoveInsertValue {
                    row,
                    index,
                    parameter,
                } => {
                    remove_insert_value(&mut statement, *row, *index)?;
                    if let Some(ordinal) = parameter {
                        removed_ordinals.push(*ordinal);
                    }
                }
                RewriteToken::RemovePredicate {
                    conjunct,
                    parameter,
                } => {
                    removed_conjuncts.push(*conjunct);
                    if let Some(ordinal) = parameter {
                        removed_ordinals.push(*ordinal);
                    }
                }
            }
        }

        // Conjunct indexes refer to the original AND-chain, so all predicate
        // removals are applied in one rebuild.
        if !removed_conjuncts.is_empty() {
            remove_conjuncts(&mut statement, &removed_conjuncts)?;
        }

        let parameters = rewrite_context
            .parameters
            .iter()
            .enumerate()
            .filter(|(ordinal, _)| !removed_ordinals.contains(ordinal))
            .map(|(_, value)| value.clone())
            .collect();

        Ok(SqlUnit::new(statement.to_string(), parameters))
    }
}

fn insert_of(statement: &mut Statement) -> Result<&mut sqlparser::ast::Insert> {
    match statement {
        Statement::Insert(insert) => Ok(insert),
        _ => Err(UmbraError::rewrite(
            "INSERT rewrite token applied to a non-INSERT statement",
        )),
    }
}

fn set_insert_columns(statement: &mut Statement, columns: &[String]) -> Result<()> {
    let insert = insert_of(statement)?;
    insert.columns = columns.iter().map(Ident::new).collect();
    Ok(())
}

fn remove_insert_column(statement: &mut Statement, index: usize) -> Result<()> {
    let insert = insert_of(statement)?;
    if index >= insert.columns.len() {
        return Err(UmbraError::rewrite("INSERT column index out of range"));
    }
    insert.columns.remove(index);
    Ok(())
}

fn remove_insert_value(statement: &mut Statement, row: usize, index: usize) -> Result<()> {
    let insert = insert_of(statement)?;
    let source = insert
        .source
        .as_mut()
        .ok_or_else(|| UmbraError::rewrite("INSERT has no VALUES source"))?;
    let SetExpr::Values(values) = &mut *source.body else {
        return Err(UmbraError::rewrite("INSERT source is not a VALUES list"));
    };
    let cells = values
        .rows
        .get_mut(row)
        .ok_or_else(|| UmbraError::rewrite("INSERT row index out of range"))?;
    if index >= cells.len() {
        return Err(UmbraError::rewrite("INSERT value index out of range"));
    }
    cells.remove(index);
    Ok(())
}

fn remove_conjuncts(statement: &mut Statement, removed: &[usize]) -> Result<()> {
    let selection = selection_of(statement)?;
    let Some(current) = selection.take() else {
        return Err(UmbraError::rewrite("Statement has no WHERE clause"));
    };

    let kept: Vec<Expr> = flatten_conjuncts(&current)
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !removed.contains(index))
        .map(|(_, expr)| expr.clone())
        .collect();

    // Refold left-associatively; an emptied chain drops the WHERE clause.
    *selection = kept.into_iter().reduce(|acc, expr| Expr::BinaryOp {
        left: Box::new(acc),
        op: BinaryOperator::And,
        right: Box::new(expr),
    });
    Ok(())
}

fn selection_of(statement: &mut Statement) -> Result<&mut Option<Expr>> {
    match statement {
        Statement::Update(update) => Ok(&mut update.selection),
        Statement::Delete(delete) => Ok(&mut delete.selection),
        Statement::Query(query) => match &mut *query.body {
            SetExpr::Select(select) => Ok(&mut select.selection),
            _ => Err(UmbraError::rewrite(
                "Predicate rewrite token applied to a non-SELECT query body",
            )),
        },
        _ => Err(UmbraError::rewrite(
            "Predicate rewrite token applied to a statement without WHERE",
        )),
    }
}
