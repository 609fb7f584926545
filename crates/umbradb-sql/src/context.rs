//! Statement context
//!
//! Binds a parsed statement to the semantic roles the shadow pipeline needs:
//! referenced tables, INSERT columns and value positions, WHERE equality
//! predicates, and placeholder ordinals. Built fresh for every statement
//! build and consumed read-only by judgement and rewrite.

use serde_json::Value as JsonValue;
use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName,
    ObjectNamePart, SelectItem, SetExpr, Statement, TableFactor, TableObject, TableWithJoins,
    Value,
};
use umbradb_commons::{Result, UmbraError};

use crate::metadata::RelationMetas;

/// Where a SQL value comes from at one syntactic position.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePosition {
    /// Literal value embedded in the SQL text.
    Literal(JsonValue),
    /// Bound parameter; 0-based ordinal into the parameter list.
    Parameter(usize),
    /// Expression the shadow pipeline does not interpret.
    Opaque,
}

/// INSERT-specific context: target table, resolved column list, and the
/// value position of every (row, column) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertContext {
    pub table: String,
    pub columns: Vec<String>,
    /// Whether the column list was written in the SQL text (vs. resolved
    /// from relation metadata).
    pub explicit_columns: bool,
    pub rows: Vec<Vec<ValuePosition>>,
}

impl InsertContext {
    /// Case-insensitive column lookup.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }
}

/// One `column = value` equality from a WHERE clause AND-chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateContext {
    pub column: String,
    pub value: ValuePosition,
    /// Index of this predicate within the flattened AND-chain.
    pub conjunct: usize,
}

/// Read-only semantic view over one parsed statement.
#[derive(Debug, Clone)]
pub struct StatementContext {
    statement: Statement,
    tables: Vec<String>,
    insert: Option<InsertContext>,
    predicates: Vec<PredicateContext>,
    has_placeholders: bool,
}

impl StatementContext {
    /// Bind `statement` against the current relation metadata.
    ///
    /// Fails with [`UmbraError::Rewrite`] when an INSERT without an explicit
    /// column list targets a table unknown to the metadata, or when the
    /// value arity does not match the column list.
    pub fn new(statement: Statement, metas: &RelationMetas) -> Result<Self> {
        let mut binder = Binder::default();
        let tables;
        let mut insert = None;
        let mut predicates = Vec::new();

        match &statement {
            Statement::Insert(ast) => {
                let table = match &ast.table {
                    TableObject::TableName(name) => table_name(name),
                    _ => {
                        return Err(UmbraError::rewrite(
                            "Unsupported INSERT target (expected a table name)",
                        ))
                    }
                };
                tables = vec![table.clone()];
                insert = Some(binder.bind_insert(table, ast, metas)?);
            }
            Statement::Update(update) => {
                tables = tables_of(std::slice::from_ref(&update.table));
                for assignment in &update.assignments {
                    // SET values come before WHERE in the text; keep the
                    // placeholder counter aligned.
                    binder.skip_expr(&assignment.value);
                }
                if let Some(selection) = &update.selection {
                    predicates = binder.bind_predicates(selection);
                }
            }
            Statement::Delete(delete) => {
                let from = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        tables
                    }
                };
                tables = tables_of(from);
                if let Some(selection) = &delete.selection {
                    predicates = binder.bind_predicates(selection);
                }
            }
            Statement::Query(query) => {
                if let SetExpr::Select(select) = &*query.body {
                    tables = tables_of(&select.from);
                    for item in &select.projection {
                        match item {
                            SelectItem::UnnamedExpr(expr)
                            | SelectItem::ExprWithAlias { expr, .. } => binder.skip_expr(expr),
                            _ => {}
                        }
                    }
                    if let Some(selection) = &select.selection {
                        predicates = binder.bind_predicates(selection);
                    }
                } else {
                    tables = Vec::new();
                }
            }
            _ => {
                tables = Vec::new();
            }
        }

        Ok(Self {
            statement,
            tables,
            insert,
            predicates,
            has_placeholders: binder.saw_placeholder,
        })
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn insert(&self) -> Option<&InsertContext> {
        self.insert.as_ref()
    }

    pub fn predicates(&self) -> &[PredicateContext] {
        &self.predicates
    }

    /// Whether the statement binds any placeholder (`?` or `$n`). Decides
    /// the judgement engine variant.
    pub fn has_placeholders(&self) -> bool {
        self.has_placeholders
    }
}

/// Flatten a WHERE clause's top-level AND-chain in source order.
pub fn flatten_conjuncts(expr: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    collect_conjuncts(expr, &mut out);
    out
}

fn collect_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if let Expr::BinaryOp {
        left,
        op: BinaryOperator::And,
        right,
    } = expr
    {
        collect_conjuncts(left, out);
        collect_conjuncts(right, out);
    } else {
        out.push(expr);
    }
}

/// Walks value expressions in source order, assigning placeholder ordinals.
#[derive(Default)]
struct Binder {
    next_ordinal: usize,
    saw_placeholder: bool,
}

impl Binder {
    fn bind_insert(
        &mut self,
        table: String,
        ast: &sqlparser::ast::Insert,
        metas: &RelationMetas,
    ) -> Result<InsertContext> {
        let explicit_columns = !ast.columns.is_empty();
        let columns: Vec<String> = if explicit_columns {
            ast.columns.iter().map(|c| c.value.clone()).collect()
        } else {
            metas
                .columns_of(&table)
                .ok_or_else(|| {
                    UmbraError::rewrite(format!(
                        "Cannot resolve columns of unknown table: {}",
                        table
                    ))
                })?
                .to_vec()
        };

        let mut rows = Vec::new();
        if let Some(source) = &ast.source {
            if let SetExpr::Values(values) = &*source.body {
                for row in &values.rows {
                    if row.len() != columns.len() {
                        return Err(UmbraError::rewrite(format!(
                            "INSERT value count {} does not match column count {} for table {}",
                            row.len(),
                            columns.len(),
                            table
                        )));
                    }
                    rows.push(row.iter().map(|expr| self.bind_value(expr)).collect());
                }
            }
        }

        Ok(InsertContext {
            table,
            columns,
            explicit_columns,
            rows,
        })
    }

    fn bind_predicates(&mut self, selection: &Expr) -> Vec<PredicateContext> {
        let mut predicates = Vec::new();
        for (conjunct, expr) in flatten_conjuncts(selection).into_iter().enumerate() {
            match expr {
                Expr::BinaryOp {
                    left,
                    op: BinaryOperator::Eq,
                    right,
                } => {
                    if let Some(column) = column_of(left) {
                        let value = self.bind_value(right);
                        predicates.push(PredicateContext {
                            column,
                            value,
                            conjunct,
                        });
                    } else if let Some(column) = column_of(right) {
                        // value = column form; the value still comes first
                        // in the text, so bind it before recording.
                        let value = self.bind_value(left);
                        predicates.push(PredicateContext {
                            column,
                            value,
                            conjunct,
                        });
                    } else {
                        self.skip_expr(expr);
                    }
                }
                other => self.skip_expr(other),
            }
        }
        predicates
    }

    /// Classify one value expression, consuming a placeholder ordinal when
    /// it binds positionally.
    fn bind_value(&mut self, expr: &Expr) -> ValuePosition {
        match expr {
            Expr::Value(value) => match &value.value {
                Value::Placeholder(placeholder) => self.bind_placeholder(placeholder),
                other => ValuePosition::Literal(json_from_sql_value(other)),
            },
            Expr::Identifier(ident) if ident.value.starts_with('$') => {
                self.bind_placeholder(&ident.value)
            }
            other => {
                self.skip_expr(other);
                ValuePosition::Opaque
            }
        }
    }

    fn bind_placeholder(&mut self, placeholder: &str) -> ValuePosition {
        self.saw_placeholder = true;
        if let Some(index) = explicit_placeholder_index(placeholder) {
            return ValuePosition::Parameter(index);
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ValuePosition::Parameter(ordinal)
    }

    /// Advance the ordinal counter past every positional placeholder inside
    /// an expression the pipeline does not otherwise interpret.
    fn skip_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Value(value) => {
                if let Value::Placeholder(placeholder) = &value.value {
                    self.bind_placeholder(placeholder);
                }
            }
            Expr::Identifier(ident) if ident.value.starts_with('$') => {
                self.bind_placeholder(&ident.value);
            }
            Expr::BinaryOp { left, right, .. } => {
                self.skip_expr(left);
                self.skip_expr(right);
            }
            Expr::UnaryOp { expr, .. } => self.skip_expr(expr),
            Expr::Nested(inner) => self.skip_expr(inner),
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => self.skip_expr(inner),
            Expr::InList { expr, list, .. } => {
                self.skip_expr(expr);
                for item in list {
                    self.skip_expr(item);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.skip_expr(expr);
                self.skip_expr(low);
                self.skip_expr(high);
            }
            Expr::Function(func) => {
                if let FunctionArguments::List(args) = &func.args {
                    for arg in &args.args {
                        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(inner)) = arg {
                            self.skip_expr(inner);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// `$n` placeholders carry their index explicitly (1-based in the text).
fn explicit_placeholder_index(placeholder: &str) -> Option<usize> {
    let stripped = placeholder.strip_prefix('$')?;
    let index: usize = stripped.parse().ok()?;
    if index == 0 {
        return None;
    }
    Some(index - 1)
}

/// Extract the column name from an identifier expression; qualified
/// references keep only the final part.
fn column_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) if !ident.value.starts_with('$') => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        _ => None,
    }
}

/// Simple table name of an object reference (final identifier part).
fn table_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .filter_map(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
            _ => None,
        })
        .next_back()
        .unwrap_or_default()
}

fn tables_of(from: &[TableWithJoins]) -> Vec<String> {
    let mut tables = Vec::new();
    for table_with_joins in from {
        push_relation(&table_with_joins.relation, &mut tables);
        for join in &table_with_joins.joins {
            push_relation(&join.relation, &mut tables);
        }
    }
    tables
}

fn push_relation(relation: &TableFactor, out: &mut Vec<String>) {
    if let TableFactor::Table { name, .. } = relation {
        out.push(table_name(name));
    }
}

/// Convert a SQL literal into the pipeline's value currency.
fn json_from_sql_value(value: &Value) -> JsonValue {
    match value {
        Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                JsonValue::Number(i.into())
            } else if let Ok(f) = n.parse::<f64>() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            } else {
                JsonValue::String(n.clone())
            }
        }
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
            JsonValue::String(s.clone())
        }
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Null => JsonValue::Null,
        other => JsonValue::String(other.to_string()),
    }
}
