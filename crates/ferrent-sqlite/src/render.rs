//! Renders the query model as SQLite SQL.
//!
//! Identifiers arrive already escaped by [`quote_identifier`]; values are
//! always bound as `?` parameters in the order they appear in the text.

use std::fmt::Write;

use ferrent_core::query::{Column, JoinKind, Operation, TableRef};
use ferrent_core::{Query, QueryKind, SqlValue};
use ferrent_orm::{DriverError, DriverResult};

/// SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Values for the `?` placeholders.
    pub arguments: Vec<SqlValue>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            arguments: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    fn bind(&mut self, value: &SqlValue) {
        self.sql.push('?');
        self.arguments.push(value.clone());
    }
}

/// Quotes an identifier with double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a statement.
///
/// # Errors
///
/// Returns a [`DriverError`] when the query lacks a part its kind needs.
pub fn render(query: &Query) -> DriverResult<Statement> {
    match query.kind {
        QueryKind::Raw => {
            let sql = query
                .raw_sql
                .clone()
                .ok_or_else(|| DriverError::new("raw statement without SQL"))?;
            Ok(Statement {
                sql,
                arguments: query.arguments.clone(),
            })
        }
        QueryKind::Select => render_select(query),
        QueryKind::Insert => render_insert(query),
        QueryKind::Update => render_update(query),
        QueryKind::Delete => render_delete(query),
    }
}

fn target(query: &Query) -> DriverResult<&TableRef> {
    query
        .table
        .as_ref()
        .ok_or_else(|| DriverError::new(format!("{} statement without a table", query.kind)))
}

fn render_select(query: &Query) -> DriverResult<Statement> {
    let table = target(query)?;
    if query.columns.is_empty() {
        return Err(DriverError::new("select without columns"));
    }
    let mut stmt = Statement::new();
    stmt.push("SELECT ");
    let columns: Vec<String> = query.columns.iter().map(column_expr).collect();
    stmt.push(&columns.join(", "));
    stmt.push(" FROM ");
    stmt.push(&table_name(table));
    for join in &query.joins {
        let keyword = match join.kind {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
        };
        stmt.push(keyword);
        stmt.push(&table_name(&join.table));
        stmt.push(" ON ");
        stmt.push(&column_expr(&join.left));
        stmt.push(" = ");
        stmt.push(&column_expr(&join.right));
    }
    push_where(&mut stmt, query.filter.as_ref());
    if !query.order_by.is_empty() {
        let terms: Vec<String> = query
            .order_by
            .iter()
            .map(|o| {
                let dir = if o.descending { "DESC" } else { "ASC" };
                format!("{} {dir}", column_expr(&o.column))
            })
            .collect();
        stmt.push(" ORDER BY ");
        stmt.push(&terms.join(", "));
    }
    match (query.limit, query.offset) {
        (Some(limit), Some(offset)) => {
            let _ = write!(stmt.sql, " LIMIT {limit} OFFSET {offset}");
        }
        (Some(limit), None) => {
            let _ = write!(stmt.sql, " LIMIT {limit}");
        }
        // SQLite has no OFFSET without LIMIT
        (None, Some(offset)) => {
            let _ = write!(stmt.sql, " LIMIT -1 OFFSET {offset}");
        }
        (None, None) => {}
    }
    Ok(stmt)
}

/// Renders the statements of an insert.
///
/// SQLite returns `RETURNING` rows in no guaranteed order and accepts
/// `DEFAULT VALUES` for a single row only, so a query with a returning
/// column or without columns renders one statement per row. Anything else
/// is a single multi-row `INSERT`.
pub(crate) fn render_insert_rows(query: &Query) -> DriverResult<Vec<Statement>> {
    if query.columns.is_empty() {
        let stmt = render_insert(query)?;
        return Ok(vec![stmt; query.rows.len().max(1)]);
    }
    if query.returning.is_none() || query.rows.len() < 2 {
        return Ok(vec![render_insert(query)?]);
    }
    let mut single = Query {
        rows: Vec::new(),
        ..query.clone()
    };
    query
        .rows
        .iter()
        .map(|row| {
            single.rows = vec![row.clone()];
            render_insert(&single)
        })
        .collect()
}

fn render_insert(query: &Query) -> DriverResult<Statement> {
    let table = target(query)?;
    if query.columns.is_empty() {
        let mut stmt = Statement::new();
        stmt.push(&format!("INSERT INTO {} DEFAULT VALUES", table_name(table)));
        push_returning(&mut stmt, query);
        return Ok(stmt);
    }
    if query.rows.is_empty() {
        return Err(DriverError::new("insert without rows"));
    }
    let mut stmt = Statement::new();
    stmt.push("INSERT INTO ");
    stmt.push(&table_name(table));
    let names: Vec<&str> = query.columns.iter().map(|c| c.name.as_str()).collect();
    let _ = write!(stmt.sql, " ({}) VALUES ", names.join(", "));
    for (i, row) in query.rows.iter().enumerate() {
        if row.len() != query.columns.len() {
            return Err(DriverError::new(format!(
                "insert row {i} has {} values for {} columns",
                row.len(),
                query.columns.len()
            )));
        }
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push("(");
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                stmt.push(", ");
            }
            stmt.bind(value);
        }
        stmt.push(")");
    }
    push_returning(&mut stmt, query);
    Ok(stmt)
}

fn push_returning(stmt: &mut Statement, query: &Query) {
    if let Some(returning) = &query.returning {
        stmt.push(" RETURNING ");
        stmt.push(&returning.name);
    }
}

fn render_update(query: &Query) -> DriverResult<Statement> {
    let table = target(query)?;
    if query.sets.is_empty() {
        return Err(DriverError::new("update without assignments"));
    }
    let mut stmt = Statement::new();
    stmt.push("UPDATE ");
    stmt.push(&table_name(table));
    stmt.push(" SET ");
    for (i, set) in query.sets.iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push(&set.column.name);
        stmt.push(" = ");
        stmt.bind(&set.value);
    }
    push_where(&mut stmt, query.filter.as_ref());
    Ok(stmt)
}

fn render_delete(query: &Query) -> DriverResult<Statement> {
    let table = target(query)?;
    let mut stmt = Statement::new();
    stmt.push("DELETE FROM ");
    stmt.push(&table_name(table));
    push_where(&mut stmt, query.filter.as_ref());
    Ok(stmt)
}

fn push_where(stmt: &mut Statement, filter: Option<&Operation>) {
    if let Some(filter) = filter {
        stmt.push(" WHERE ");
        push_operation(stmt, filter);
    }
}

fn push_operation(stmt: &mut Statement, operation: &Operation) {
    match operation {
        Operation::Compare { column, op, value } => {
            let _ = write!(stmt.sql, "{} {op} ", column_expr(column));
            stmt.bind(value);
        }
        Operation::CompareColumns { left, op, right } => {
            let _ = write!(
                stmt.sql,
                "{} {op} {}",
                column_expr(left),
                column_expr(right)
            );
        }
        Operation::IsNull(column) => {
            let _ = write!(stmt.sql, "{} IS NULL", column_expr(column));
        }
        Operation::IsNotNull(column) => {
            let _ = write!(stmt.sql, "{} IS NOT NULL", column_expr(column));
        }
        Operation::InList {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                stmt.push(if *negated { "1 = 1" } else { "1 = 0" });
                return;
            }
            stmt.push(&column_expr(column));
            stmt.push(if *negated { " NOT IN (" } else { " IN (" });
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    stmt.push(", ");
                }
                stmt.bind(value);
            }
            stmt.push(")");
        }
        Operation::And(left, right) => push_binary(stmt, left, "AND", right),
        Operation::Or(left, right) => push_binary(stmt, left, "OR", right),
        Operation::Not(inner) => {
            stmt.push("NOT (");
            push_operation(stmt, inner);
            stmt.push(")");
        }
    }
}

fn push_binary(stmt: &mut Statement, left: &Operation, keyword: &str, right: &Operation) {
    stmt.push("(");
    push_operation(stmt, left);
    let _ = write!(stmt.sql, ") {keyword} (");
    push_operation(stmt, right);
    stmt.push(")");
}

pub(crate) fn table_name(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!("{schema}.{}", table.name),
        None => table.name.clone(),
    }
}

fn column_expr(column: &Column) -> String {
    let mut expr = match &column.schema {
        Some(schema) => format!("{schema}.{}.{}", column.table, column.name),
        None => format!("{}.{}", column.table, column.name),
    };
    if let Some(function) = column.function {
        expr = format!("{}({expr})", function.sql_name());
    }
    if let Some(aggregate) = column.aggregate {
        expr = format!("{}({expr})", aggregate.sql_name());
    }
    expr
}

#[cfg(test)]
mod tests {
    use ferrent_core::query::{Aggregate, Assignment, CompareOp, Function, Join, OrderBy};

    use super::*;

    fn animals() -> TableRef {
        TableRef {
            schema: None,
            name: "\"animals\"".to_string(),
        }
    }

    fn column(table: &str, name: &str) -> Column {
        Column {
            schema: None,
            table: format!("\"{table}\""),
            name: format!("\"{name}\""),
            aggregate: None,
            function: None,
        }
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("animals"), "\"animals\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    // =========================================================================
    // Selects
    // =========================================================================

    #[test]
    fn test_select_with_join_order_and_paging() {
        let mut query = Query::new(QueryKind::Select, Some(animals()));
        query.columns = vec![column("animals", "id"), column("habitats", "name")];
        query.joins.push(Join {
            kind: JoinKind::Left,
            table: TableRef {
                schema: None,
                name: "\"habitats\"".to_string(),
            },
            left: column("animals", "habitat_id"),
            right: column("habitats", "id"),
        });
        query.filter = Some(Operation::Compare {
            column: column("animals", "name"),
            op: CompareOp::Like,
            value: SqlValue::Text("L%".to_string()),
        });
        query.order_by.push(OrderBy {
            column: column("animals", "id"),
            descending: true,
        });
        query.limit = Some(10);
        query.offset = Some(20);

        let stmt = render(&query).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"animals\".\"id\", \"habitats\".\"name\" FROM \"animals\" \
             LEFT JOIN \"habitats\" ON \"animals\".\"habitat_id\" = \"habitats\".\"id\" \
             WHERE \"animals\".\"name\" LIKE ? ORDER BY \"animals\".\"id\" DESC \
             LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.arguments, vec![SqlValue::Text("L%".to_string())]);
    }

    #[test]
    fn test_offset_without_limit() {
        let mut query = Query::new(QueryKind::Select, Some(animals()));
        query.columns = vec![column("animals", "id")];
        query.offset = Some(5);
        assert!(render(&query).unwrap().sql.ends_with("LIMIT -1 OFFSET 5"));
    }

    #[test]
    fn test_aggregate_and_function_columns() {
        let mut query = Query::new(QueryKind::Select, Some(animals()));
        let mut count = column("animals", "id");
        count.aggregate = Some(Aggregate::Count);
        let mut upper = column("animals", "name");
        upper.function = Some(Function::Upper);
        query.columns = vec![count, upper];
        assert_eq!(
            render(&query).unwrap().sql,
            "SELECT COUNT(\"animals\".\"id\"), UPPER(\"animals\".\"name\") FROM \"animals\""
        );
    }

    #[test]
    fn test_nested_predicates() {
        let name = column("animals", "name");
        let filter = Operation::IsNull(column("animals", "habitat_id"))
            .or(Operation::Compare {
                column: name.clone(),
                op: CompareOp::Eq,
                value: SqlValue::Text("Cat".to_string()),
            })
            .and(Operation::Not(Box::new(Operation::InList {
                column: name,
                values: vec![SqlValue::Text("Dog".into()), SqlValue::Text("Eel".into())],
                negated: false,
            })));
        let mut stmt = Statement::new();
        push_operation(&mut stmt, &filter);
        assert_eq!(
            stmt.sql,
            "((\"animals\".\"habitat_id\" IS NULL) OR (\"animals\".\"name\" = ?)) \
             AND (NOT (\"animals\".\"name\" IN (?, ?)))"
        );
        assert_eq!(stmt.arguments.len(), 3);
    }

    #[test]
    fn test_empty_in_lists() {
        let mut stmt = Statement::new();
        push_operation(
            &mut stmt,
            &Operation::InList {
                column: column("animals", "id"),
                values: Vec::new(),
                negated: false,
            },
        );
        assert_eq!(stmt.sql, "1 = 0");

        let mut stmt = Statement::new();
        push_operation(
            &mut stmt,
            &Operation::InList {
                column: column("animals", "id"),
                values: Vec::new(),
                negated: true,
            },
        );
        assert_eq!(stmt.sql, "1 = 1");
        assert!(stmt.arguments.is_empty());
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    #[test]
    fn test_insert_many_rows_returning() {
        let mut query = Query::new(QueryKind::Insert, Some(animals()));
        query.columns = vec![column("animals", "name"), column("animals", "origin")];
        query.rows = vec![
            vec![SqlValue::Text("Cat".into()), SqlValue::Null],
            vec![SqlValue::Text("Dog".into()), SqlValue::Text("farm".into())],
        ];
        query.returning = Some(column("animals", "id"));
        let stmt = render(&query).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"animals\" (\"name\", \"origin\") VALUES (?, ?), (?, ?) RETURNING \"id\""
        );
        assert_eq!(stmt.arguments.len(), 4);
    }

    #[test]
    fn test_insert_default_values_per_row() {
        let mut query = Query::new(QueryKind::Insert, Some(animals()));
        query.rows = vec![Vec::new(), Vec::new()];
        query.returning = Some(column("animals", "id"));
        let stmts = render_insert_rows(&query).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].sql,
            "INSERT INTO \"animals\" DEFAULT VALUES RETURNING \"id\""
        );
    }

    #[test]
    fn test_insert_returning_splits_rows() {
        let mut query = Query::new(QueryKind::Insert, Some(animals()));
        query.columns = vec![column("animals", "name")];
        query.rows = vec![
            vec![SqlValue::Text("Cat".into())],
            vec![SqlValue::Text("Dog".into())],
        ];
        query.returning = Some(column("animals", "id"));
        let stmts = render_insert_rows(&query).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[1].sql,
            "INSERT INTO \"animals\" (\"name\") VALUES (?) RETURNING \"id\""
        );
        assert_eq!(stmts[1].arguments, vec![SqlValue::Text("Dog".into())]);

        query.returning = None;
        let stmts = render_insert_rows(&query).unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].arguments.len(), 2);
    }

    #[test]
    fn test_insert_row_width_mismatch() {
        let mut query = Query::new(QueryKind::Insert, Some(animals()));
        query.columns = vec![column("animals", "name")];
        query.rows = vec![vec![SqlValue::Null, SqlValue::Null]];
        assert!(render(&query).is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let mut query = Query::new(QueryKind::Update, Some(animals()));
        query.sets.push(Assignment {
            column: column("animals", "name"),
            value: SqlValue::Text("Lion".into()),
        });
        query.filter = Some(Operation::Compare {
            column: column("animals", "id"),
            op: CompareOp::Eq,
            value: SqlValue::Int(7),
        });
        let stmt = render(&query).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"animals\" SET \"name\" = ? WHERE \"animals\".\"id\" = ?"
        );
        assert_eq!(
            stmt.arguments,
            vec![SqlValue::Text("Lion".into()), SqlValue::Int(7)]
        );

        let query = Query::new(QueryKind::Delete, Some(animals()));
        assert_eq!(render(&query).unwrap().sql, "DELETE FROM \"animals\"");
    }

    #[test]
    fn test_schema_qualified_names() {
        let table = TableRef {
            schema: Some("\"auth\"".to_string()),
            name: "\"users\"".to_string(),
        };
        let mut query = Query::new(QueryKind::Select, Some(table));
        query.columns = vec![Column {
            schema: Some("\"auth\"".to_string()),
            ..column("users", "id")
        }];
        assert_eq!(
            render(&query).unwrap().sql,
            "SELECT \"auth\".\"users\".\"id\" FROM \"auth\".\"users\""
        );
    }

    #[test]
    fn test_incomplete_queries_fail() {
        assert!(render(&Query::new(QueryKind::Select, Some(animals()))).is_err());
        assert!(render(&Query::new(QueryKind::Update, Some(animals()))).is_err());
        assert!(render(&Query::new(QueryKind::Delete, None)).is_err());
        let mut raw = Query::raw("SELECT 1", Vec::new());
        raw.raw_sql = None;
        assert!(render(&raw).is_err());
    }
}
