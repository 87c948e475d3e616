//! SQL assembly helpers: identifier escaping, dynamic statements, value
//! binding, and row decoding.
//!
//! Identifiers (table and column names) are escaped before interpolation
//! into SQL text; values always travel as bound `$n` parameters.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgColumn, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};

use crate::error::{StoreError, StoreResult};
use crate::schema::Columns;

/// Escape an identifier for interpolation into SQL text.
///
/// Embedded double quotes are doubled. Dotted names are treated as
/// schema-qualified and escaped per segment.
pub fn escape_ident(name: &str) -> String {
    name.split('.')
        .map(|segment| format!("\"{}\"", segment.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Build `INSERT INTO t ("a", "b") VALUES ($1, $2)`.
///
/// `table` must already be escaped; column names are escaped here.
pub fn insert_sql(table: &str, columns: &[&str]) -> String {
    let column_list = columns
        .iter()
        .map(|column| escape_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})")
}

/// Build `UPDATE t SET "a" = $1, "b" = $2 WHERE "id" = $3`.
///
/// The filter value binds to the placeholder after the assignments.
pub fn update_by_id_sql(table: &str, columns: &[&str], id_column: &str) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", escape_ident(column), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} SET {assignments} WHERE {} = ${}",
        escape_ident(id_column),
        columns.len() + 1
    )
}

/// Bind a JSON value to the next placeholder, choosing the SQL type from
/// the JSON type. Arrays and objects bind as JSONB.
pub fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

/// Decode a result row into a column → value map.
pub fn row_to_columns(row: &PgRow) -> StoreResult<Columns> {
    let mut columns = Columns::new();
    for (index, column) in row.columns().iter().enumerate() {
        columns.insert(column.name().to_owned(), decode_column(row, index, column)?);
    }
    Ok(columns)
}

fn decode_column(row: &PgRow, index: usize, column: &PgColumn) -> StoreResult<Value> {
    let value = match column.type_info().name() {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(index)?
            .map_or(Value::Null, Value::String),
        "INT2" => int_value(row.try_get::<Option<i16>, _>(index)?.map(i64::from)),
        "INT4" => int_value(row.try_get::<Option<i32>, _>(index)?.map(i64::from)),
        "INT8" => int_value(row.try_get::<Option<i64>, _>(index)?),
        "FLOAT4" => float_value(row.try_get::<Option<f32>, _>(index)?.map(f64::from)),
        "FLOAT8" => float_value(row.try_get::<Option<f64>, _>(index)?),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)?
            .map_or(Value::Null, Value::Bool),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)?
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map_or(Value::Null, |ts| Value::String(ts.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map_or(Value::Null, |ts| Value::String(ts.and_utc().to_rfc3339())),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)?
            .map_or(Value::Null, |uuid| Value::String(uuid.to_string())),
        other => {
            return Err(StoreError::UnsupportedColumnType {
                column: column.name().to_owned(),
                ty: other.to_owned(),
            })
        }
    };
    Ok(value)
}

fn int_value(value: Option<i64>) -> Value {
    value.map_or(Value::Null, |i| Value::Number(i.into()))
}

fn float_value(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_plain_identifiers() {
        assert_eq!(escape_ident("auth_user"), "\"auth_user\"");
    }

    #[test]
    fn escapes_schema_qualified_identifiers() {
        assert_eq!(escape_ident("public.auth_user"), "\"public\".\"auth_user\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(escape_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn builds_insert_statements() {
        assert_eq!(
            insert_sql("\"auth_user\"", &["id", "username"]),
            "INSERT INTO \"auth_user\" (\"id\", \"username\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn builds_update_statements() {
        assert_eq!(
            update_by_id_sql("\"auth_key\"", &["hashed_password"], "id"),
            "UPDATE \"auth_key\" SET \"hashed_password\" = $1 WHERE \"id\" = $2"
        );
    }

    #[test]
    fn update_placeholders_stay_ordered() {
        assert_eq!(
            update_by_id_sql("\"t\"", &["a", "b", "c"], "id"),
            "UPDATE \"t\" SET \"a\" = $1, \"b\" = $2, \"c\" = $3 WHERE \"id\" = $4"
        );
    }
}
