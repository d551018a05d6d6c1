use std::time::Duration;

use tiberius::{ColumnData, ToSql};

use crate::db::session::{DbSession, SessionFactory};
use crate::error::ProbeError;

/// A statement plus its positionally bound arguments.
///
/// Statement text is always a compiled-in literal; caller input only ever
/// travels through `params`, so it can never change statement semantics. A
/// placeholder/argument arity mismatch is a programmer error and asserts at
/// construction.
pub struct QuerySpec {
    statement: &'static str,
    params: Vec<SqlParam>,
}

impl QuerySpec {
    pub fn new(statement: &'static str, params: Vec<SqlParam>) -> Self {
        assert_eq!(
            placeholder_count(statement),
            params.len(),
            "statement placeholders must match bound parameters"
        );
        Self { statement, params }
    }

    pub fn statement(&self) -> &'static str {
        self.statement
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

/// Values accepted for positional binding.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Int(i32),
    Text(String),
}

impl SqlParam {
    fn as_sql(&self) -> &dyn ToSql {
        match self {
            SqlParam::Int(v) => v,
            SqlParam::Text(s) => s,
        }
    }
}

/// Normalized scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Result of one statement. `rows: None` means the statement produced no
/// result set at all (a mutation); that is distinct from an empty set.
pub struct QueryResult {
    pub rows: Option<Vec<Vec<SqlValue>>>,
}

impl QueryResult {
    pub fn first_row(&self) -> Option<&[SqlValue]> {
        self.rows
            .as_deref()
            .and_then(|rows| rows.first())
            .map(Vec::as_slice)
    }
}

/// Executes one statement per freshly opened session.
///
/// Exactly one attempt per call: a failed statement is never silently
/// retried. Every statement auto-commits; there are no multi-statement
/// transactions here.
pub struct QueryExecutor {
    factory: SessionFactory,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(factory: SessionFactory, query_timeout: Duration) -> Self {
        Self {
            factory,
            query_timeout,
        }
    }

    pub async fn execute(&self, spec: &QuerySpec) -> Result<QueryResult, ProbeError> {
        let mut session = self.factory.open_session().await?;
        let outcome =
            tokio::time::timeout(self.query_timeout, run_statement(&mut session, spec)).await;
        // The session never outlives the call, whatever the outcome.
        drop(session);

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ProbeError::Query(e.to_string())),
            Err(_) => Err(ProbeError::Query(format!(
                "statement timed out after {}s",
                self.query_timeout.as_secs()
            ))),
        }
    }
}

async fn run_statement(
    session: &mut DbSession,
    spec: &QuerySpec,
) -> Result<QueryResult, tiberius::error::Error> {
    let params: Vec<&dyn ToSql> = spec.params().iter().map(SqlParam::as_sql).collect();
    let stream = session.client.query(spec.statement(), &params).await?;
    let result_sets = stream.into_results().await?;

    // An empty Vec of result sets is the driver's "this statement returns no
    // rows" signal; preserve it as the absent case.
    let rows = result_sets.into_iter().next().map(|set| {
        set.into_iter()
            .map(|row| row.into_iter().map(column_to_value).collect())
            .collect()
    });
    Ok(QueryResult { rows })
}

fn column_to_value(data: ColumnData<'_>) -> SqlValue {
    match data {
        ColumnData::U8(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I16(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I32(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I64(Some(v)) => SqlValue::Int(v),
        ColumnData::F32(Some(v)) => SqlValue::Float(f64::from(v)),
        ColumnData::F64(Some(v)) => SqlValue::Float(v),
        ColumnData::Bit(Some(v)) => SqlValue::Bool(v),
        ColumnData::String(Some(s)) => SqlValue::Text(s.into_owned()),
        _ => SqlValue::Null,
    }
}

/// Highest `@Pn` placeholder index in the statement (0 when unparameterized).
fn placeholder_count(statement: &str) -> usize {
    let bytes = statement.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'@' && (bytes[i + 1] == b'P' || bytes[i + 1] == b'p') {
            let mut j = i + 2;
            let mut index = 0usize;
            let mut seen_digit = false;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                index = index * 10 + usize::from(bytes[j] - b'0');
                seen_digit = true;
                j += 1;
            }
            if seen_digit {
                max = max.max(index);
                i = j;
                continue;
            }
        }
        i += 1;
    }
    max
}
