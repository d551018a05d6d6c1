use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::error;

use crate::db::{QuerySpec, SqlValue};
use crate::router::ProbeState;

const SQL_VERSION_STATEMENT: &str = "SELECT @@VERSION";
const SQL_SOURCE_IP_STATEMENT: &str =
    "SELECT CAST(CONNECTIONPROPERTY('client_net_address') AS VARCHAR(50)) AS client_ip";

/// Database failures surface as an inline `error` field with a generic
/// message; the driver detail stays in the server log.
pub async fn sql_version(State(state): State<ProbeState>) -> Json<Value> {
    let spec = QuerySpec::new(SQL_VERSION_STATEMENT, Vec::new());
    match state.executor.execute(&spec).await {
        Ok(result) => {
            let version = result
                .first_row()
                .and_then(|row| row.first())
                .and_then(SqlValue::as_text)
                .unwrap_or("Unknown")
                .to_string();
            Json(json!({ "sql_version": version }))
        }
        Err(e) => {
            error!(error = %e, "SQL version query failed");
            Json(json!({ "error": "Unable to retrieve SQL version" }))
        }
    }
}

/// The source address of this service's connection, as the database saw it.
pub async fn sql_source_ip(State(state): State<ProbeState>) -> Json<Value> {
    let spec = QuerySpec::new(SQL_SOURCE_IP_STATEMENT, Vec::new());
    match state.executor.execute(&spec).await {
        Ok(result) => {
            let source_ip = result
                .first_row()
                .and_then(|row| row.first())
                .and_then(SqlValue::as_text)
                .unwrap_or("Unknown")
                .to_string();
            Json(json!({ "source_ip": source_ip }))
        }
        Err(e) => {
            error!(error = %e, "source IP query failed");
            Json(json!({ "error": "Unable to retrieve source IP" }))
        }
    }
}
