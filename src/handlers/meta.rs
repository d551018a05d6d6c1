use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::db::{QuerySpec, SqlValue};
use crate::error::ProbeError;
use crate::router::ProbeState;

pub async fn root(State(state): State<ProbeState>) -> Json<Value> {
    let auth_mode = if state.config.entra_auth() {
        "Entra ID Managed Identity".to_string()
    } else {
        state.config.sql_auth_mode.clone()
    };
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Diagnostic API with managed-identity database authentication",
        "auth_mode": auth_mode,
    }))
}

/// Always 200; database trouble shows up in the body, not the status.
pub async fn healthcheck(State(state): State<ProbeState>) -> Json<Value> {
    let probe = QuerySpec::new("SELECT 1 AS test", Vec::new());
    let database = match state.executor.execute(&probe).await {
        Ok(result)
            if matches!(
                result.first_row().and_then(|row| row.first()),
                Some(SqlValue::Int(1))
            ) =>
        {
            "healthy"
        }
        Ok(_) => "unhealthy",
        Err(e) => {
            error!(error = %e, "healthcheck database probe failed");
            "unhealthy"
        }
    };

    Json(json!({
        "status": "healthy",
        "database": database,
        "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
    }))
}

pub async fn ip_info(State(state): State<ProbeState>) -> Result<Json<Value>, ProbeError> {
    let host = hostname::get().map_err(|e| ProbeError::Internal(format!("hostname: {e}")))?;
    let hostname = host.to_string_lossy().into_owned();

    let local_ip = match local_ip().await {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            warn!(error = %e, "local IP detection failed");
            "Unable to determine".to_string()
        }
    };

    let public_ip = state
        .fetcher
        .public_ip()
        .await
        .unwrap_or_else(|| "Unable to determine".to_string());

    Ok(Json(json!({
        "hostname": hostname,
        "local_ip": local_ip,
        "public_ip": public_ip,
    })))
}

/// Address of the interface that default-routes outward; connecting a UDP
/// socket selects it without sending a packet.
async fn local_ip() -> std::io::Result<std::net::IpAddr> {
    let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect("8.8.8.8:80").await?;
    Ok(socket.local_addr()?.ip())
}
