use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::egress::{KindHint, classify_and_authorize};
use crate::error::ProbeError;
use crate::router::ProbeState;

/// Forward DNS. Guard denial is a hard 400; a resolution fault for a
/// cleared hostname is diagnostic data and comes back inline with a 200.
pub async fn dns_lookup(
    State(state): State<ProbeState>,
    Path(hostname): Path<String>,
) -> Result<Json<Value>, ProbeError> {
    let target = classify_and_authorize(&hostname, KindHint::Hostname)?;

    match state.dns.resolve(&target).await {
        Ok(answer) => Ok(Json(json!({
            "hostname": target.raw(),
            "a_records": answer.a_records,
            "aaaa_records": answer.aaaa_records,
        }))),
        Err(ProbeError::Remote(reason)) => {
            warn!(hostname = %target.raw(), error = %reason, "forward DNS failed");
            Ok(Json(json!({ "hostname": target.raw(), "error": reason })))
        }
        Err(e) => Err(e),
    }
}

pub async fn reverse_dns(
    State(state): State<ProbeState>,
    Path(ip): Path<String>,
) -> Result<Json<Value>, ProbeError> {
    let target = classify_and_authorize(&ip, KindHint::IpAddress)?;

    match state.dns.reverse(&target).await {
        Ok(name) => Ok(Json(json!({ "ip": target.raw(), "hostname": name }))),
        Err(ProbeError::Remote(reason)) => {
            warn!(ip = %target.raw(), error = %reason, "reverse DNS failed");
            Ok(Json(json!({ "ip": target.raw(), "error": reason })))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CurlParams {
    url: String,
}

pub async fn curl(
    State(state): State<ProbeState>,
    Query(params): Query<CurlParams>,
) -> Result<Json<Value>, ProbeError> {
    let target = classify_and_authorize(&params.url, KindHint::Url)?;

    match state.fetcher.fetch(&target).await {
        Ok(summary) => Ok(Json(json!({
            "url": target.raw(),
            "status_code": summary.status_code,
            "content_type": summary.content_type,
            "body_preview": summary.body_preview,
        }))),
        Err(ProbeError::Remote(reason)) => {
            warn!(url = %target.raw(), error = %reason, "outbound fetch failed");
            Ok(Json(json!({ "url": target.raw(), "error": reason })))
        }
        Err(e) => Err(e),
    }
}
