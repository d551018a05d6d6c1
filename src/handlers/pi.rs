use axum::{Json, extract::Query};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;

use crate::error::ProbeError;

const DEFAULT_DIGITS: u32 = 1000;
const MAX_DIGITS: u32 = 10_000;

#[derive(Debug, Deserialize)]
pub struct PiParams {
    digits: Option<u32>,
}

/// CPU-load microbenchmark. The spigot runs on the blocking pool so a
/// 10,000-digit request cannot stall the async workers.
pub async fn compute_pi(Query(params): Query<PiParams>) -> Result<Json<Value>, ProbeError> {
    let digits = params.digits.unwrap_or(DEFAULT_DIGITS);
    if digits < 1 || digits > MAX_DIGITS {
        return Err(ProbeError::Validation(
            "digits must be between 1 and 10,000".to_string(),
        ));
    }

    let started = Instant::now();
    let rendered = tokio::task::spawn_blocking(move || crate::pi::pi_digits(digits as usize))
        .await
        .map_err(|e| ProbeError::Internal(format!("pi worker: {e}")))?;
    let elapsed = started.elapsed();

    Ok(Json(json!({
        "digits": digits,
        "pi": rendered,
        "computation_time": format!("{:.6}", elapsed.as_secs_f64()),
    })))
}
