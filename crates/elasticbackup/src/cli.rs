//! Argument parsers and exit handling shared by the two binaries.

use std::process::ExitCode;
use tracing::{error, warn};

use crate::config::Credentials;
use crate::error::Error;
use crate::store::http::normalize_host;

/// `clap` parser for sizes that must be at least 1.
pub fn positive_usize(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{value} is an invalid positive int value")),
    }
}

/// `clap` parser for durations in whole seconds that must be at least 1.
pub fn positive_u64(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{value} is an invalid positive int value")),
    }
}

/// `clap` parser for delays in (fractional) seconds.
pub fn non_negative_f64(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(format!("{value} is an invalid non-negative float value")),
    }
}

/// `clap` parser for a JSON search body.
pub fn json_object(value: &str) -> Result<serde_json::Value, String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if v.is_object() => Ok(v),
        Ok(_) => Err("query must be a JSON object".to_string()),
        Err(e) => Err(format!("query is not valid JSON: {e}")),
    }
}

/// `clap` parser for `user:pass`.
pub fn credentials(value: &str) -> Result<Credentials, String> {
    Credentials::parse(value).map_err(|e| e.to_string())
}

/// Turns the outcome of a run into a process exit code.
///
/// Precondition failures are warnings and exit 0. A rejected bulk write is
/// printed in full and exits 1, as does anything else.
pub fn finish(result: anyhow::Result<()>, host: &str) -> ExitCode {
    let Err(err) = result else {
        return ExitCode::SUCCESS;
    };

    match err.downcast_ref::<Error>() {
        Some(Error::IndexExists(index)) => {
            warn!(
                "Index {} already exists. Execute for delete: \ncurl -XDELETE {}/{}",
                index,
                normalize_host(host),
                index
            );
            ExitCode::SUCCESS
        }
        Some(e) if e.is_precondition() => {
            warn!("{}", e);
            ExitCode::SUCCESS
        }
        Some(Error::BulkRejected { batch, response }) => {
            error!("Bulk write of batch {} failed", batch);
            eprintln!("{response}");
            ExitCode::FAILURE
        }
        _ => {
            error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
