pub mod openweather;
pub mod weather;

use std::fmt::Display;
use std::future::Future;

/// Run a side effect whose failure must not abort the caller.
///
/// Errors are logged at warn level with `what` as context and discarded.
/// Returns the value on success so callers can still inspect it.
pub async fn best_effort<T, E, F>(what: &str, operation: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("Best-effort {} failed, continuing: {}", what, err);
            None
        }
    }
}
