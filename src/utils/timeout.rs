use crate::types::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Await `future`, failing with [`AppError::Timeout`] once `limit` elapses.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} exceeded {:?}",
            operation, limit
        ))),
    }
}
