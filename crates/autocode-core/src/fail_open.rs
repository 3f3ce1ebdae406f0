//! Fail-open helper for side effects that must not stop a run
//!
//! Use it for infrastructure work around the pipeline, such as exporting a
//! snapshot copy. Do not use it for stage execution or session persistence,
//! whose failures are part of the run's result.

use std::future::Future;
use tracing::warn;

use crate::{AutocodeError, Result};

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use autocode_core::fail_open::fail_open;
/// use autocode_core::Result;
///
/// async fn export() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let exported = fail_open("snapshot_export", || export()).await;
///     assert!(exported.is_some());
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    fail_open_with(operation_name, f, |_| {}).await
}

/// Like [`fail_open`], but hands the swallowed error to `on_error` so the
/// caller can record it
pub async fn fail_open_with<F, Fut, T, E>(operation_name: &str, f: F, on_error: E) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    E: FnOnce(&AutocodeError),
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            on_error(&e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, AutocodeError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(AutocodeError::Other("disk full".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_fail_open_with_reports_error() {
        let mut seen = None;
        let result = fail_open_with(
            "test_op",
            || async { Err::<i32, _>(AutocodeError::Other("disk full".to_string())) },
            |e| seen = Some(e.to_string()),
        )
        .await;
        assert_eq!(result, None);
        assert!(seen.unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_fail_open_with_skips_callback_on_success() {
        let mut called = false;
        let result = fail_open_with(
            "test_op",
            || async { Ok::<_, AutocodeError>(1) },
            |_| called = true,
        )
        .await;
        assert_eq!(result, Some(1));
        assert!(!called);
    }
}
