//! Best-effort side effects
//!
//! Multi-step writes are not transactional. The primary write of an
//! operation propagates its error; every follow-up step (history rows,
//! secondary tables, notifications, rollups) runs through [`best_effort`],
//! which logs the outcome and swallows failures.

use std::fmt::Display;
use std::future::Future;

pub(crate) async fn best_effort<T, E, F>(step: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(value) => {
            tracing::debug!(step, "Side effect completed");
            Some(value)
        }
        Err(err) => {
            tracing::warn!(step, error = %err, "Side effect failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let ok = best_effort("ok", async { Ok::<_, String>(3) }).await;
        assert_eq!(ok, Some(3));

        let failed = best_effort("fails", async { Err::<i32, _>("boom".to_string()) }).await;
        assert_eq!(failed, None);
    }
}
