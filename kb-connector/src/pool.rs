//! Session Pool & Connection Manager (spec §4.9).

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// One checked-out connection to the underlying graph store.
#[async_trait]
pub trait Session: Send + Sync {
    /// Executes a parameterised statement, returning raw result rows as
    /// JSON objects. Driver-specific failures must already have been
    /// translated into `DomainError` by the implementor (invalid cluster
    /// -> `NoRecordFound`, unique violation -> `RecordExists`, etc. — spec
    /// §4.9).
    async fn execute(&self, sql: &str, params: &IndexMap<String, Value>) -> DomainResult<Vec<Value>>;
}

/// Acquire/release discipline over a fixed-size pool of `Session`s.
#[async_trait]
pub trait SessionPool: Send + Sync {
    async fn acquire(&self) -> DomainResult<Box<dyn Session>>;
    async fn release(&self, session: Box<dyn Session>);
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Scoped acquisition: runs `f` against a freshly acquired session,
/// releasing it on every exit path (success, error, or panic unwind via
/// the `Drop` of whatever the pool hands back), and retries a single
/// `DatabaseConnectionError` once before surfacing it (spec §5/§7).
#[tracing::instrument(skip(pool, f))]
pub async fn with_session<'a, F, T>(pool: &'a dyn SessionPool, mut f: F) -> DomainResult<T>
where
    F: for<'s> FnMut(&'s dyn Session) -> BoxFuture<'s, DomainResult<T>> + Send,
    T: Send,
{
    let mut retried = false;
    loop {
        tracing::debug!("acquiring session");
        let session = pool.acquire().await?;
        let result = f(session.as_ref()).await;
        pool.release(session).await;
        tracing::debug!("released session");

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && !retried => {
                tracing::warn!(error = %err, "retrying once after retryable error");
                retried = true;
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FlakySession;

    #[async_trait]
    impl Session for FlakySession {
        async fn execute(&self, _sql: &str, _params: &IndexMap<String, Value>) -> DomainResult<Vec<Value>> {
            Ok(vec![])
        }
    }

    struct FlakyPool {
        failures_left: Arc<Mutex<u32>>,
        released: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl SessionPool for FlakyPool {
        async fn acquire(&self) -> DomainResult<Box<dyn Session>> {
            Ok(Box::new(FlakySession))
        }

        async fn release(&self, _session: Box<dyn Session>) {
            *self.released.lock() += 1;
        }
    }

    #[tokio::test]
    async fn retries_once_on_connection_error_then_succeeds() {
        let failures_left = Arc::new(Mutex::new(1u32));
        let released = Arc::new(Mutex::new(0u32));
        let pool = FlakyPool { failures_left: failures_left.clone(), released: released.clone() };

        let result = with_session(&pool, |_session| {
            let failures_left = failures_left.clone();
            Box::pin(async move {
                let mut left = failures_left.lock();
                if *left > 0 {
                    *left -= 1;
                    Err(DomainError::database_connection("transient"))
                } else {
                    Ok(42)
                }
            })
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*released.lock(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let pool = FlakyPool { failures_left: Arc::new(Mutex::new(0)), released: Arc::new(Mutex::new(0)) };
        let result: DomainResult<()> =
            with_session(&pool, |_s| Box::pin(async move { Err(DomainError::validation("bad input")) })).await;
        assert!(result.is_err());
    }
}
