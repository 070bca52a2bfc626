use crate::domain::application::{Application, ApplicationId, ApplicationPatch, Expectation};
use crate::domain::ports::{ApplicationStore, UpdateOutcome};
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(25);

/// Wraps a store so that a transient storage failure is retried exactly once
/// after a short backoff. Any other result is returned unchanged.
#[derive(Clone)]
pub struct RetryingStore<S> {
    inner: S,
    backoff: Duration,
}

impl<S: ApplicationStore> RetryingStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_backoff(inner, DEFAULT_BACKOFF)
    }

    pub fn with_backoff(inner: S, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    async fn retry_once<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match call().await {
            Err(e) if e.is_transient() => {
                tracing::warn!(operation = op, error = %e, "transient storage failure, retrying once");
                tokio::time::sleep(self.backoff).await;
                call().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for RetryingStore<S> {
    async fn insert(&self, application: Application) -> Result<ApplicationId> {
        self.retry_once("insert", || self.inner.insert(application.clone()))
            .await
    }

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>> {
        self.retry_once("find_by_id", || self.inner.find_by_id(id))
            .await
    }

    async fn list(&self, owner_email: Option<&str>) -> Result<Vec<Application>> {
        self.retry_once("list", || self.inner.list(owner_email)).await
    }

    async fn conditional_update(
        &self,
        id: ApplicationId,
        expected: Expectation,
        patch: ApplicationPatch,
    ) -> Result<UpdateOutcome> {
        self.retry_once("conditional_update", || {
            self.inner.conditional_update(id, expected, patch.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LendingError;
    use crate::infrastructure::in_memory::InMemoryApplicationStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` reads with the given transience, then delegates.
    struct Flaky {
        inner: InMemoryApplicationStore,
        failures: usize,
        transient: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApplicationStore for Flaky {
        async fn insert(&self, application: Application) -> Result<ApplicationId> {
            self.inner.insert(application).await
        }

        async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(if self.transient {
                    LendingError::transient_storage("busy")
                } else {
                    LendingError::storage("corrupt")
                });
            }
            self.inner.find_by_id(id).await
        }

        async fn list(&self, owner_email: Option<&str>) -> Result<Vec<Application>> {
            self.inner.list(owner_email).await
        }

        async fn conditional_update(
            &self,
            id: ApplicationId,
            expected: Expectation,
            patch: ApplicationPatch,
        ) -> Result<UpdateOutcome> {
            self.inner.conditional_update(id, expected, patch).await
        }
    }

    fn flaky(failures: usize, transient: bool) -> RetryingStore<Flaky> {
        RetryingStore::with_backoff(
            Flaky {
                inner: InMemoryApplicationStore::new(),
                failures,
                transient,
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_single_transient_failure_is_retried() {
        let store = flaky(1, true);
        assert!(store.find_by_id(ApplicationId::new()).await.unwrap().is_none());
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_only_once() {
        let store = flaky(2, true);
        assert!(store.find_by_id(ApplicationId::new()).await.unwrap_err().is_transient());
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = flaky(1, false);
        assert!(store.find_by_id(ApplicationId::new()).await.is_err());
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 1);
    }
}
