use crate::domain::application::{Application, ApplicationId, ApplicationPatch, Expectation};
use crate::domain::ports::{ApplicationStore, UpdateOutcome};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use rocksdb::{IteratorMode, OptimisticTransactionDB, Options};
use std::path::Path;
use std::sync::Arc;

/// A persistent application store backed by RocksDB.
///
/// Conditional updates run inside an optimistic transaction: the record is read
/// with `get_for_update`, so a concurrent writer touching the same key makes the
/// commit fail with `Busy`, which surfaces as a transient storage error.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc`).
#[derive(Clone)]
pub struct RocksDbApplicationStore {
    db: Arc<OptimisticTransactionDB>,
}

impl RocksDbApplicationStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = OptimisticTransactionDB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn encode(application: &Application) -> Result<Vec<u8>> {
        serde_json::to_vec(application)
            .map_err(|e| LendingError::storage(format!("Serialization error: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Application> {
        serde_json::from_slice(bytes)
            .map_err(|e| LendingError::storage(format!("Deserialization error: {e}")))
    }

    fn insert_sync(&self, application: &Application) -> Result<ApplicationId> {
        let key = application.id.as_uuid().as_bytes();
        let txn = self.db.transaction();
        if txn.get_for_update(key, true)?.is_some() {
            return Err(LendingError::storage(format!(
                "duplicate application id {}",
                application.id
            )));
        }
        txn.put(key, Self::encode(application)?)?;
        txn.commit()?;
        Ok(application.id)
    }

    fn list_sync(&self, owner_email: Option<&str>) -> Result<Vec<Application>> {
        let mut matching = Vec::new();
        for entry in self.db.iterator(IteratorMode::Start) {
            let (_, bytes) = entry?;
            let application = Self::decode(&bytes)?;
            if owner_email.is_none_or(|owner| application.borrower_email == owner) {
                matching.push(application);
            }
        }
        matching.sort_by_key(|app| (app.created_at, *app.id.as_uuid()));
        Ok(matching)
    }

    fn conditional_update_sync(
        &self,
        id: ApplicationId,
        expected: Expectation,
        patch: &ApplicationPatch,
    ) -> Result<UpdateOutcome> {
        let key = id.as_uuid().as_bytes();
        let txn = self.db.transaction();
        let Some(bytes) = txn.get_for_update(key, true)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let mut application = Self::decode(&bytes)?;
        if !expected.matches(&application) {
            return Ok(UpdateOutcome::Conflict(application));
        }
        application.apply(patch);
        txn.put(key, Self::encode(&application)?)?;
        txn.commit()?;
        Ok(UpdateOutcome::Applied(application))
    }
}

#[async_trait]
impl ApplicationStore for RocksDbApplicationStore {
    async fn insert(&self, application: Application) -> Result<ApplicationId> {
        self.insert_sync(&application)
    }

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>> {
        match self.db.get(id.as_uuid().as_bytes())? {
            Some(bytes) => Self::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn list(&self, owner_email: Option<&str>) -> Result<Vec<Application>> {
        self.list_sync(owner_email)
    }

    async fn conditional_update(
        &self,
        id: ApplicationId,
        expected: Expectation,
        patch: ApplicationPatch,
    ) -> Result<UpdateOutcome> {
        self.conditional_update_sync(id, expected, &patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{ApplicationStatus, FeePayment, FeeStatus};
    use crate::domain::payment::Amount;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn application() -> Application {
        Application::new("b@x.com", "Home loan", serde_json::json!({"k": 1}), chrono::Utc::now())
    }

    #[tokio::test]
    async fn test_rocksdb_insert_and_find() {
        let dir = tempdir().unwrap();
        let store = RocksDbApplicationStore::open(dir.path()).unwrap();
        let app = application();

        let id = store.insert(app.clone()).await.unwrap();
        assert_eq!(store.find_by_id(id).await.unwrap().unwrap(), app);
        assert!(store.find_by_id(ApplicationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_conditional_update() {
        let dir = tempdir().unwrap();
        let store = RocksDbApplicationStore::open(dir.path()).unwrap();
        let id = store.insert(application()).await.unwrap();

        let patch = ApplicationPatch::fee_paid(FeePayment {
            reference: "pi_1".into(),
            amount: Amount::new(dec!(10)).unwrap(),
            paid_at: chrono::Utc::now(),
        });
        let first = store
            .conditional_update(id, Expectation::fee_status(FeeStatus::Unpaid), patch.clone())
            .await
            .unwrap();
        assert!(matches!(first, UpdateOutcome::Applied(ref a) if a.is_paid()));

        let second = store
            .conditional_update(id, Expectation::fee_status(FeeStatus::Unpaid), patch)
            .await
            .unwrap();
        assert!(matches!(second, UpdateOutcome::Conflict(_)));

        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Pending);
        assert_eq!(stored.payment_reference.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn test_rocksdb_list_by_owner() {
        let dir = tempdir().unwrap();
        let store = RocksDbApplicationStore::open(dir.path()).unwrap();
        let mine = application();
        let theirs = Application::new("o@x.com", "Boat loan", serde_json::json!({}), chrono::Utc::now());
        store.insert(mine.clone()).await.unwrap();
        store.insert(theirs).await.unwrap();

        assert_eq!(store.list(Some("b@x.com")).await.unwrap(), vec![mine]);
        assert_eq!(store.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        let app = application();
        {
            let store = RocksDbApplicationStore::open(dir.path()).unwrap();
            store.insert(app.clone()).await.unwrap();
        }
        let store = RocksDbApplicationStore::open(dir.path()).unwrap();
        assert_eq!(store.find_by_id(app.id).await.unwrap().unwrap(), app);
    }
}
