use crate::domain::application::{Application, ApplicationId, ApplicationPatch, Expectation};
use crate::domain::ports::{ApplicationStore, UpdateOutcome};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for applications.
///
/// Uses `Arc<RwLock<HashMap<ApplicationId, Application>>>` to allow shared concurrent access.
/// The compare and the write of a conditional update happen under one write guard,
/// which makes them atomic with respect to every other caller.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    applications: Arc<RwLock<HashMap<ApplicationId, Application>>>,
}

impl InMemoryApplicationStore {
    /// Creates a new, empty in-memory application store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn insert(&self, application: Application) -> Result<ApplicationId> {
        let mut applications = self.applications.write().await;
        match applications.entry(application.id) {
            Entry::Occupied(_) => Err(LendingError::storage(format!(
                "duplicate application id {}",
                application.id
            ))),
            Entry::Vacant(slot) => {
                let id = application.id;
                slot.insert(application);
                Ok(id)
            }
        }
    }

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>> {
        let applications = self.applications.read().await;
        Ok(applications.get(&id).cloned())
    }

    async fn list(&self, owner_email: Option<&str>) -> Result<Vec<Application>> {
        let applications = self.applications.read().await;
        let mut matching: Vec<Application> = applications
            .values()
            .filter(|app| owner_email.is_none_or(|owner| app.borrower_email == owner))
            .cloned()
            .collect();
        matching.sort_by_key(|app| (app.created_at, *app.id.as_uuid()));
        Ok(matching)
    }

    async fn conditional_update(
        &self,
        id: ApplicationId,
        expected: Expectation,
        patch: ApplicationPatch,
    ) -> Result<UpdateOutcome> {
        let mut applications = self.applications.write().await;
        let Some(application) = applications.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if !expected.matches(application) {
            return Ok(UpdateOutcome::Conflict(application.clone()));
        }
        application.apply(&patch);
        Ok(UpdateOutcome::Applied(application.clone()))
    }
}
