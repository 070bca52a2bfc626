use crate::application::auth::{ANY_ROLE, BORROWERS, DECIDERS, Guard, GuardChain, OwnerGuard};
use crate::domain::application::{
    Application, ApplicationId, ApplicationStatus, Decision, Expectation, Transition,
};
use crate::domain::identity::IdentityClaim;
use crate::domain::ports::{ApplicationStoreRef, ClockRef, UpdateOutcome};
use crate::error::{LendingError, Result};
use tracing::{info, warn};

/// The application state machine.
///
/// Every transition is a single conditional update that expects `Pending`, so
/// two concurrent decisions on the same application cannot both land.
pub struct LifecycleManager {
    store: ApplicationStoreRef,
    clock: ClockRef,
}

impl LifecycleManager {
    pub fn new(store: ApplicationStoreRef, clock: ClockRef) -> Self {
        Self { store, clock }
    }

    /// Creates a Pending/Unpaid application owned by the caller.
    pub async fn submit(
        &self,
        caller: &IdentityClaim,
        loan_title: &str,
        payload: serde_json::Value,
    ) -> Result<Application> {
        ANY_ROLE.check(caller)?;
        let loan_title = loan_title.trim();
        if loan_title.is_empty() {
            return Err(LendingError::Validation("loanTitle is required".to_string()));
        }

        let application = Application::new(&caller.email, loan_title, payload, self.clock.now());
        let id = self.store.insert(application.clone()).await?;
        info!(application_id = %id, borrower = %caller.email, "application submitted");
        Ok(application)
    }

    /// Reads an application; only its owner or a manager/admin may see it.
    pub async fn get(&self, id: ApplicationId, caller: &IdentityClaim) -> Result<Application> {
        let application = self.load(id).await?;
        if DECIDERS.allows(caller.role) || caller.owns(&application.borrower_email) {
            Ok(application)
        } else {
            Err(LendingError::Forbidden(
                "application belongs to another borrower".to_string(),
            ))
        }
    }

    /// Managers and admins see every application; anyone else only their own.
    pub async fn list(&self, caller: &IdentityClaim) -> Result<Vec<Application>> {
        ANY_ROLE.check(caller)?;
        let owner = (!DECIDERS.allows(caller.role)).then_some(caller.email.as_str());
        self.store.list(owner).await
    }

    pub async fn decide(
        &self,
        id: ApplicationId,
        decision: Decision,
        caller: &IdentityClaim,
    ) -> Result<Application> {
        DECIDERS.check(caller)?;
        let current = self.load(id).await?;
        self.transition(current, decision.into(), caller).await
    }

    pub async fn approve(&self, id: ApplicationId, caller: &IdentityClaim) -> Result<Application> {
        self.decide(id, Decision::Approve, caller).await
    }

    pub async fn reject(&self, id: ApplicationId, caller: &IdentityClaim) -> Result<Application> {
        self.decide(id, Decision::Reject, caller).await
    }

    /// Withdraws a pending application. Ownership is checked before state so a
    /// non-owner is always told `Forbidden`.
    pub async fn cancel(&self, id: ApplicationId, caller: &IdentityClaim) -> Result<Application> {
        let current = self.load(id).await?;
        // Ownership first, so a stranger learns nothing about the state.
        GuardChain::new()
            .then(OwnerGuard::new(&current.borrower_email))
            .then(BORROWERS)
            .check(caller)?;
        self.transition(current, Transition::Cancel, caller).await
    }

    async fn transition(
        &self,
        current: Application,
        transition: Transition,
        caller: &IdentityClaim,
    ) -> Result<Application> {
        let patch = current.plan_transition(transition, self.clock.now())?;
        let outcome = self
            .store
            .conditional_update(
                current.id,
                Expectation::status(ApplicationStatus::Pending),
                patch,
            )
            .await?;

        match outcome {
            UpdateOutcome::Applied(updated) => {
                info!(
                    application_id = %updated.id,
                    status = %updated.status,
                    actor = %caller.email,
                    role = %caller.role,
                    "application transitioned"
                );
                Ok(updated)
            }
            UpdateOutcome::Conflict(latest) => {
                warn!(
                    application_id = %latest.id,
                    attempted = ?transition,
                    status = %latest.status,
                    "lost race on application transition"
                );
                Err(LendingError::Conflict(latest.id.to_string()))
            }
            UpdateOutcome::NotFound => Err(LendingError::NotFound(current.id.to_string())),
        }
    }

    async fn load(&self, id: ApplicationId) -> Result<Application> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| LendingError::NotFound(id.to_string()))
    }
}
