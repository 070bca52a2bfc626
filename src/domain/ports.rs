use super::application::{Application, ApplicationId, ApplicationPatch, Expectation};
use super::payment::{PaymentSession, PaymentSignal, SessionRequest};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of a compare-and-swap write against one application.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The precondition held; carries the record as written.
    Applied(Application),
    /// The precondition failed; carries the record as currently stored.
    Conflict(Application),
    NotFound,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(&self, application: Application) -> Result<ApplicationId>;
    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>>;
    /// Every application, or only those owned by `owner_email`, oldest first.
    async fn list(&self, owner_email: Option<&str>) -> Result<Vec<Application>>;
    /// Atomically applies `patch` iff the stored record matches `expected`.
    async fn conditional_update(
        &self,
        id: ApplicationId,
        expected: Expectation,
        patch: ApplicationPatch,
    ) -> Result<UpdateOutcome>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession>;
    /// Checks authenticity of a raw completion notification before anything trusts it.
    fn verify_signal(&self, raw_payload: &[u8], signature_header: &str) -> Result<PaymentSignal>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ApplicationStoreRef = Arc<dyn ApplicationStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type ClockRef = Arc<dyn Clock>;
