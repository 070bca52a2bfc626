use crate::application::auth::DECIDERS;
use crate::domain::application::{
    Application, ApplicationId, ApplicationPatch, Expectation, FeePayment, FeeStatus,
};
use crate::domain::identity::IdentityClaim;
use crate::domain::payment::{Amount, PaymentSession, PaymentSignal, SessionRequest};
use crate::domain::ports::{ApplicationStoreRef, ClockRef, PaymentGatewayRef, UpdateOutcome};
use crate::error::{LendingError, Result};
use std::time::Duration;
use tracing::{error, info, warn};

/// Process-wide payment settings. The fee is never taken from the caller.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub fee: Amount,
    pub currency: String,
    pub gateway_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// This call marked the fee paid.
    Reconciled(Application),
    /// The fee was already paid; nothing was written.
    AlreadyReconciled(Application),
}

impl ReconcileOutcome {
    pub fn application(&self) -> &Application {
        match self {
            Self::Reconciled(app) | Self::AlreadyReconciled(app) => app,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Reconciled(ReconcileOutcome),
    Ignored { event_type: String },
}

/// Binds payment sessions to applications and reconciles completion signals
/// against them, marking a fee paid at most once.
pub struct PaymentCoordinator {
    store: ApplicationStoreRef,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
    settings: PaymentSettings,
}

impl PaymentCoordinator {
    pub fn new(
        store: ApplicationStoreRef,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            settings,
        }
    }

    /// Opens a checkout session for the application's fee.
    ///
    /// Never writes to the store: a timeout or gateway failure leaves the
    /// application exactly as it was.
    pub async fn initiate_payment(
        &self,
        id: ApplicationId,
        caller: &IdentityClaim,
    ) -> Result<PaymentSession> {
        let application = self.load(id).await?;
        if !caller.owns(&application.borrower_email) && !DECIDERS.allows(caller.role) {
            return Err(LendingError::Forbidden(
                "application belongs to another borrower".to_string(),
            ));
        }
        if application.is_paid() {
            info!(application_id = %id, "fee already paid, no session created");
            return Err(LendingError::AlreadyPaid);
        }

        let request = SessionRequest {
            application_id: application.id,
            borrower_email: application.borrower_email.clone(),
            description: application.loan_title.clone(),
            amount: self.settings.fee,
            currency: self.settings.currency.clone(),
        };

        let session =
            match tokio::time::timeout(self.settings.gateway_timeout, self.gateway.create_session(request))
                .await
            {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => {
                    error!(application_id = %id, error = %e, "payment session creation failed");
                    return Err(match e {
                        LendingError::GatewayUnavailable(_) => e,
                        other => LendingError::GatewayUnavailable(other.to_string()),
                    });
                }
                Err(_) => {
                    error!(application_id = %id, timeout = ?self.settings.gateway_timeout, "payment gateway timed out");
                    return Err(LendingError::GatewayUnavailable(
                        "session creation timed out".to_string(),
                    ));
                }
            };

        info!(application_id = %id, session_id = %session.session_id, "payment session created");
        Ok(session)
    }

    /// Verifies a raw processor notification and, if it settles a fee, reconciles it.
    pub async fn handle_signal(
        &self,
        raw_payload: &[u8],
        signature_header: &str,
    ) -> Result<SignalOutcome> {
        let signal = self
            .gateway
            .verify_signal(raw_payload, signature_header)
            .map_err(|e| {
                warn!(error_code = e.code(), "payment signal rejected");
                LendingError::InvalidSignal
            })?;

        match signal {
            PaymentSignal::Completed(payment) => self
                .reconcile(payment.application_id, &payment.external_reference)
                .await
                .map(SignalOutcome::Reconciled),
            PaymentSignal::Ignored { event_type } => {
                info!(event_type = %event_type, "payment signal ignored");
                Ok(SignalOutcome::Ignored { event_type })
            }
        }
    }

    /// Marks the fee paid unless it already is. Replays are no-ops.
    pub async fn reconcile(
        &self,
        id: ApplicationId,
        external_reference: &str,
    ) -> Result<ReconcileOutcome> {
        let application = self.load(id).await?;
        if application.is_paid() {
            return Ok(self.replayed(application, external_reference));
        }

        let patch = ApplicationPatch::fee_paid(FeePayment {
            reference: external_reference.to_string(),
            amount: self.settings.fee,
            paid_at: self.clock.now(),
        });
        let outcome = self
            .store
            .conditional_update(id, Expectation::fee_status(FeeStatus::Unpaid), patch)
            .await?;

        match outcome {
            UpdateOutcome::Applied(updated) => {
                info!(
                    application_id = %id,
                    payment_reference = %external_reference,
                    "application fee marked paid"
                );
                Ok(ReconcileOutcome::Reconciled(updated))
            }
            UpdateOutcome::Conflict(latest) if latest.is_paid() => {
                Ok(self.replayed(latest, external_reference))
            }
            UpdateOutcome::Conflict(latest) => Err(LendingError::Conflict(latest.id.to_string())),
            UpdateOutcome::NotFound => Err(LendingError::NotFound(id.to_string())),
        }
    }

    fn replayed(&self, application: Application, external_reference: &str) -> ReconcileOutcome {
        if application.payment_reference.as_deref() == Some(external_reference) {
            info!(application_id = %application.id, "duplicate payment signal ignored");
        } else {
            warn!(
                application_id = %application.id,
                payment_reference = %external_reference,
                "payment signal for an already paid application carries a different reference"
            );
        }
        ReconcileOutcome::AlreadyReconciled(application)
    }

    async fn load(&self, id: ApplicationId) -> Result<Application> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| LendingError::NotFound(id.to_string()))
    }
}
