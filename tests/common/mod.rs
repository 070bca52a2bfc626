#![allow(dead_code)]

use async_trait::async_trait;
use loanlink::application::auth::SessionAuthenticator;
use loanlink::application::lifecycle::LifecycleManager;
use loanlink::application::payments::{PaymentCoordinator, PaymentSettings};
use loanlink::domain::application::ApplicationId;
use loanlink::domain::identity::{IdentityClaim, Role};
use loanlink::domain::payment::{
    Amount, PaymentSession, PaymentSignal, SessionRequest, VerifiedPayment,
};
use loanlink::domain::ports::{PaymentGateway, PaymentGatewayRef};
use loanlink::error::{LendingError, Result};
use loanlink::infrastructure::clock::FixedClock;
use loanlink::infrastructure::in_memory::InMemoryApplicationStore;
use loanlink::infrastructure::stripe::signature::SignatureVerifier;
use loanlink::interfaces::http::{AppState, cors_layer, router};
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const CLIENT_ORIGIN: &str = "https://app.lend.test";

/// Completion event understood by [`FakeGateway`].
#[derive(Serialize, Deserialize)]
pub struct FakeEvent {
    pub application_id: String,
    pub reference: String,
}

/// In-process stand-in for the payment processor. Signals are signed with the
/// same HMAC scheme as the real adapter so verification is exercised end to end.
pub struct FakeGateway {
    verifier: SignatureVerifier,
    pub sessions_created: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            verifier: SignatureVerifier::new(SecretString::from(WEBHOOK_SECRET)),
            sessions_created: AtomicUsize::new(0),
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentSession {
            url: format!("https://checkout.test/pay/{}", request.application_id),
            session_id: format!("cs_test_{n}"),
        })
    }

    fn verify_signal(&self, raw_payload: &[u8], signature_header: &str) -> Result<PaymentSignal> {
        self.verifier.verify(raw_payload, signature_header)?;
        let event: FakeEvent =
            serde_json::from_slice(raw_payload).map_err(|_| LendingError::InvalidSignal)?;
        Ok(PaymentSignal::Completed(VerifiedPayment {
            application_id: event.application_id.parse()?,
            external_reference: event.reference,
        }))
    }
}

/// Returns the raw body and a valid signature header for a completion event.
pub fn signed_event(application_id: ApplicationId, reference: &str) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&FakeEvent {
        application_id: application_id.to_string(),
        reference: reference.to_string(),
    })
    .unwrap();
    let header = SignatureVerifier::new(SecretString::from(WEBHOOK_SECRET))
        .sign(&body, chrono::Utc::now().timestamp())
        .unwrap();
    (body, header)
}

pub fn borrower(email: &str) -> IdentityClaim {
    IdentityClaim::new(format!("sub-{email}"), email, Role::Borrower)
}

pub fn manager() -> IdentityClaim {
    IdentityClaim::new("sub-manager", "manager@lend.test", Role::Manager)
}

pub fn admin() -> IdentityClaim {
    IdentityClaim::new("sub-admin", "admin@lend.test", Role::Admin)
}

pub struct Harness {
    pub store: Arc<InMemoryApplicationStore>,
    pub gateway: Arc<FakeGateway>,
    pub clock: Arc<FixedClock>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub lifecycle: Arc<LifecycleManager>,
    pub payments: Arc<PaymentCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryApplicationStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let clock = Arc::new(FixedClock::at_secs(1_700_000_000));
        let gateway_ref: PaymentGatewayRef = gateway.clone();
        let authenticator = Arc::new(SessionAuthenticator::new(
            &SecretString::from(JWT_SECRET),
            3600,
        ));
        let lifecycle = Arc::new(LifecycleManager::new(store.clone(), clock.clone()));
        let payments = Arc::new(PaymentCoordinator::new(
            store.clone(),
            gateway_ref,
            clock.clone(),
            PaymentSettings {
                fee: Amount::new(dec!(10)).unwrap(),
                currency: "usd".to_string(),
                gateway_timeout: Duration::from_secs(2),
            },
        ));
        Self {
            store,
            gateway,
            clock,
            authenticator,
            lifecycle,
            payments,
        }
    }

    pub fn router(&self) -> axum::Router {
        router(
            AppState {
                authenticator: self.authenticator.clone(),
                lifecycle: self.lifecycle.clone(),
                payments: self.payments.clone(),
            },
            cors_layer(CLIENT_ORIGIN).unwrap(),
        )
    }

    pub fn token(&self, identity: &IdentityClaim) -> String {
        self.authenticator.issue(identity).unwrap()
    }

    pub async fn submit(&self, owner: &str) -> ApplicationId {
        self.lifecycle
            .submit(&borrower(owner), "Small business loan", serde_json::json!({"amount": 2500}))
            .await
            .unwrap()
            .id
    }
}
