//! Reqwest-backed checkout adapter for a Stripe-compatible processor.
//!
//! This adapter owns transport details only: form encoding of the session
//! request, HTTP error mapping, and decoding of verified webhook events.

pub mod signature;

use crate::domain::application::ApplicationId;
use crate::domain::payment::{PaymentSession, PaymentSignal, SessionRequest, VerifiedPayment};
use crate::domain::ports::PaymentGateway;
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use signature::SignatureVerifier;
use std::collections::HashMap;
use std::time::Duration;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

const PRODUCT_NAME: &str = "Loan Application Fee";
const METADATA_APPLICATION_ID: &str = "application_id";
const METADATA_BORROWER_EMAIL: &str = "borrower_email";
const SETTLING_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

pub struct StripeSettings {
    pub api_base: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub client_origin: String,
    pub request_timeout: Duration,
}

pub struct StripeCheckoutGateway {
    client: Client,
    api_base: String,
    secret_key: SecretString,
    client_origin: String,
    verifier: SignatureVerifier,
}

impl StripeCheckoutGateway {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: StripeSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| LendingError::Internal(Box::new(e)))?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key,
            client_origin: settings.client_origin.trim_end_matches('/').to_string(),
            verifier: SignatureVerifier::new(settings.webhook_secret),
        })
    }

    fn session_form(&self, request: &SessionRequest) -> Result<Vec<(&'static str, String)>> {
        let id = request.application_id.to_string();
        Ok(vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.minor_units()?.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                PRODUCT_NAME.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                request.description.clone(),
            ),
            ("client_reference_id", id.clone()),
            ("metadata[application_id]", id.clone()),
            ("metadata[borrower_email]", request.borrower_email.clone()),
            (
                "success_url",
                format!("{}/payment-success/{id}", self.client_origin),
            ),
            ("cancel_url", format!("{}/payment/cancel", self.client_origin)),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionDto {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDto {
    #[serde(rename = "type")]
    event_type: String,
    data: EventDataDto,
}

#[derive(Debug, Deserialize)]
struct EventDataDto {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletedSessionDto {
    id: String,
    payment_status: Option<String>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn unavailable(e: reqwest::Error) -> LendingError {
    LendingError::GatewayUnavailable(if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.without_url().to_string()
    })
}

/// Turns an already-authenticated event body into a signal.
fn decode_event(raw_payload: &[u8]) -> Result<PaymentSignal> {
    let event: EventDto =
        serde_json::from_slice(raw_payload).map_err(|_| LendingError::InvalidSignal)?;
    if !SETTLING_EVENTS.contains(&event.event_type.as_str()) {
        return Ok(PaymentSignal::Ignored {
            event_type: event.event_type,
        });
    }

    let session: CompletedSessionDto =
        serde_json::from_value(event.data.object).map_err(|_| LendingError::InvalidSignal)?;
    if session.payment_status.as_deref() != Some("paid") {
        return Ok(PaymentSignal::Ignored {
            event_type: format!(
                "{} ({})",
                event.event_type,
                session.payment_status.as_deref().unwrap_or("unknown")
            ),
        });
    }

    let application_id: ApplicationId = session
        .metadata
        .get(METADATA_APPLICATION_ID)
        .ok_or(LendingError::InvalidSignal)?
        .parse()
        .map_err(|_| LendingError::InvalidSignal)?;
    if !session.metadata.contains_key(METADATA_BORROWER_EMAIL) {
        tracing::debug!(session_id = %session.id, "completed session carries no borrower email");
    }

    Ok(PaymentSignal::Completed(VerifiedPayment {
        application_id,
        external_reference: session.payment_intent.unwrap_or(session.id),
    }))
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession> {
        let form = self.session_form(&request)?;
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LendingError::GatewayUnavailable(format!(
                "processor returned {status}"
            )));
        }

        let session: CheckoutSessionDto = response.json().await.map_err(unavailable)?;
        let url = session.url.ok_or_else(|| {
            LendingError::GatewayUnavailable("processor returned no checkout url".to_string())
        })?;
        Ok(PaymentSession {
            url,
            session_id: session.id,
        })
    }

    fn verify_signal(&self, raw_payload: &[u8], signature_header: &str) -> Result<PaymentSignal> {
        self.verifier.verify(raw_payload, signature_header)?;
        decode_event(raw_payload)
    }
}
