use crate::domain::payment::Amount;
use crate::error::{LendingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApplicationId {
    type Err = LendingError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| LendingError::Validation(format!("malformed application id: {s}")))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum FeeStatus {
    #[default]
    Unpaid,
    Paid,
}

/// Triggers that move an application out of `Pending`.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Approve,
    Reject,
    Cancel,
}

impl Transition {
    pub fn target(&self) -> ApplicationStatus {
        match self {
            Transition::Approve => ApplicationStatus::Approved,
            Transition::Reject => ApplicationStatus::Rejected,
            Transition::Cancel => ApplicationStatus::Cancelled,
        }
    }
}

/// Decision a manager or admin may take on a pending application.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for Transition {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Transition::Approve,
            Decision::Reject => Transition::Reject,
        }
    }
}

/// A borrower's loan application.
///
/// `status` and `application_fee_status` are owned by the lifecycle manager and
/// the payment coordinator respectively; everything in `payload` is opaque.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub borrower_email: String,
    pub loan_title: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub status: ApplicationStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub application_fee_status: FeeStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub fee_amount: Option<Amount>,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        borrower_email: impl Into<String>,
        loan_title: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            borrower_email: borrower_email.into(),
            loan_title: loan_title.into(),
            payload,
            status: ApplicationStatus::Pending,
            approved_at: None,
            application_fee_status: FeeStatus::Unpaid,
            paid_at: None,
            payment_reference: None,
            fee_amount: None,
            created_at,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.application_fee_status == FeeStatus::Paid
    }

    /// Computes the status change a transition would make, without applying it.
    pub fn plan_transition(
        &self,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<ApplicationPatch> {
        if self.status.is_terminal() {
            return Err(LendingError::InvalidTransition(format!(
                "cannot {transition:?} application {} in status {}",
                self.id, self.status
            )));
        }
        let target = transition.target();
        let approved_at = match target {
            ApplicationStatus::Approved => Some(now),
            _ => None,
        };
        Ok(ApplicationPatch {
            status: Some(target),
            approved_at: Some(approved_at),
            fee_payment: None,
        })
    }

    /// Applies a patch in place. Fee fields are only ever written once.
    pub fn apply(&mut self, patch: &ApplicationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(approved_at) = patch.approved_at {
            self.approved_at = approved_at;
        }
        if let Some(payment) = &patch.fee_payment
            && !self.is_paid()
        {
            self.application_fee_status = FeeStatus::Paid;
            self.paid_at = Some(payment.paid_at);
            self.payment_reference = Some(payment.reference.clone());
            self.fee_amount = Some(payment.amount);
        }
    }
}

/// Precondition for a conditional update; `None` fields are not compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expectation {
    pub status: Option<ApplicationStatus>,
    pub fee_status: Option<FeeStatus>,
}

impl Expectation {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            fee_status: None,
        }
    }

    pub fn fee_status(fee_status: FeeStatus) -> Self {
        Self {
            status: None,
            fee_status: Some(fee_status),
        }
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.status.is_none_or(|s| s == application.status)
            && self
                .fee_status
                .is_none_or(|f| f == application.application_fee_status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeePayment {
    pub reference: String,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
}

/// Fields written by a conditional update. `approved_at: Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub approved_at: Option<Option<DateTime<Utc>>>,
    pub fee_payment: Option<FeePayment>,
}

impl ApplicationPatch {
    pub fn fee_paid(payment: FeePayment) -> Self {
        Self {
            fee_payment: Some(payment),
            ..Self::default()
        }
    }
}
