use crate::domain::application::ApplicationId;
use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A positive fee amount in major currency units.
///
/// The application fee is fixed by configuration; this type guarantees it can
/// never be zero or negative once constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LendingError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Amount in the currency's minor unit (cents), as payment processors expect.
    pub fn minor_units(&self) -> Result<i64> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| LendingError::Validation(format!("amount {} out of range", self.0)))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LendingError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// What the coordinator asks the processor for when a borrower starts paying.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub application_id: ApplicationId,
    pub borrower_email: String,
    pub description: String,
    pub amount: Amount,
    pub currency: String,
}

/// Opaque handle returned to the caller; `url` is the redirect target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub url: String,
    pub session_id: String,
}

/// An authentic completion signal, already traced back to its application.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    pub application_id: ApplicationId,
    pub external_reference: String,
}

/// Outcome of verifying a raw processor notification.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSignal {
    Completed(VerifiedPayment),
    /// Authentic, but not an event that settles a fee.
    Ignored { event_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LendingError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LendingError::Validation(_))
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Amount::new(dec!(10)).unwrap().minor_units().unwrap(), 1000);
        assert_eq!(Amount::new(dec!(0.015)).unwrap().minor_units().unwrap(), 2);
        assert_eq!(Amount::new(dec!(12.34)).unwrap().minor_units().unwrap(), 1234);
    }
}
