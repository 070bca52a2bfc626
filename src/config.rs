use crate::application::auth::SessionAuthenticator;
use crate::application::payments::PaymentSettings;
use crate::domain::identity::{IdentityClaim, Role};
use crate::domain::payment::Amount;
use crate::error::{LendingError, Result};
use crate::infrastructure::stripe::{DEFAULT_API_BASE, StripeSettings};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_APPLICATION_FEE: Decimal = dec!(10.00);
const SEVEN_DAYS_SECS: i64 = 7 * 24 * 60 * 60;

/// Session token settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// HS256 secret used to sign and verify session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of tokens minted by this process
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = SEVEN_DAYS_SECS)]
    pub session_ttl_secs: i64,
}

impl AuthArgs {
    pub fn authenticator(&self) -> SessionAuthenticator {
        SessionAuthenticator::new(
            &SecretString::from(self.jwt_secret.clone()),
            self.session_ttl_secs,
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Processor API key
    #[arg(long, env = "STRIPE_SECRET", hide_env_values = true)]
    pub stripe_secret: String,

    /// Secret used to verify processor webhook signatures
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
    pub stripe_webhook_secret: String,

    #[arg(long, env = "STRIPE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub stripe_api_base: String,

    /// Front-end origin used for checkout success and cancel redirects
    #[arg(long, env = "CLIENT_ORIGIN", default_value = "http://localhost:5173")]
    pub client_origin: String,

    /// Fixed application fee in major currency units
    #[arg(long, env = "APPLICATION_FEE", default_value_t = DEFAULT_APPLICATION_FEE)]
    pub application_fee: Decimal,

    #[arg(long, env = "FEE_CURRENCY", default_value = "usd")]
    pub fee_currency: String,

    /// Upper bound on payment session creation
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value_t = 10_000)]
    pub gateway_timeout_ms: u64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,
}

impl ServeArgs {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    /// # Errors
    ///
    /// Rejects a fee that is not positive or rounds to zero minor units.
    pub fn payment_settings(&self) -> Result<PaymentSettings> {
        let fee = Amount::new(self.application_fee)?;
        if fee.minor_units()? < 1 {
            return Err(LendingError::Validation(format!(
                "application fee {} is below the smallest chargeable unit",
                self.application_fee
            )));
        }
        Ok(PaymentSettings {
            fee,
            currency: self.fee_currency.to_lowercase(),
            gateway_timeout: self.gateway_timeout(),
        })
    }

    pub fn stripe_settings(&self) -> StripeSettings {
        StripeSettings {
            api_base: self.stripe_api_base.clone(),
            secret_key: SecretString::from(self.stripe_secret.clone()),
            webhook_secret: SecretString::from(self.stripe_webhook_secret.clone()),
            client_origin: self.client_origin.clone(),
            request_timeout: self.gateway_timeout(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IssueTokenArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    #[arg(long)]
    pub subject: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, default_value = "borrower")]
    pub role: Role,
}

impl IssueTokenArgs {
    pub fn identity(&self) -> IdentityClaim {
        IdentityClaim::new(&self.subject, &self.email, self.role)
    }
}
