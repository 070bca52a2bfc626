use crate::domain::identity::{IdentityClaim, Role};
use crate::error::{LendingError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Claims carried inside a signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies HS256 session tokens and turns them into identity claims.
///
/// Stateless: nothing is looked up, the signature and expiry are all that is checked.
#[derive(Clone)]
pub struct SessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionAuthenticator {
    pub fn new(secret: &SecretString, ttl_secs: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl_secs,
        }
    }

    /// Mints a token for `identity`. Production tokens come from the upstream
    /// identity issuer; this exists for development and tests.
    pub fn issue(&self, identity: &IdentityClaim) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: identity.subject_id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_secs)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| LendingError::Internal(Box::new(e)))
    }

    /// Every failure collapses to `Unauthenticated`; the reason is only logged.
    pub fn authenticate(&self, token: Option<&str>) -> Result<IdentityClaim> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(LendingError::Unauthenticated)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            LendingError::Unauthenticated
        })?;

        let claims = data.claims;
        Ok(IdentityClaim::new(claims.sub, claims.email, claims.role))
    }
}

/// A request guard evaluated against the caller's identity before a handler runs.
pub trait Guard: Send + Sync {
    fn check(&self, identity: &IdentityClaim) -> Result<()>;
}

/// Passes iff the caller's role is one of `allowed`. Pure, no I/O.
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    allowed: &'static [Role],
}

impl RoleGate {
    pub const fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

impl Guard for RoleGate {
    fn check(&self, identity: &IdentityClaim) -> Result<()> {
        if self.allows(identity.role) {
            Ok(())
        } else {
            Err(LendingError::Forbidden(format!(
                "role {} may not perform this operation",
                identity.role
            )))
        }
    }
}

pub const DECIDERS: RoleGate = RoleGate::new(&[Role::Manager, Role::Admin]);
pub const BORROWERS: RoleGate = RoleGate::new(&[Role::Borrower]);
pub const ANY_ROLE: RoleGate = RoleGate::new(&[Role::Borrower, Role::Manager, Role::Admin]);

/// Passes iff the caller owns the record identified by `email`.
#[derive(Debug, Clone)]
pub struct OwnerGuard {
    email: String,
}

impl OwnerGuard {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

impl Guard for OwnerGuard {
    fn check(&self, identity: &IdentityClaim) -> Result<()> {
        if identity.owns(&self.email) {
            Ok(())
        } else {
            Err(LendingError::Forbidden(
                "only the owning borrower may do this".to_string(),
            ))
        }
    }
}

/// Ordered guards; the first failure wins.
#[derive(Default)]
pub struct GuardChain {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Box::new(guard));
        self
    }
}

impl Guard for GuardChain {
    fn check(&self, identity: &IdentityClaim) -> Result<()> {
        self.guards.iter().try_for_each(|g| g.check(identity))
    }
}
