//! Application layer containing the core business logic orchestration.
//!
//! Requests arrive already authenticated into an [`IdentityClaim`](crate::domain::identity::IdentityClaim);
//! the lifecycle manager and payment coordinator gate them by role and
//! ownership, then mutate applications only through conditional updates.

pub mod auth;
pub mod lifecycle;
pub mod payments;
