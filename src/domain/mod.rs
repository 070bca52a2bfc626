//! Domain layer: entities, value objects and the ports the core talks through.

pub mod application;
pub mod identity;
pub mod payment;
pub mod ports;
