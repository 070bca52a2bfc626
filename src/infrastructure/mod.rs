//! Adapters implementing the domain ports.

pub mod clock;
pub mod in_memory;
pub mod retry;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod stripe;
