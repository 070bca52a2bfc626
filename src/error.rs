use thiserror::Error;

pub type Result<T> = std::result::Result<T, LendingError>;

/// Every failure the lending core can surface.
///
/// Variants are kept distinct all the way to the request boundary: the UI,
/// the tests and the payment processor's retry logic branch on them.
#[derive(Error, Debug)]
pub enum LendingError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("application {0} not found")]
    NotFound(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("application fee already paid")]
    AlreadyPaid,
    #[error("payment signal could not be verified")]
    InvalidSignal,
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("conflicting update on application {0}")]
    Conflict(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {message}")]
    Storage { message: String, transient: bool },
    #[error("internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient_storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            transient: true,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage {
                transient: true,
                ..
            }
        )
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::AlreadyPaid => "already_paid",
            Self::InvalidSignal => "invalid_signal",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Storage { .. } => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LendingError {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain => {
                Self::transient_storage(e.to_string())
            }
            _ => Self::storage(e.to_string()),
        }
    }
}
