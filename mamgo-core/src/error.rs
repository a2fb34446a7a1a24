use thiserror::Error;

use crate::models::OrderStatus;

/// Discriminated failure kinds for every core operation. Only
/// `Transient` is safe to retry; the rest are definitive.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("cannot transition order from {current} to {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Transient(String),
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

impl From<diesel::result::Error> for CoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => CoreError::NotFound("record"),
            other => CoreError::Transient(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for CoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        CoreError::Transient(err.to_string())
    }
}
