//! The module contains the errors the ledger engine can return.
//!
//! The errors are:
//!
//! - [`InvalidEvent`] an expense event was rejected before any mutation.
//! - [`MemberHasOpenBalance`] a member removal was attempted while some edge
//!   still touches the member.
//! - [`AggregateUnderflow`] a group total would go below zero. This only
//!   happens if a reversal was misapplied.
//! - [`GroupBusy`] the per-group lock could not be acquired in time. Nothing
//!   was written; the whole submission can be retried.
//! - [`Database`] a storage error. The enclosing DB transaction is rolled
//!   back before the error surfaces.
//!
//!  [`InvalidEvent`]: EngineError::InvalidEvent
//!  [`MemberHasOpenBalance`]: EngineError::MemberHasOpenBalance
//!  [`AggregateUnderflow`]: EngineError::AggregateUnderflow
//!  [`GroupBusy`]: EngineError::GroupBusy
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Member has open balances: {0}")]
    MemberHasOpenBalance(String),
    #[error("Aggregate underflow: {0}")]
    AggregateUnderflow(String),
    #[error("Group \"{0}\" is busy, retry later")]
    GroupBusy(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the caller may resubmit the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GroupBusy(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidEvent(a), Self::InvalidEvent(b)) => a == b,
            (Self::MemberHasOpenBalance(a), Self::MemberHasOpenBalance(b)) => a == b,
            (Self::AggregateUnderflow(a), Self::AggregateUnderflow(b)) => a == b,
            (Self::GroupBusy(a), Self::GroupBusy(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
