//! Domain-level error types.
//!
//! These errors are transport agnostic. Presentation code maps them to
//! messages; every variant carries a stable [`ErrorCode`] so adapters can
//! branch without string matching. No variant is fatal: all of them are
//! recoverable at the call site.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::access_policy::DenyReason;
use super::identity::Role;
use super::jobs::JobStatus;
use super::payments::PaymentId;
use super::validation::ValidationErrors;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No live session.
    Unauthenticated,
    /// The live session has lapsed.
    SessionExpired,
    /// Email/password pair was rejected.
    InvalidCredentials,
    /// Third-party identity token was rejected.
    FederatedIdentityRejected,
    /// Federated identity is bound to another role.
    RoleConflict,
    /// Authenticated but not permitted.
    Forbidden,
    /// One or more input fields are invalid.
    ValidationFailed,
    /// Requested job status change is not in the state machine.
    InvalidTransition,
    /// Operation is not valid for the record's current state.
    InvalidState,
    /// Payment release was already applied.
    AlreadyPaid,
    /// Monetary amount is negative.
    InvalidAmount,
    /// Record does not exist or is not visible.
    NotFound,
    /// Gateway is unreachable or timed out.
    NetworkError,
    /// Unexpected failure inside the core or an adapter.
    InternalError,
}

/// Domain error.
///
/// # Examples
/// ```
/// use kaakazini_core::domain::{Error, ErrorCode};
///
/// let err = Error::invalid_state("job is not completed");
/// assert_eq!(err.code(), ErrorCode::InvalidState);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No authenticated session is live.
    #[error("authentication required")]
    Unauthenticated,
    /// The session expired and must be re-established.
    #[error("session expired")]
    SessionExpired,
    /// Wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Provider token invalid or expired.
    #[error("federated identity rejected: {message}")]
    FederatedIdentityRejected { message: String },
    /// Federated identity already bound to a role other than `requested`.
    #[error("federated identity is bound to a role other than {requested}")]
    RoleConflict { requested: Role },
    /// Role or ownership mismatch.
    #[error("forbidden: {0}")]
    Forbidden(DenyReason),
    /// Collected field violations.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    /// Job status change outside `Pending -> {Completed, Cancelled}`.
    #[error("cannot move job from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    /// Operation not valid in the current state.
    #[error("invalid state: {message}")]
    InvalidState { message: String },
    /// Payment already released.
    #[error("payment {0} has already been paid")]
    AlreadyPaid(PaymentId),
    /// Amount below zero.
    #[error("amount must not be negative (got {0})")]
    InvalidAmount(i64),
    /// Record missing or hidden from the caller.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// Gateway unreachable or timed out.
    #[error("gateway unreachable: {message}")]
    Network { message: String },
    /// Unexpected failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::FederatedIdentityRejected { .. } => ErrorCode::FederatedIdentityRejected,
            Self::RoleConflict { .. } => ErrorCode::RoleConflict,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::AlreadyPaid(_) => ErrorCode::AlreadyPaid,
            Self::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Network { .. } => ErrorCode::NetworkError,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Whether the error means the session is no longer usable.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }

    /// Whether a user-initiated retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Convenience constructor for [`Error::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Structured payload for presentation adapters.
    pub fn to_payload(&self) -> ErrorPayload {
        let details = match self {
            Self::Forbidden(reason) => Some(serde_json::json!({ "reason": reason })),
            Self::Validation(errors) => serde_json::to_value(errors).ok(),
            Self::InvalidTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            Self::AlreadyPaid(payment_id) => Some(serde_json::json!({ "paymentId": payment_id })),
            _ => None,
        };
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
            details,
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

/// Serialisable error envelope handed to presentation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Stable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Supplementary details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests;
