//! Domain primitives, the access policy and the core services.
//!
//! Purpose: model identities, sessions, job requests and payments as strongly
//! typed values, and expose the three services that act on them through the
//! driven ports in [`ports`].
//!
//! Public surface:
//! - [`SessionStore`]: sign-in, sign-up, restore, refresh and sign-out.
//! - [`authorize`]: the pure access policy over [`Session`] and [`Action`].
//! - [`JobRegistry`]: job submission, listing and the job state machine.
//! - [`SettlementEngine`]: payment figures, visibility, release and cancel.
//! - [`Error`] / [`ErrorCode`]: the single domain error and its stable code.

mod access_policy;
mod auth;
mod error;
mod identity;
mod in_flight;
mod job_registry;
mod jobs;
mod payments;
pub mod ports;
mod session;
mod session_store;
mod settlement_engine;
mod validation;

pub use self::access_policy::{Action, Decision, DenyReason, authorize, check_session};
pub use self::auth::{
    AuthenticationRequest, FederatedToken, LoginCredentials, PASSWORD_MIN_LEN, Registration,
    RegistrationForm, SessionAssertion,
};
pub use self::error::{Error, ErrorCode, ErrorPayload};
pub use self::identity::{
    ContactPhone, DISPLAY_NAME_MAX, DisplayName, Email, Identity, IdentityValidationError, Role,
    UserId,
};
pub use self::job_registry::JobRegistry;
pub use self::jobs::{
    ADDRESS_MAX, CUSTOM_SERVICE_MAX, JobDetails, JobDraft, JobId, JobRecord, JobRecordError,
    JobRequest, JobState, JobStatus, LOCATION_MAX, OTHER_SERVICE, REVIEW_MAX, SERVICE_MAX,
};
pub use self::payments::{
    Amount, COMPANY_CUT_BASIS_POINTS, Payment, PaymentFigures, PaymentId, PaymentJobRef,
    PaymentRecord, PaymentStatus, PayoutInstruction, compute_figures,
};
pub use self::session::{Actor, Session};
pub use self::session_store::SessionStore;
pub use self::settlement_engine::SettlementEngine;
pub use self::validation::{FieldViolation, ValidationErrors, ViolationKind};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use kaakazini_core::domain::{CoreResult, Error};
///
/// fn lookup() -> CoreResult<()> {
///     Err(Error::Unauthenticated)
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type CoreResult<T> = Result<T, Error>;
