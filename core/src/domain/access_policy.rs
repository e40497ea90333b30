//! Access policy: the pure decision of whether a session may perform an
//! action on a resource.
//!
//! Rules are evaluated in order:
//!
//! 1. no authenticated identity denies with [`DenyReason::Unauthenticated`];
//! 2. a lapsed session denies with [`DenyReason::Expired`];
//! 3. job views and mutations are allowed for admins, the owning client and
//!    the assigned craftsman, otherwise [`DenyReason::NotOwner`];
//! 4. payment views are allowed for admins and the client owning the parent
//!    job, otherwise [`DenyReason::NotOwner`];
//! 5. releasing or cancelling a payment, assigning and quoting a job are
//!    admin-only, otherwise [`DenyReason::InsufficientRole`];
//! 6. submitting a job is client-only, otherwise
//!    [`DenyReason::InsufficientRole`].
//!
//! Nothing here performs I/O; callers pass the clock reading explicitly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Error;
use super::identity::{Identity, Role};
use super::jobs::JobRequest;
use super::payments::Payment;
use super::session::Session;

/// Operation being authorised, carrying the resource it targets.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    /// Read a job request.
    ViewJob(&'a JobRequest),
    /// Change a job's status or review.
    MutateJob(&'a JobRequest),
    /// Create a new job request.
    SubmitJob,
    /// Set the serving craftsman of a job.
    AssignJob(&'a JobRequest),
    /// Set the payable amount of a job.
    QuoteJob(&'a JobRequest),
    /// Read a payment.
    ViewPayment(&'a Payment),
    /// Move a payment to `Paid`.
    ReleasePayment(&'a Payment),
    /// Move a payment to `Cancelled`.
    CancelPayment(&'a Payment),
}

impl Action<'_> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ViewJob(_) => "view_job",
            Self::MutateJob(_) => "mutate_job",
            Self::SubmitJob => "submit_job",
            Self::AssignJob(_) => "assign_job",
            Self::QuoteJob(_) => "quote_job",
            Self::ViewPayment(_) => "view_payment",
            Self::ReleasePayment(_) => "release_payment",
            Self::CancelPayment(_) => "cancel_payment",
        }
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No authenticated identity.
    Unauthenticated,
    /// Session expiry has passed.
    Expired,
    /// Identity neither owns nor serves the resource.
    NotOwner,
    /// Identity's role may not perform the action.
    InsufficientRole,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "not signed in",
            Self::Expired => "session expired",
            Self::NotOwner => "not your record",
            Self::InsufficientRole => "role not permitted",
        })
    }
}

impl From<DenyReason> for Error {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => Self::Unauthenticated,
            DenyReason::Expired => Self::SessionExpired,
            DenyReason::NotOwner | DenyReason::InsufficientRole => Self::Forbidden(reason),
        }
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the decision allows the action.
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into a domain result.
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason.into()),
        }
    }
}

fn require(condition: bool, otherwise: DenyReason) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(otherwise)
    }
}

/// Apply the session rules alone, returning the live identity.
pub fn check_session(session: &Session, now: DateTime<Utc>) -> Result<&Identity, DenyReason> {
    let identity = session.identity().ok_or(DenyReason::Unauthenticated)?;
    if session.is_expired(now) {
        return Err(DenyReason::Expired);
    }
    Ok(identity)
}

fn may_touch_job(identity: &Identity, job: &JobRequest) -> bool {
    match identity.role() {
        Role::Admin => true,
        Role::Client => job.client_id() == identity.id(),
        Role::Craftsman => job.craftsman_id() == Some(identity.id()),
    }
}

/// Decide whether `session` may perform `action` at `now`.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use kaakazini_core::domain::{Action, Decision, DenyReason, Session, authorize};
///
/// let decision = authorize(&Session::Unauthenticated, &Action::SubmitJob, Utc::now());
/// assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
/// ```
pub fn authorize(session: &Session, action: &Action<'_>, now: DateTime<Utc>) -> Decision {
    let identity = match check_session(session, now) {
        Ok(identity) => identity,
        Err(reason) => return Decision::Deny(reason),
    };
    let role = identity.role();

    match action {
        Action::ViewJob(job) | Action::MutateJob(job) => {
            require(may_touch_job(identity, job), DenyReason::NotOwner)
        }
        Action::ViewPayment(payment) => require(
            role == Role::Admin
                || (role == Role::Client && payment.job().client_id == identity.id()),
            DenyReason::NotOwner,
        ),
        Action::ReleasePayment(_)
        | Action::CancelPayment(_)
        | Action::AssignJob(_)
        | Action::QuoteJob(_) => require(role == Role::Admin, DenyReason::InsufficientRole),
        Action::SubmitJob => require(role == Role::Client, DenyReason::InsufficientRole),
    }
}

#[cfg(test)]
#[path = "access_policy_tests.rs"]
mod tests;
