//! Job requests and their status state machine.
//!
//! A job starts `Pending` and may move once to `Completed` or `Cancelled`;
//! both are terminal. A review exists only on a completed job, which the
//! [`JobState`] sum type makes unrepresentable otherwise.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::Error;
use super::identity::{IdentityValidationError, UserId};
use super::payments::Amount;
use super::validation::{ValidationErrors, ViolationKind};

mod draft;

pub use draft::{
    ADDRESS_MAX, CUSTOM_SERVICE_MAX, JobDetails, JobDraft, LOCATION_MAX, OTHER_SERVICE,
    SERVICE_MAX,
};

/// Maximum review length in characters.
pub const REVIEW_MAX: usize = 2_000;

/// Stable job request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Parse a job id from its textual UUID form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let raw = id.as_ref();
        if raw.trim().is_empty() {
            return Err(IdentityValidationError::EmptyId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| IdentityValidationError::InvalidId)
    }

    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Job request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Awaiting completion.
    Pending,
    /// Work done. Terminal.
    Completed,
    /// Withdrawn. Terminal.
    Cancelled,
}

impl JobStatus {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether no transition leaves this status.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether `self -> target` is an edge of the state machine.
    ///
    /// # Examples
    /// ```
    /// use kaakazini_core::domain::JobStatus;
    ///
    /// assert!(JobStatus::Pending.can_transition_to(JobStatus::Completed));
    /// assert!(!JobStatus::Completed.can_transition_to(JobStatus::Pending));
    /// ```
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state, carrying data only valid in that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Awaiting completion.
    Pending,
    /// Completed, optionally reviewed by the client.
    Completed {
        /// Client review text.
        review: Option<String>,
    },
    /// Withdrawn.
    Cancelled,
}

impl JobState {
    /// Status tag of this state.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// A scheduled service engagement between a client and a craftsman.
///
/// ## Invariants
/// - `client_id` never changes after creation.
/// - A review is present only while `Completed`.
/// - `amount`, when set, is non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "JobRecord", try_from = "JobRecord")]
pub struct JobRequest {
    id: JobId,
    client_id: UserId,
    craftsman_id: Option<UserId>,
    service: String,
    custom_service: Option<String>,
    scheduled_at: DateTime<Utc>,
    address: String,
    location: String,
    description: String,
    urgent: bool,
    amount: Option<Amount>,
    state: JobState,
    created_at: DateTime<Utc>,
}

impl JobRequest {
    /// Materialise a freshly submitted draft as a `Pending` job.
    pub fn create(id: JobId, draft: JobDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id: draft.client_id,
            craftsman_id: None,
            service: draft.service,
            custom_service: draft.custom_service,
            scheduled_at: draft.scheduled_at,
            address: draft.address,
            location: draft.location,
            description: draft.description,
            urgent: draft.urgent,
            amount: None,
            state: JobState::Pending,
            created_at,
        }
    }

    /// Server-assigned identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Owning client.
    pub fn client_id(&self) -> UserId {
        self.client_id
    }

    /// Serving craftsman, once assigned.
    pub fn craftsman_id(&self) -> Option<UserId> {
        self.craftsman_id
    }

    /// Service name as submitted.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Free-text label used when the service is `other`.
    pub fn custom_service(&self) -> Option<&str> {
        self.custom_service.as_deref()
    }

    /// Label shown for the requested service; `other` jobs use their custom
    /// description.
    pub fn service_label(&self) -> &str {
        match self.custom_service.as_deref() {
            Some(custom) if self.service.eq_ignore_ascii_case(OTHER_SERVICE) => custom,
            _ => &self.service,
        }
    }

    /// When the work is booked for.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Street address of the job.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Town or area of the job.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Client's description of the work.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the client flagged the job as urgent.
    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    /// Quoted amount, if any.
    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    /// Lifecycle state with its terminal payload.
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Client review of a completed job.
    pub fn review(&self) -> Option<&str> {
        match &self.state {
            JobState::Completed { review } => review.as_deref(),
            JobState::Pending | JobState::Cancelled => None,
        }
    }

    /// Submission time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Amount a payment must be created for: completed jobs with a quote.
    pub fn payable_amount(&self) -> Option<Amount> {
        match self.state {
            JobState::Completed { .. } => self.amount,
            JobState::Pending | JobState::Cancelled => None,
        }
    }

    /// Apply a status change.
    pub fn transition(&mut self, target: JobStatus) -> Result<(), Error> {
        let from = self.status();
        if !from.can_transition_to(target) {
            return Err(Error::InvalidTransition { from, to: target });
        }
        self.state = match target {
            JobStatus::Completed => JobState::Completed { review: None },
            JobStatus::Cancelled => JobState::Cancelled,
            JobStatus::Pending => JobState::Pending,
        };
        Ok(())
    }

    /// Record the client's review. Completed jobs only.
    pub fn attach_review(&mut self, text: &str) -> Result<(), Error> {
        let status = self.status();
        let JobState::Completed { review } = &mut self.state else {
            return Err(Error::invalid_state(format!(
                "cannot review a {status} job"
            )));
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationErrors::single("review", ViolationKind::Missing).into());
        }
        if text.chars().count() > REVIEW_MAX {
            return Err(
                ValidationErrors::single("review", ViolationKind::TooLong { max: REVIEW_MAX })
                    .into(),
            );
        }
        *review = Some(text.to_owned());
        Ok(())
    }

    /// Set the serving craftsman. Pending jobs only.
    pub fn assign(&mut self, craftsman_id: UserId) -> Result<(), Error> {
        self.ensure_pending("assign")?;
        self.craftsman_id = Some(craftsman_id);
        Ok(())
    }

    /// Set the payable amount. Pending jobs only.
    pub fn quote(&mut self, amount: Amount) -> Result<(), Error> {
        self.ensure_pending("quote")?;
        self.amount = Some(amount);
        Ok(())
    }

    fn ensure_pending(&self, operation: &str) -> Result<(), Error> {
        match self.state {
            JobState::Pending => Ok(()),
            JobState::Completed { .. } | JobState::Cancelled => Err(Error::invalid_state(
                format!("cannot {operation} a {} job", self.status()),
            )),
        }
    }
}

/// Flat, serialisable representation of a [`JobRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub client_id: UserId,
    #[serde(default)]
    pub craftsman_id: Option<UserId>,
    pub service: String,
    #[serde(default)]
    pub custom_service: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub address: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub amount: Option<i64>,
    pub status: JobStatus,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reasons a [`JobRecord`] cannot become a [`JobRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobRecordError {
    #[error("review present on a {status} job")]
    ReviewOnUncompletedJob { status: JobStatus },
    #[error("amount must not be negative (got {0})")]
    NegativeAmount(i64),
}

impl TryFrom<JobRecord> for JobRequest {
    type Error = JobRecordError;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let state = match (record.status, record.review) {
            (JobStatus::Completed, review) => JobState::Completed { review },
            (status, Some(_)) => return Err(JobRecordError::ReviewOnUncompletedJob { status }),
            (JobStatus::Pending, None) => JobState::Pending,
            (JobStatus::Cancelled, None) => JobState::Cancelled,
        };
        let amount = record
            .amount
            .map(|value| Amount::new(value).map_err(|_| JobRecordError::NegativeAmount(value)))
            .transpose()?;

        Ok(Self {
            id: record.id,
            client_id: record.client_id,
            craftsman_id: record.craftsman_id,
            service: record.service,
            custom_service: record.custom_service,
            scheduled_at: record.scheduled_at,
            address: record.address,
            location: record.location,
            description: record.description,
            urgent: record.urgent,
            amount,
            state,
            created_at: record.created_at,
        })
    }
}

impl From<JobRequest> for JobRecord {
    fn from(job: JobRequest) -> Self {
        let status = job.status();
        let review = match job.state {
            JobState::Completed { review } => review,
            JobState::Pending | JobState::Cancelled => None,
        };
        Self {
            id: job.id,
            client_id: job.client_id,
            craftsman_id: job.craftsman_id,
            service: job.service,
            custom_service: job.custom_service,
            scheduled_at: job.scheduled_at,
            address: job.address,
            location: job.location,
            description: job.description,
            urgent: job.urgent,
            amount: job.amount.map(Amount::value),
            status,
            review,
            created_at: job.created_at,
        }
    }
}
