//! Port for the external service that owns durable job and payment state.
//!
//! The gateway is authoritative: it re-checks scope and performs the
//! conditional `Pending -> Paid` update, so the core may race against other
//! sessions and must only interpret the outcomes.

use async_trait::async_trait;

use crate::domain::{
    Amount, AuthenticationRequest, Identity, JobDraft, JobId, JobRequest, JobStatus, Payment,
    PaymentId, Registration, Role, SessionAssertion, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors reported by gateway adapters, grouped by response class.
    pub enum GatewayError {
        /// Session assertion missing, invalid or expired (401).
        Unauthorized { message: String } => "gateway rejected the session: {message}",
        /// Request was malformed or violates a server-side rule (400).
        Rejected { message: String } => "gateway rejected the request: {message}",
        /// Caller lacks permission for the resource (403).
        Forbidden { message: String } => "gateway refused access: {message}",
        /// Resource does not exist (404).
        NotFound { message: String } => "gateway resource not found: {message}",
        /// Conditional update lost, or binding conflict (409).
        Conflict { message: String } => "gateway reported a conflict: {message}",
        /// Gateway could not be reached or failed internally.
        Unavailable { message: String } => "gateway unavailable: {message}",
        /// No response within the transport deadline.
        Timeout { message: String } => "gateway timed out: {message}",
        /// Response body did not match the expected shape.
        Decode { message: String } => "gateway response malformed: {message}",
    }
}

impl GatewayError {
    /// Whether the assertion used for the call is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Role-derived job visibility requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    /// Every job (admin).
    All,
    /// Jobs submitted by this client.
    OwnedBy(UserId),
    /// Jobs assigned to this craftsman.
    AssignedTo(UserId),
}

impl JobScope {
    /// Scope matching access rule 3 for `identity`.
    pub fn for_identity(identity: &Identity) -> Self {
        match identity.role() {
            Role::Admin => Self::All,
            Role::Client => Self::OwnedBy(identity.id()),
            Role::Craftsman => Self::AssignedTo(identity.id()),
        }
    }

    /// Whether `job` falls inside the scope.
    pub fn includes(&self, job: &JobRequest) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(client) => job.client_id() == *client,
            Self::AssignedTo(craftsman) => job.craftsman_id() == Some(*craftsman),
        }
    }
}

/// Role-derived payment visibility requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentScope {
    /// Every payment (admin).
    All,
    /// Payments whose parent job belongs to this client.
    OwnedBy(UserId),
}

impl PaymentScope {
    /// Scope matching access rule 4, or `None` when the role sees no payments.
    pub fn for_identity(identity: &Identity) -> Option<Self> {
        match identity.role() {
            Role::Admin => Some(Self::All),
            Role::Client => Some(Self::OwnedBy(identity.id())),
            Role::Craftsman => None,
        }
    }

    /// Whether `payment` falls inside the scope.
    pub fn includes(&self, payment: &Payment) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(client) => payment.job().client_id == *client,
        }
    }
}

/// Request/response contract with the authoritative back end.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Exchange credentials or a federated token for a session assertion.
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<SessionAssertion, GatewayError>;

    /// Create a client or craftsman account.
    async fn register(&self, registration: &Registration) -> Result<(), GatewayError>;

    /// Resolve the identity behind `assertion`.
    async fn fetch_identity(&self, assertion: &SessionAssertion)
    -> Result<Identity, GatewayError>;

    /// Invalidate `assertion` server-side.
    async fn revoke_session(&self, assertion: &SessionAssertion) -> Result<(), GatewayError>;

    async fn create_job(
        &self,
        assertion: &SessionAssertion,
        draft: &JobDraft,
    ) -> Result<JobRequest, GatewayError>;

    async fn list_jobs(
        &self,
        assertion: &SessionAssertion,
        scope: JobScope,
    ) -> Result<Vec<JobRequest>, GatewayError>;

    async fn find_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<JobRequest, GatewayError>;

    /// Apply a status change; completing a quoted job creates its payment.
    async fn update_job_status(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        target: JobStatus,
    ) -> Result<JobRequest, GatewayError>;

    async fn attach_review(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        text: &str,
    ) -> Result<JobRequest, GatewayError>;

    async fn assign_craftsman(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        craftsman_id: UserId,
    ) -> Result<JobRequest, GatewayError>;

    async fn quote_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        amount: Amount,
    ) -> Result<JobRequest, GatewayError>;

    async fn list_payments(
        &self,
        assertion: &SessionAssertion,
        scope: PaymentScope,
    ) -> Result<Vec<Payment>, GatewayError>;

    async fn find_payment_for_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<Option<Payment>, GatewayError>;

    async fn find_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError>;

    /// Conditionally move a payment from `Pending` to `Paid`.
    ///
    /// Adapters must report [`GatewayError::Conflict`] when the payment is
    /// already paid; they never disburse twice.
    async fn release_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError>;

    async fn cancel_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError>;
}
