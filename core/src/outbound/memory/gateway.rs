//! Authoritative in-process gateway.
//!
//! Holds accounts, sessions, jobs and payments behind one mutex so every
//! operation is a single atomic step. Scope checks reuse the domain access
//! policy, and payment release is a compare-and-swap on `Pending`, so the
//! adapter upholds the same guarantees a remote back end must provide.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{Gateway, GatewayError, JobScope, PaymentScope};
use crate::domain::{
    Action, Amount, AuthenticationRequest, ContactPhone, Decision, DenyReason, DisplayName,
    Email, Error, Identity, JobDraft, JobId, JobRequest, JobStatus, LoginCredentials, Payment,
    PaymentId, PaymentJobRef, PaymentStatus, Registration, Role, Session, SessionAssertion,
    UserId, authorize,
};

/// Default lifetime of issued session assertions.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

struct Account {
    identity: Identity,
    password_digest: Option<String>,
}

struct IssuedSession {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
struct FederatedProfile {
    display_name: DisplayName,
    email: Email,
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<UserId, Account>,
    by_email: HashMap<Email, UserId>,
    providers: HashMap<String, FederatedProfile>,
    sessions: HashMap<String, IssuedSession>,
    jobs: BTreeMap<JobId, JobRequest>,
    payments: BTreeMap<PaymentId, Payment>,
    payment_by_job: HashMap<JobId, PaymentId>,
    disbursements: HashMap<PaymentId, usize>,
}

fn password_digest(user_id: UserId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_uuid().as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn map_domain_error(error: Error) -> GatewayError {
    match error {
        Error::Forbidden(reason) => GatewayError::forbidden(reason.to_string()),
        Error::AlreadyPaid(id) => GatewayError::conflict(format!("payment {id} is already paid")),
        Error::NotFound { entity, id } => GatewayError::not_found(format!("{entity} {id}")),
        other => GatewayError::rejected(other.to_string()),
    }
}

fn map_denial(reason: DenyReason) -> GatewayError {
    match reason {
        DenyReason::Unauthenticated | DenyReason::Expired => {
            GatewayError::unauthorized(reason.to_string())
        }
        DenyReason::NotOwner | DenyReason::InsufficientRole => {
            GatewayError::forbidden(reason.to_string())
        }
    }
}

/// Caller resolved from a bearer assertion, as the back end sees it.
struct Caller {
    session: Session,
}

impl Caller {
    fn identity(&self) -> Result<&Identity, GatewayError> {
        self.session
            .identity()
            .ok_or_else(|| GatewayError::unauthorized("no identity"))
    }

    fn permit(&self, action: &Action<'_>, now: DateTime<Utc>) -> Result<(), GatewayError> {
        match authorize(&self.session, action, now) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(map_denial(reason)),
        }
    }
}

/// In-process [`Gateway`] holding authoritative state.
///
/// Suitable for offline operation, demos and behaviour tests. Accounts are
/// seeded with [`InMemoryGateway::seed_account`]; federated providers are
/// simulated with [`InMemoryGateway::register_provider_token`].
pub struct InMemoryGateway {
    clock: Arc<dyn Clock>,
    session_ttl: TimeDelta,
    ledger: Mutex<Ledger>,
}

impl InMemoryGateway {
    /// Empty gateway issuing assertions valid for the default lifetime.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_session_ttl(clock, TimeDelta::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }

    /// Empty gateway issuing assertions valid for `session_ttl`.
    pub fn with_session_ttl(clock: Arc<dyn Clock>, session_ttl: TimeDelta) -> Self {
        Self {
            clock,
            session_ttl,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Create an account of any role, including admins.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] when the email is already taken.
    pub fn seed_account(
        &self,
        role: Role,
        display_name: DisplayName,
        email: Email,
        password: &str,
    ) -> Result<Identity, GatewayError> {
        let mut ledger = self.lock()?;
        Self::insert_account(&mut ledger, role, display_name, email, None, Some(password))
    }

    /// Make `token` a valid third-party token for the given profile.
    pub fn register_provider_token(
        &self,
        token: &str,
        display_name: DisplayName,
        email: Email,
    ) -> Result<(), GatewayError> {
        let mut ledger = self.lock()?;
        ledger.providers.insert(
            token.to_owned(),
            FederatedProfile {
                display_name,
                email,
            },
        );
        Ok(())
    }

    /// How many times `payment_id` has been disbursed.
    pub fn disbursements(&self, payment_id: PaymentId) -> Result<usize, GatewayError> {
        let ledger = self.lock()?;
        Ok(ledger
            .disbursements
            .get(&payment_id)
            .copied()
            .unwrap_or_default())
    }

    /// Revoke every session of `user_id`, as an administrator would.
    pub fn revoke_all_sessions(&self, user_id: UserId) -> Result<usize, GatewayError> {
        let mut ledger = self.lock()?;
        let before = ledger.sessions.len();
        ledger.sessions.retain(|_, session| session.user_id != user_id);
        Ok(before - ledger.sessions.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, GatewayError> {
        self.ledger
            .lock()
            .map_err(|_| GatewayError::unavailable("ledger lock poisoned"))
    }

    fn insert_account(
        ledger: &mut Ledger,
        role: Role,
        display_name: DisplayName,
        email: Email,
        phone: Option<ContactPhone>,
        password: Option<&str>,
    ) -> Result<Identity, GatewayError> {
        if ledger.by_email.contains_key(&email) {
            return Err(GatewayError::conflict(format!(
                "an account for {email} already exists"
            )));
        }
        let user_id = UserId::random();
        let identity = Identity::new(user_id, role, display_name, email.clone(), phone);
        ledger.by_email.insert(email, user_id);
        ledger.accounts.insert(
            user_id,
            Account {
                identity: identity.clone(),
                password_digest: password.map(|password| password_digest(user_id, password)),
            },
        );
        Ok(identity)
    }

    fn issue(&self, ledger: &mut Ledger, user_id: UserId) -> SessionAssertion {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = self.clock.utc() + self.session_ttl;
        ledger.sessions.insert(
            token.clone(),
            IssuedSession {
                user_id,
                expires_at,
            },
        );
        SessionAssertion::new(token, Some(expires_at))
    }

    fn verify_password(
        ledger: &Ledger,
        credentials: &LoginCredentials,
    ) -> Result<UserId, GatewayError> {
        let account = ledger
            .by_email
            .get(credentials.email())
            .and_then(|user_id| ledger.accounts.get(user_id));
        let Some(account) = account else {
            return Err(GatewayError::unauthorized("invalid email or password"));
        };
        let user_id = account.identity.id();
        let expected = password_digest(user_id, credentials.password());
        if account.password_digest.as_deref() != Some(expected.as_str()) {
            return Err(GatewayError::unauthorized("invalid email or password"));
        }
        Ok(user_id)
    }

    fn bind_federated(
        ledger: &mut Ledger,
        token: &str,
        requested_role: Role,
    ) -> Result<UserId, GatewayError> {
        let Some(profile) = ledger.providers.get(token).cloned() else {
            return Err(GatewayError::unauthorized("provider token is invalid or expired"));
        };
        if let Some(user_id) = ledger.by_email.get(&profile.email).copied() {
            let bound_role = ledger
                .accounts
                .get(&user_id)
                .map(|account| account.identity.role());
            if bound_role != Some(requested_role) {
                return Err(GatewayError::conflict(format!(
                    "{} is registered under a different role",
                    profile.email
                )));
            }
            return Ok(user_id);
        }
        if requested_role == Role::Admin {
            return Err(GatewayError::forbidden("admin accounts cannot be federated"));
        }
        let identity = Self::insert_account(
            ledger,
            requested_role,
            profile.display_name,
            profile.email,
            None,
            None,
        )?;
        Ok(identity.id())
    }

    fn caller(
        &self,
        ledger: &mut Ledger,
        assertion: &SessionAssertion,
    ) -> Result<Caller, GatewayError> {
        let now = self.clock.utc();
        let (user_id, expires_at) = match ledger.sessions.get(assertion.bearer()) {
            Some(issued) => (issued.user_id, issued.expires_at),
            None => return Err(GatewayError::unauthorized("unknown session")),
        };
        if expires_at <= now {
            ledger.sessions.remove(assertion.bearer());
            return Err(GatewayError::unauthorized("session expired"));
        }
        let identity = ledger
            .accounts
            .get(&user_id)
            .map(|account| account.identity.clone())
            .ok_or_else(|| GatewayError::unauthorized("account no longer exists"))?;
        Ok(Caller {
            session: Session::authenticated(identity, Some(expires_at)),
        })
    }

    fn job_mut<'a>(
        ledger: &'a mut Ledger,
        job_id: JobId,
    ) -> Result<&'a mut JobRequest, GatewayError> {
        ledger
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GatewayError::not_found(format!("job {job_id}")))
    }

    fn payment_mut<'a>(
        ledger: &'a mut Ledger,
        payment_id: PaymentId,
    ) -> Result<&'a mut Payment, GatewayError> {
        ledger
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| GatewayError::not_found(format!("payment {payment_id}")))
    }

    /// Create the job's payment when it completes with an amount. Runs under
    /// the same lock as the status change, so it happens exactly once.
    fn settle_completion(&self, ledger: &mut Ledger, job: &JobRequest) {
        let Some(amount) = job.payable_amount() else {
            return;
        };
        if ledger.payment_by_job.contains_key(&job.id()) {
            return;
        }
        let payment = Payment::create(
            PaymentId::random(),
            PaymentJobRef {
                job_id: job.id(),
                client_id: job.client_id(),
                craftsman_id: job.craftsman_id(),
            },
            amount,
            self.clock.utc(),
        );
        debug!(job_id = %job.id(), payment_id = %payment.id(), "payment created");
        ledger.payment_by_job.insert(job.id(), payment.id());
        ledger.payments.insert(payment.id(), payment);
    }

    fn update_job<A, F>(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        action: A,
        change: F,
    ) -> Result<JobRequest, GatewayError>
    where
        A: for<'j> Fn(&'j JobRequest) -> Action<'j>,
        F: FnOnce(&Caller, &mut JobRequest) -> Result<(), GatewayError>,
    {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let job = Self::job_mut(&mut ledger, job_id)?;
        caller.permit(&action(&*job), now)?;
        change(&caller, job)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<SessionAssertion, GatewayError> {
        let mut ledger = self.lock()?;
        let user_id = match request {
            AuthenticationRequest::Password(credentials) => {
                Self::verify_password(&ledger, credentials)?
            }
            AuthenticationRequest::Federated {
                token,
                requested_role,
            } => Self::bind_federated(&mut ledger, token.as_str(), *requested_role)?,
        };
        Ok(self.issue(&mut ledger, user_id))
    }

    async fn register(&self, registration: &Registration) -> Result<(), GatewayError> {
        if registration.role() == Role::Admin {
            return Err(GatewayError::forbidden("admin accounts cannot self-register"));
        }
        let mut ledger = self.lock()?;
        Self::insert_account(
            &mut ledger,
            registration.role(),
            registration.display_name().clone(),
            registration.credentials().email().clone(),
            registration.phone().cloned(),
            Some(registration.credentials().password()),
        )?;
        Ok(())
    }

    async fn fetch_identity(
        &self,
        assertion: &SessionAssertion,
    ) -> Result<Identity, GatewayError> {
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        caller.identity().cloned()
    }

    async fn revoke_session(&self, assertion: &SessionAssertion) -> Result<(), GatewayError> {
        let mut ledger = self.lock()?;
        ledger.sessions.remove(assertion.bearer());
        Ok(())
    }

    async fn create_job(
        &self,
        assertion: &SessionAssertion,
        draft: &JobDraft,
    ) -> Result<JobRequest, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        caller.permit(&Action::SubmitJob, now)?;
        if draft.client_id != caller.identity()?.id() {
            return Err(GatewayError::forbidden("jobs are owned by the submitting client"));
        }
        let job = JobRequest::create(JobId::random(), draft.clone(), now);
        ledger.jobs.insert(job.id(), job.clone());
        Ok(job)
    }

    async fn list_jobs(
        &self,
        assertion: &SessionAssertion,
        scope: JobScope,
    ) -> Result<Vec<JobRequest>, GatewayError> {
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let allowed = JobScope::for_identity(caller.identity()?);
        if allowed != JobScope::All && scope != allowed {
            return Err(GatewayError::forbidden("scope exceeds the caller's jobs"));
        }
        Ok(ledger
            .jobs
            .values()
            .filter(|job| scope.includes(job))
            .cloned()
            .collect())
    }

    async fn find_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<JobRequest, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let job = Self::job_mut(&mut ledger, job_id)?;
        caller.permit(&Action::ViewJob(job), now)?;
        Ok(job.clone())
    }

    async fn update_job_status(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        target: JobStatus,
    ) -> Result<JobRequest, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let job = Self::job_mut(&mut ledger, job_id)?;
        caller.permit(&Action::MutateJob(job), now)?;
        job.transition(target).map_err(map_domain_error)?;
        let job = job.clone();
        if target == JobStatus::Completed {
            self.settle_completion(&mut ledger, &job);
        }
        Ok(job)
    }

    async fn attach_review(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        text: &str,
    ) -> Result<JobRequest, GatewayError> {
        self.update_job(assertion, job_id, |job| Action::MutateJob(job), |caller, job| {
            let identity = caller.identity()?;
            if identity.role() != Role::Client || identity.id() != job.client_id() {
                return Err(GatewayError::forbidden("only the owning client reviews"));
            }
            job.attach_review(text).map_err(map_domain_error)
        })
    }

    async fn assign_craftsman(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        craftsman_id: UserId,
    ) -> Result<JobRequest, GatewayError> {
        let is_craftsman = {
            let ledger = self.lock()?;
            ledger
                .accounts
                .get(&craftsman_id)
                .map(|account| account.identity.role() == Role::Craftsman)
        };
        match is_craftsman {
            None => return Err(GatewayError::not_found(format!("craftsman {craftsman_id}"))),
            Some(false) => {
                return Err(GatewayError::rejected(format!(
                    "{craftsman_id} is not a craftsman"
                )));
            }
            Some(true) => {}
        }
        self.update_job(assertion, job_id, |job| Action::AssignJob(job), |_, job| {
            job.assign(craftsman_id).map_err(map_domain_error)
        })
    }

    async fn quote_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        amount: Amount,
    ) -> Result<JobRequest, GatewayError> {
        self.update_job(assertion, job_id, |job| Action::QuoteJob(job), |_, job| {
            job.quote(amount).map_err(map_domain_error)
        })
    }

    async fn list_payments(
        &self,
        assertion: &SessionAssertion,
        scope: PaymentScope,
    ) -> Result<Vec<Payment>, GatewayError> {
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let Some(allowed) = PaymentScope::for_identity(caller.identity()?) else {
            return Err(GatewayError::forbidden("role has no payment access"));
        };
        if allowed != PaymentScope::All && scope != allowed {
            return Err(GatewayError::forbidden("scope exceeds the caller's payments"));
        }
        Ok(ledger
            .payments
            .values()
            .filter(|payment| scope.includes(payment))
            .cloned()
            .collect())
    }

    async fn find_payment_for_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<Option<Payment>, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let job = Self::job_mut(&mut ledger, job_id)?;
        caller.permit(&Action::ViewJob(job), now)?;

        let payment = ledger
            .payment_by_job
            .get(&job_id)
            .and_then(|payment_id| ledger.payments.get(payment_id));
        match payment {
            Some(payment) => {
                caller.permit(&Action::ViewPayment(payment), now)?;
                Ok(Some(payment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let payment = Self::payment_mut(&mut ledger, payment_id)?;
        caller.permit(&Action::ViewPayment(payment), now)?;
        Ok(payment.clone())
    }

    async fn release_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let payment = Self::payment_mut(&mut ledger, payment_id)?;
        caller.permit(&Action::ReleasePayment(payment), now)?;
        if payment.status() != PaymentStatus::Pending {
            return Err(match payment.status() {
                PaymentStatus::Paid => {
                    GatewayError::conflict(format!("payment {payment_id} is already paid"))
                }
                status => GatewayError::rejected(format!("payment {payment_id} is {status}")),
            });
        }
        payment.release().map_err(map_domain_error)?;
        let released = payment.clone();
        *ledger.disbursements.entry(payment_id).or_default() += 1;
        debug!(%payment_id, "payment disbursed");
        Ok(released)
    }

    async fn cancel_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        let now = self.clock.utc();
        let mut ledger = self.lock()?;
        let caller = self.caller(&mut ledger, assertion)?;
        let payment = Self::payment_mut(&mut ledger, payment_id)?;
        caller.permit(&Action::CancelPayment(payment), now)?;
        payment.cancel().map_err(map_domain_error)?;
        Ok(payment.clone())
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
