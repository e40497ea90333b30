//! Job registry: submission, listing and status changes of job requests.
//!
//! Every operation authorises locally before calling the gateway, and the
//! gateway re-checks scope on its side. Status mutations run to completion
//! even if the caller stops waiting.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, instrument, warn};

use crate::domain::in_flight::run_to_completion;
use crate::domain::ports::{Gateway, GatewayError, JobScope};
use crate::domain::session_store::SessionStore;
use crate::domain::{
    Action, Actor, Amount, Decision, DenyReason, Error, JobDetails, JobId, JobRequest, JobStatus,
    Role, UserId, authorize, check_session,
};

fn map_gateway_error(error: GatewayError, job_id: Option<JobId>) -> Error {
    match error {
        GatewayError::Unauthorized { .. } => Error::Unauthenticated,
        GatewayError::Forbidden { .. } => Error::Forbidden(DenyReason::NotOwner),
        GatewayError::NotFound { message } => match job_id {
            Some(id) => Error::not_found("job", id),
            None => Error::not_found("job", message),
        },
        GatewayError::Rejected { message } | GatewayError::Conflict { message } => {
            Error::invalid_state(message)
        }
        GatewayError::Unavailable { message } | GatewayError::Timeout { message } => {
            Error::network(message)
        }
        GatewayError::Decode { message } => Error::internal(message),
    }
}

/// Job request service.
pub struct JobRegistry<G> {
    gateway: Arc<G>,
    sessions: Arc<SessionStore<G>>,
    clock: Arc<dyn Clock>,
}

impl<G> Clone for JobRegistry<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            sessions: Arc::clone(&self.sessions),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<G> JobRegistry<G>
where
    G: Gateway + 'static,
{
    /// Create a registry sharing `sessions` for invalidation on rejection.
    pub fn new(gateway: Arc<G>, sessions: Arc<SessionStore<G>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            sessions,
            clock,
        }
    }

    /// Submit a new `Pending` job owned by the acting client.
    ///
    /// Every invalid field is reported in one [`Error::Validation`].
    #[instrument(skip(self, actor, details), fields(user_id = ?actor.user_id()))]
    pub async fn submit(&self, actor: &Actor, details: JobDetails) -> Result<JobRequest, Error> {
        self.authorize(actor, &Action::SubmitJob).await?;
        let client_id = self.acting_user(actor)?;
        let draft = details.validate(client_id, self.clock.utc())?;

        let outcome = self.gateway.create_job(actor.assertion(), &draft).await;
        let job = self.settle(actor, outcome, None).await?;
        info!(job_id = %job.id(), "job submitted");
        Ok(job)
    }

    /// Jobs visible to the actor, newest first.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn list_for(&self, actor: &Actor) -> Result<Vec<JobRequest>, Error> {
        let now = self.clock.utc();
        let identity = match check_session(actor.session(), now) {
            Ok(identity) => identity,
            Err(reason) => return Err(self.deny(actor, reason).await),
        };

        let scope = JobScope::for_identity(identity);
        let outcome = self.gateway.list_jobs(actor.assertion(), scope).await;
        let mut jobs = self.settle(actor, outcome, None).await?;

        let returned = jobs.len();
        jobs.retain(|job| authorize(actor.session(), &Action::ViewJob(job), now).is_allowed());
        if jobs.len() != returned {
            warn!(
                dropped = returned - jobs.len(),
                "gateway returned jobs outside the caller's scope"
            );
        }
        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(jobs)
    }

    /// Fetch a single job visible to the actor.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn get(&self, job_id: JobId, actor: &Actor) -> Result<JobRequest, Error> {
        let job = self.find(job_id, actor).await?;
        self.authorize(actor, &Action::ViewJob(&job)).await?;
        Ok(job)
    }

    /// Move a `Pending` job to `Completed` or `Cancelled`.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn transition(
        &self,
        job_id: JobId,
        target: JobStatus,
        actor: &Actor,
    ) -> Result<JobRequest, Error> {
        let job = self.find(job_id, actor).await?;
        self.authorize(actor, &Action::MutateJob(&job)).await?;
        let from = job.status();
        if !from.can_transition_to(target) {
            return Err(Error::InvalidTransition { from, to: target });
        }

        let gateway = Arc::clone(&self.gateway);
        let assertion = actor.assertion().clone();
        let outcome = run_to_completion(async move {
            gateway.update_job_status(&assertion, job_id, target).await
        })
        .await?;
        let updated = match outcome {
            Err(GatewayError::Rejected { message }) => {
                return Err(self.lost_transition(actor, job_id, from, target, &message).await);
            }
            other => self.settle(actor, other, Some(job_id)).await?,
        };

        info!(%job_id, %from, to = %target, "job status changed");
        Ok(updated)
    }

    /// Attach the owning client's review to a completed job.
    #[instrument(skip(self, actor, text), fields(user_id = ?actor.user_id()))]
    pub async fn attach_review(
        &self,
        job_id: JobId,
        text: &str,
        actor: &Actor,
    ) -> Result<JobRequest, Error> {
        let job = self.find(job_id, actor).await?;
        self.authorize(actor, &Action::MutateJob(&job)).await?;
        let is_owner = actor.identity().is_some_and(|identity| {
            identity.role() == Role::Client && identity.id() == job.client_id()
        });
        if !is_owner {
            return Err(Error::Forbidden(DenyReason::NotOwner));
        }
        job.clone().attach_review(text)?;

        let outcome = self
            .gateway
            .attach_review(actor.assertion(), job_id, text.trim())
            .await;
        let updated = self.settle(actor, outcome, Some(job_id)).await?;
        info!(%job_id, "review attached");
        Ok(updated)
    }

    /// Assign the serving craftsman of a pending job. Admin only.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn assign(
        &self,
        job_id: JobId,
        craftsman_id: UserId,
        actor: &Actor,
    ) -> Result<JobRequest, Error> {
        let job = self.find(job_id, actor).await?;
        self.authorize(actor, &Action::AssignJob(&job)).await?;
        job.clone().assign(craftsman_id)?;

        let outcome = self
            .gateway
            .assign_craftsman(actor.assertion(), job_id, craftsman_id)
            .await;
        let updated = self.settle(actor, outcome, Some(job_id)).await?;
        info!(%job_id, %craftsman_id, "craftsman assigned");
        Ok(updated)
    }

    /// Set the payable amount of a pending job. Admin only.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn quote(
        &self,
        job_id: JobId,
        amount: i64,
        actor: &Actor,
    ) -> Result<JobRequest, Error> {
        let job = self.find(job_id, actor).await?;
        self.authorize(actor, &Action::QuoteJob(&job)).await?;
        let amount = Amount::new(amount)?;
        job.clone().quote(amount)?;

        let outcome = self.gateway.quote_job(actor.assertion(), job_id, amount).await;
        let updated = self.settle(actor, outcome, Some(job_id)).await?;
        info!(%job_id, amount = amount.value(), "job quoted");
        Ok(updated)
    }

    async fn find(&self, job_id: JobId, actor: &Actor) -> Result<JobRequest, Error> {
        if let Err(reason) = check_session(actor.session(), self.clock.utc()) {
            return Err(self.deny(actor, reason).await);
        }
        let outcome = self.gateway.find_job(actor.assertion(), job_id).await;
        self.settle(actor, outcome, Some(job_id)).await
    }

    async fn authorize(&self, actor: &Actor, action: &Action<'_>) -> Result<(), Error> {
        match authorize(actor.session(), action, self.clock.utc()) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(action = action.name(), %reason, "job action denied");
                Err(self.deny(actor, reason).await)
            }
        }
    }

    async fn deny(&self, actor: &Actor, reason: DenyReason) -> Error {
        if reason == DenyReason::Expired {
            self.sessions.invalidate_if_current(actor.assertion()).await;
        }
        reason.into()
    }

    /// The gateway refused a status change our copy allowed, usually because
    /// another session moved the job first. Report the status it now has.
    async fn lost_transition(
        &self,
        actor: &Actor,
        job_id: JobId,
        seen: JobStatus,
        target: JobStatus,
        message: &str,
    ) -> Error {
        let from = match self.gateway.find_job(actor.assertion(), job_id).await {
            Ok(current) => current.status(),
            Err(error) => {
                debug!(%job_id, %error, "could not re-read job after rejected transition");
                seen
            }
        };
        warn!(%job_id, %from, to = %target, %message, "status change rejected by gateway");
        Error::InvalidTransition { from, to: target }
    }

    async fn reject(&self, actor: &Actor, error: GatewayError, job_id: Option<JobId>) -> Error {
        if error.is_unauthorized() {
            self.sessions.invalidate_if_current(actor.assertion()).await;
        }
        map_gateway_error(error, job_id)
    }

    async fn settle<T>(
        &self,
        actor: &Actor,
        outcome: Result<T, GatewayError>,
        job_id: Option<JobId>,
    ) -> Result<T, Error> {
        match outcome {
            Ok(value) => Ok(value),
            Err(error) => Err(self.reject(actor, error, job_id).await),
        }
    }

    fn acting_user(&self, actor: &Actor) -> Result<UserId, Error> {
        actor.user_id().ok_or(Error::Unauthenticated)
    }
}

#[cfg(test)]
#[path = "job_registry_tests.rs"]
mod tests;
