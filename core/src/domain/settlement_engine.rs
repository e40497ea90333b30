//! Settlement engine: payment figures, visibility and admin-only release.
//!
//! Release safety does not depend on this engine. The gateway performs the
//! conditional `Pending -> Paid` update and reports a lost race as a
//! conflict, which surfaces here as [`Error::AlreadyPaid`]. The engine only
//! avoids sending requests it already knows will fail.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, instrument, warn};

use crate::domain::in_flight::run_to_completion;
use crate::domain::ports::{Gateway, GatewayError, PaymentScope};
use crate::domain::session_store::SessionStore;
use crate::domain::{
    Action, Actor, ContactPhone, Decision, DenyReason, Error, JobId, Payment, PaymentFigures,
    PaymentId, PayoutInstruction, Role, authorize, check_session, compute_figures,
};

fn map_gateway_error(error: GatewayError, payment_id: Option<PaymentId>) -> Error {
    match (error, payment_id) {
        (GatewayError::Unauthorized { .. }, _) => Error::Unauthenticated,
        (GatewayError::Forbidden { .. }, _) => Error::Forbidden(DenyReason::NotOwner),
        (GatewayError::Conflict { .. }, Some(id)) => Error::AlreadyPaid(id),
        (GatewayError::NotFound { .. }, Some(id)) => Error::not_found("payment", id),
        (GatewayError::NotFound { message }, None) => Error::not_found("payment", message),
        (
            GatewayError::Rejected { message } | GatewayError::Conflict { message },
            _,
        ) => Error::invalid_state(message),
        (GatewayError::Unavailable { message } | GatewayError::Timeout { message }, _) => {
            Error::network(message)
        }
        (GatewayError::Decode { message }, _) => Error::internal(message),
    }
}

/// Payment service.
pub struct SettlementEngine<G> {
    gateway: Arc<G>,
    sessions: Arc<SessionStore<G>>,
    clock: Arc<dyn Clock>,
}

impl<G> Clone for SettlementEngine<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            sessions: Arc::clone(&self.sessions),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<G> SettlementEngine<G>
where
    G: Gateway + 'static,
{
    /// Create an engine sharing `sessions` for invalidation on rejection.
    pub fn new(gateway: Arc<G>, sessions: Arc<SessionStore<G>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            sessions,
            clock,
        }
    }

    /// Company cut and net payment for `amount`.
    pub fn compute_figures(amount: i64) -> Result<PaymentFigures, Error> {
        compute_figures(amount)
    }

    /// Payments visible to the actor, newest first.
    ///
    /// The gateway is asked for the caller's scope only; the local filter is
    /// a second line and never the authorisation boundary.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn list_payable(&self, actor: &Actor) -> Result<Vec<Payment>, Error> {
        let now = self.clock.utc();
        let identity = match check_session(actor.session(), now) {
            Ok(identity) => identity,
            Err(reason) => return Err(self.deny(actor, reason).await),
        };
        let Some(scope) = PaymentScope::for_identity(identity) else {
            return Ok(Vec::new());
        };

        let outcome = self.gateway.list_payments(actor.assertion(), scope).await;
        let mut payments = self.settle(actor, outcome, None).await?;

        let returned = payments.len();
        payments.retain(|payment| {
            authorize(actor.session(), &Action::ViewPayment(payment), now).is_allowed()
        });
        if payments.len() != returned {
            warn!(
                dropped = returned - payments.len(),
                "gateway returned payments outside the caller's scope"
            );
        }
        payments.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(payments)
    }

    /// Fetch a single payment visible to the actor.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn get(&self, payment_id: PaymentId, actor: &Actor) -> Result<Payment, Error> {
        let payment = self.find(payment_id, actor).await?;
        self.authorize(actor, &Action::ViewPayment(&payment)).await?;
        Ok(payment)
    }

    /// Payment created for `job_id`, if the job has reached a payable state.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn payment_for_job(
        &self,
        job_id: JobId,
        actor: &Actor,
    ) -> Result<Option<Payment>, Error> {
        if let Err(reason) = check_session(actor.session(), self.clock.utc()) {
            return Err(self.deny(actor, reason).await);
        }
        let outcome = self
            .gateway
            .find_payment_for_job(actor.assertion(), job_id)
            .await;
        let payment = self.settle(actor, outcome, None).await?;
        if let Some(payment) = &payment {
            self.authorize(actor, &Action::ViewPayment(payment)).await?;
        }
        Ok(payment)
    }

    /// Release a pending payment. Admin only; never disburses twice.
    ///
    /// Retrying after an ambiguous failure is safe: a payment that is already
    /// paid yields [`Error::AlreadyPaid`].
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn release(&self, payment_id: PaymentId, actor: &Actor) -> Result<Payment, Error> {
        self.require_admin(actor).await?;
        let payment = self.find(payment_id, actor).await?;
        self.authorize(actor, &Action::ReleasePayment(&payment)).await?;
        payment.clone().release()?;

        let gateway = Arc::clone(&self.gateway);
        let assertion = actor.assertion().clone();
        let outcome = run_to_completion(async move {
            gateway.release_payment(&assertion, payment_id).await
        })
        .await?;
        let released = self.settle(actor, outcome, Some(payment_id)).await?;

        let figures = released.figures();
        info!(
            %payment_id,
            amount = figures.amount,
            company_cut = figures.company_cut,
            net_payment = figures.net_payment,
            "payment released"
        );
        Ok(released)
    }

    /// Cancel a pending payment. Admin only.
    #[instrument(skip(self, actor), fields(user_id = ?actor.user_id()))]
    pub async fn cancel(&self, payment_id: PaymentId, actor: &Actor) -> Result<Payment, Error> {
        self.require_admin(actor).await?;
        let payment = self.find(payment_id, actor).await?;
        self.authorize(actor, &Action::CancelPayment(&payment)).await?;
        payment.clone().cancel()?;

        let gateway = Arc::clone(&self.gateway);
        let assertion = actor.assertion().clone();
        let outcome = run_to_completion(async move {
            gateway.cancel_payment(&assertion, payment_id).await
        })
        .await?;
        let cancelled = match outcome {
            Err(GatewayError::Conflict { message }) => return Err(Error::invalid_state(message)),
            other => self.settle(actor, other, Some(payment_id)).await?,
        };
        info!(%payment_id, "payment cancelled");
        Ok(cancelled)
    }

    /// Disbursement instruction for a released payment.
    pub fn payout_instruction(
        &self,
        payment: &Payment,
        phone: &ContactPhone,
    ) -> Result<PayoutInstruction, Error> {
        PayoutInstruction::for_payment(payment, phone)
    }

    async fn require_admin(&self, actor: &Actor) -> Result<(), Error> {
        let role = match check_session(actor.session(), self.clock.utc()) {
            Ok(identity) => identity.role(),
            Err(reason) => return Err(self.deny(actor, reason).await),
        };
        if role != Role::Admin {
            warn!(%role, "payment mutation denied");
            return Err(Error::Forbidden(DenyReason::InsufficientRole));
        }
        Ok(())
    }

    async fn find(&self, payment_id: PaymentId, actor: &Actor) -> Result<Payment, Error> {
        if let Err(reason) = check_session(actor.session(), self.clock.utc()) {
            return Err(self.deny(actor, reason).await);
        }
        let outcome = self.gateway.find_payment(actor.assertion(), payment_id).await;
        match outcome {
            Err(GatewayError::Conflict { message }) => Err(Error::invalid_state(message)),
            other => self.settle(actor, other, Some(payment_id)).await,
        }
    }

    async fn authorize(&self, actor: &Actor, action: &Action<'_>) -> Result<(), Error> {
        match authorize(actor.session(), action, self.clock.utc()) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(action = action.name(), %reason, "payment action denied");
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

    async fn settle<T>(
        &self,
        actor: &Actor,
        outcome: Result<T, GatewayError>,
        payment_id: Option<PaymentId>,
    ) -> Result<T, Error> {
        match outcome {
            Ok(value) => Ok(value),
            Err(error) => {
                if error.is_unauthorized() {
                    self.sessions.invalidate_if_current(actor.assertion()).await;
                }
                Err(map_gateway_error(error, payment_id))
            }
        }
    }
}

#[cfg(test)]
#[path = "settlement_engine_tests.rs"]
mod tests;
