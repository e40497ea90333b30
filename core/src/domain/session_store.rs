//! Session store: the single owner of "who is acting".
//!
//! Every successful sign-in is followed by exactly one identity fetch, and
//! the write lock is held across both calls. Readers therefore never observe
//! a half-established session, and no authorisation-dependent operation can
//! race the refresh.

use std::sync::Arc;

use mockable::Clock;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::ports::{CredentialStore, CredentialStoreError, Gateway, GatewayError};
use crate::domain::{
    Actor, AuthenticationRequest, DenyReason, Error, FederatedToken, Identity, LoginCredentials,
    Registration, Role, Session, SessionAssertion, ValidationErrors, ViolationKind,
};

#[derive(Debug, Default)]
struct SessionState {
    session: Session,
    assertion: Option<SessionAssertion>,
}

impl SessionState {
    fn reset(&mut self) {
        self.session = Session::Unauthenticated;
        self.assertion = None;
    }
}

fn map_authentication_error(error: GatewayError, request: &AuthenticationRequest) -> Error {
    match request {
        AuthenticationRequest::Password(_) => match error {
            GatewayError::Unauthorized { .. }
            | GatewayError::Rejected { .. }
            | GatewayError::Forbidden { .. } => Error::InvalidCredentials,
            other => map_gateway_error(other),
        },
        AuthenticationRequest::Federated { requested_role, .. } => match error {
            GatewayError::Unauthorized { message }
            | GatewayError::Rejected { message }
            | GatewayError::Forbidden { message } => Error::FederatedIdentityRejected { message },
            GatewayError::Conflict { .. } => Error::RoleConflict {
                requested: *requested_role,
            },
            other => map_gateway_error(other),
        },
    }
}

fn map_gateway_error(error: GatewayError) -> Error {
    match error {
        GatewayError::Unauthorized { .. } => Error::Unauthenticated,
        GatewayError::Unavailable { message } | GatewayError::Timeout { message } => {
            Error::network(message)
        }
        GatewayError::Forbidden { .. } => Error::Forbidden(DenyReason::InsufficientRole),
        GatewayError::Rejected { message } | GatewayError::Conflict { message } => {
            Error::invalid_state(message)
        }
        GatewayError::NotFound { message } => Error::not_found("identity", message),
        GatewayError::Decode { message } => Error::internal(message),
    }
}

fn map_credential_error(error: CredentialStoreError) -> Error {
    Error::internal(error.to_string())
}

/// Process-wide session service.
///
/// Construct one per running client and share it by `Arc`.
pub struct SessionStore<G> {
    gateway: Arc<G>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    state: RwLock<SessionState>,
}

impl<G> SessionStore<G>
where
    G: Gateway,
{
    /// Create an unauthenticated store.
    pub fn new(
        gateway: Arc<G>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            clock,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Current session, waiting for any in-flight sign-in to settle.
    pub async fn session(&self) -> Session {
        self.state.read().await.session.clone()
    }

    /// Current session without waiting; reports [`Session::Pending`] while a
    /// sign-in or refresh holds the store.
    pub fn snapshot(&self) -> Session {
        match self.state.try_read() {
            Ok(state) => state.session.clone(),
            Err(_) => Session::Pending,
        }
    }

    /// Resolved identity, if authenticated.
    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.session.identity().cloned()
    }

    /// Snapshot for an authorisation-dependent call.
    ///
    /// Expired sessions are still returned so the access policy can report
    /// the expiry as a typed denial.
    pub async fn actor(&self) -> Result<Actor, Error> {
        let state = self.state.read().await;
        match (&state.session, &state.assertion) {
            (Session::Authenticated { .. }, Some(assertion)) => {
                Ok(Actor::new(state.session.clone(), assertion.clone()))
            }
            _ => Err(Error::Unauthenticated),
        }
    }

    /// Sign in with email and password.
    #[instrument(skip_all, fields(email = %credentials.email()))]
    pub async fn sign_in(&self, credentials: LoginCredentials) -> Result<Session, Error> {
        self.establish(AuthenticationRequest::Password(credentials)).await
    }

    /// Exchange a third-party identity token for a session bound to
    /// `requested_role`.
    #[instrument(skip(self, token))]
    pub async fn sign_in_with_federated_token(
        &self,
        token: FederatedToken,
        requested_role: Role,
    ) -> Result<Session, Error> {
        self.establish(AuthenticationRequest::Federated {
            token,
            requested_role,
        })
        .await
    }

    /// Register a client or craftsman account, then sign in with it.
    #[instrument(
        skip_all,
        fields(email = %registration.credentials().email(), role = %registration.role())
    )]
    pub async fn sign_up(&self, registration: Registration) -> Result<Session, Error> {
        if registration.role() == Role::Admin {
            return Err(Error::Forbidden(DenyReason::InsufficientRole));
        }
        self.gateway
            .register(&registration)
            .await
            .map_err(|error| match error {
                GatewayError::Conflict { .. } => {
                    Error::Validation(ValidationErrors::single("email", ViolationKind::NotAllowed))
                }
                other => map_gateway_error(other),
            })?;
        info!("account registered");
        self.sign_in(registration.credentials().clone()).await
    }

    /// Re-resolve the identity behind the current assertion.
    ///
    /// Returns `Ok(None)` and clears the session when the gateway no longer
    /// accepts the assertion. Transport failures leave the session intact.
    #[instrument(skip(self))]
    pub async fn refresh_identity(&self) -> Result<Option<Identity>, Error> {
        let mut state = self.state.write().await;
        self.refresh_locked(&mut state).await
    }

    /// Rehydrate the session from the credential slot at process start.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<Identity>, Error> {
        let mut state = self.state.write().await;
        let assertion = match self.credentials.load() {
            Ok(assertion) => assertion,
            Err(CredentialStoreError::Corrupt { message }) => {
                warn!(%message, "discarding unreadable credential slot");
                self.clear_slot();
                None
            }
            Err(error) => return Err(map_credential_error(error)),
        };
        state.assertion = assertion;
        self.refresh_locked(&mut state).await
    }

    /// Clear the local session and revoke it remotely on a best-effort basis.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        let assertion = {
            let mut state = self.state.write().await;
            let assertion = state.assertion.take();
            state.reset();
            assertion
        };
        self.clear_slot();

        if let Some(assertion) = assertion {
            if let Err(error) = self.gateway.revoke_session(&assertion).await {
                warn!(%error, "remote sign-out failed; local session cleared");
            }
        }
        info!("signed out");
    }

    /// Drop the session if `assertion` is still the live one.
    ///
    /// Services call this when the gateway rejects an assertion, so a stale
    /// rejection never clears a newer session.
    pub async fn invalidate_if_current(&self, assertion: &SessionAssertion) -> bool {
        let mut state = self.state.write().await;
        if state.assertion.as_ref() != Some(assertion) {
            debug!("ignoring rejection of a superseded session");
            return false;
        }
        state.reset();
        self.clear_slot();
        info!("session invalidated after gateway rejection");
        true
    }

    /// Install an authenticated session directly, bypassing the gateway.
    #[cfg(test)]
    pub(crate) async fn install(&self, identity: Identity, assertion: SessionAssertion) -> Actor {
        let mut state = self.state.write().await;
        state.session = Session::authenticated(identity, assertion.expires_at());
        state.assertion = Some(assertion.clone());
        Actor::new(state.session.clone(), assertion)
    }

    /// Exchange `request` for a session. Any session it replaces is cleared
    /// from the slot and revoked, whether or not the exchange succeeds.
    async fn establish(&self, request: AuthenticationRequest) -> Result<Session, Error> {
        let mut state = self.state.write().await;
        let replaced = state.assertion.take();
        state.reset();
        state.session = Session::Pending;
        self.clear_slot();
        if let Some(replaced) = replaced {
            if let Err(error) = self.gateway.revoke_session(&replaced).await {
                warn!(%error, "failed to revoke the replaced session");
            }
        }

        let assertion = match self.gateway.authenticate(&request).await {
            Ok(assertion) => assertion,
            Err(error) => {
                state.reset();
                let error = map_authentication_error(error, &request);
                warn!(code = ?error.code(), "sign-in rejected");
                return Err(error);
            }
        };

        let identity = match self.gateway.fetch_identity(&assertion).await {
            Ok(identity) => identity,
            Err(error) => {
                state.reset();
                return Err(map_gateway_error(error));
            }
        };

        let conflicting_role = match &request {
            AuthenticationRequest::Federated { requested_role, .. }
                if identity.role() != *requested_role =>
            {
                Some(*requested_role)
            }
            _ => None,
        };
        if let Some(requested_role) = conflicting_role {
            state.reset();
            if let Err(error) = self.gateway.revoke_session(&assertion).await {
                warn!(%error, "failed to revoke session after role conflict");
            }
            return Err(Error::RoleConflict {
                requested: requested_role,
            });
        }

        if let Err(error) = self.credentials.store(&assertion) {
            warn!(%error, "session credential not persisted; it will not survive a restart");
        }
        state.session = Session::authenticated(identity, assertion.expires_at());
        state.assertion = Some(assertion);
        info!(user_id = ?state.session.identity().map(Identity::id), "signed in");
        Ok(state.session.clone())
    }

    async fn refresh_locked(&self, state: &mut SessionState) -> Result<Option<Identity>, Error> {
        let Some(assertion) = state.assertion.clone() else {
            state.reset();
            return Ok(None);
        };
        if assertion.is_expired(self.clock.utc()) {
            debug!("stored session assertion has expired");
            state.reset();
            self.clear_slot();
            return Ok(None);
        }

        match self.gateway.fetch_identity(&assertion).await {
            Ok(identity) => {
                state.session = Session::authenticated(identity.clone(), assertion.expires_at());
                Ok(Some(identity))
            }
            Err(GatewayError::Unauthorized { .. } | GatewayError::Forbidden { .. }) => {
                state.reset();
                self.clear_slot();
                Ok(None)
            }
            Err(error) => Err(map_gateway_error(error)),
        }
    }

    fn clear_slot(&self) {
        if let Err(error) = self.credentials.clear() {
            warn!(%error, "failed to clear credential slot");
        }
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
