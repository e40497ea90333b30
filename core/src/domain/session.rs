//! Session lifecycle values.
//!
//! A [`Session`] is the single record of who is acting in this process. Only
//! the session store mutates it; services receive a read-only [`Actor`]
//! snapshot for each call.

use chrono::{DateTime, Utc};

use super::auth::SessionAssertion;
use super::identity::{Identity, Role, UserId};

/// Client-side session state.
///
/// `unauthenticated -> pending -> authenticated` on a successful exchange;
/// back to `Unauthenticated` on sign-out, expiry or any `401` from the
/// gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// No identity.
    #[default]
    Unauthenticated,
    /// Credentials exchanged; identity refresh still in flight.
    Pending,
    /// Identity resolved from the gateway.
    Authenticated {
        /// Server-side identity.
        identity: Identity,
        /// Expiry reported with the session assertion.
        expires_at: Option<DateTime<Utc>>,
    },
}

impl Session {
    /// Authenticated session for `identity`.
    pub fn authenticated(identity: Identity, expires_at: Option<DateTime<Utc>>) -> Self {
        Self::Authenticated {
            identity,
            expires_at,
        }
    }

    /// Resolved identity, when authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity, .. } => Some(identity),
            Self::Unauthenticated | Self::Pending => None,
        }
    }

    /// Whether an identity has been resolved.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Expiry instant of an authenticated session.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Authenticated { expires_at, .. } => *expires_at,
            Self::Unauthenticated | Self::Pending => None,
        }
    }

    /// Whether the session has lapsed at `now`. Sessions without an expiry
    /// never lapse on their own.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expiry| expiry <= now)
    }

    /// Role of the resolved identity.
    pub fn role(&self) -> Option<Role> {
        self.identity().map(Identity::role)
    }
}

/// Snapshot of the acting session handed to the registry and engine.
///
/// Holding an `Actor` never extends the session: the store revalidates the
/// assertion when the gateway rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    session: Session,
    assertion: SessionAssertion,
}

impl Actor {
    /// Pair a session with the assertion used to reach the gateway.
    pub fn new(session: Session, assertion: SessionAssertion) -> Self {
        Self { session, assertion }
    }

    /// Session snapshot evaluated by the access policy.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Bearer assertion for gateway calls.
    pub fn assertion(&self) -> &SessionAssertion {
        &self.assertion
    }

    /// Resolved identity.
    pub fn identity(&self) -> Option<&Identity> {
        self.session.identity()
    }

    /// Identifier of the resolved identity.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(Identity::id)
    }
}
