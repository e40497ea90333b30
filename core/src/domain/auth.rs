//! Authentication primitives: credentials, federated tokens, registrations and
//! the opaque session assertion returned by the gateway.
//!
//! Keep raw input parsing here so the session store only ever talks to the
//! gateway with validated values. Secret material is wrapped in
//! [`Zeroizing`] and redacted from `Debug` output.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::identity::{ContactPhone, DisplayName, Email, Role};
use super::validation::{ValidationErrors, ViolationKind};

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN_LEN: usize = 8;

const REDACTED: &str = "<redacted>";

/// Validated email/password credentials.
///
/// ## Invariants
/// - `email` is normalised by [`Email::new`].
/// - `password` is non-empty but retains caller-provided whitespace.
///
/// # Examples
/// ```
/// use kaakazini_core::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("Ada@Example.com", "secret").unwrap();
/// assert_eq!(creds.email().as_ref(), "ada@example.com");
/// assert_eq!(creds.password(), "secret");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: Email,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw inputs, collecting every violation.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = errors.collect("email", Email::new(email));
        if password.is_empty() {
            errors.push("password", ViolationKind::Missing);
        }
        match email {
            Some(email) if errors.is_empty() => Ok(Self {
                email,
                password: Zeroizing::new(password.to_owned()),
            }),
            _ => Err(errors),
        }
    }

    /// Normalised email used for account lookups.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Password provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Third-party identity token (for example a Google ID token).
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedToken(Zeroizing<String>);

impl FederatedToken {
    /// Wrap a provider token; blank tokens are rejected.
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationErrors> {
        let token = Zeroizing::new(token.into());
        if token.trim().is_empty() {
            return Err(ValidationErrors::single("token", ViolationKind::Missing));
        }
        Ok(Self(token))
    }

    /// Raw provider token.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for FederatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FederatedToken").field(&REDACTED).finish()
    }
}

/// What the session store asks the gateway to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationRequest {
    /// Email and password exchange.
    Password(LoginCredentials),
    /// Federated token exchange for the role the caller intends to act as.
    Federated {
        /// Provider token.
        token: FederatedToken,
        /// Role the caller asks to be bound to; revalidated after sign-in.
        requested_role: Role,
    },
}

/// Self-service account registration.
///
/// Only `client` and `craftsman` accounts can be self-registered; the session
/// store rejects admin registrations before they reach the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    credentials: LoginCredentials,
    display_name: DisplayName,
    phone: Option<ContactPhone>,
    role: Role,
}

/// Raw registration form values.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub phone: Option<&'a str>,
}

impl Registration {
    /// Validate a registration form for `role`, collecting every violation.
    ///
    /// # Examples
    /// ```
    /// use kaakazini_core::domain::{Registration, RegistrationForm, Role};
    ///
    /// let form = RegistrationForm {
    ///     email: "",
    ///     password: "short",
    ///     display_name: "",
    ///     phone: None,
    /// };
    /// let errors = Registration::try_new(form, Role::Client).unwrap_err();
    /// assert_eq!(errors.len(), 3);
    /// ```
    pub fn try_new(form: RegistrationForm<'_>, role: Role) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = errors.collect("email", Email::new(form.email));
        if form.password.chars().count() < PASSWORD_MIN_LEN {
            errors.push(
                "password",
                ViolationKind::TooShort {
                    min: PASSWORD_MIN_LEN,
                },
            );
        }
        let display_name = errors.collect("displayName", DisplayName::new(form.display_name));
        let phone = match form.phone.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => errors.collect("phone", ContactPhone::new(raw)),
            None => None,
        };

        match (email, display_name) {
            (Some(email), Some(display_name)) if errors.is_empty() => Ok(Self {
                credentials: LoginCredentials {
                    email,
                    password: Zeroizing::new(form.password.to_owned()),
                },
                display_name,
                phone,
                role,
            }),
            _ => Err(errors),
        }
    }

    /// Credentials used for the follow-up sign-in.
    pub fn credentials(&self) -> &LoginCredentials {
        &self.credentials
    }

    /// Display name for the new account.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Contact phone for the new account.
    pub fn phone(&self) -> Option<&ContactPhone> {
        self.phone.as_ref()
    }

    /// Role requested for the new account.
    pub fn role(&self) -> Role {
        self.role
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("credentials", &self.credentials)
            .field("display_name", &self.display_name)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .finish()
    }
}

/// Opaque session credential issued by the gateway.
///
/// This is the only thing persisted client-side. It carries no role or
/// identity claims; those are always re-derived through `fetch_identity`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAssertion {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl SessionAssertion {
    /// Wrap a bearer token and its optional expiry.
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Bearer token presented to the gateway.
    pub fn bearer(&self) -> &str {
        self.token.as_str()
    }

    /// Expiry instant, when the gateway reported one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the assertion has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for SessionAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAssertion")
            .field("token", &REDACTED)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Drop for SessionAssertion {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.token);
    }
}
