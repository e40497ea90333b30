//! Wire DTOs for the HTTP gateway.
//!
//! Requests are built from domain values in one pass; responses that are not
//! plain domain records (the session envelope) are decoded here first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Amount, JobDraft, JobStatus, LoginCredentials, Registration, Role, SessionAssertion, UserId,
};

#[derive(Debug, Serialize)]
pub(super) struct PasswordLoginDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

impl<'a> From<&'a LoginCredentials> for PasswordLoginDto<'a> {
    fn from(credentials: &'a LoginCredentials) -> Self {
        Self {
            email: credentials.email().as_ref(),
            password: credentials.password(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct FederatedLoginDto<'a> {
    pub(super) token: &'a str,
    pub(super) role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegistrationDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
    pub(super) display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) phone: Option<&'a str>,
    pub(super) role: Role,
}

impl<'a> From<&'a Registration> for RegistrationDto<'a> {
    fn from(registration: &'a Registration) -> Self {
        Self {
            email: registration.credentials().email().as_ref(),
            password: registration.credentials().password(),
            display_name: registration.display_name().as_ref(),
            phone: registration.phone().map(AsRef::as_ref),
            role: registration.role(),
        }
    }
}

/// Session envelope returned by the login endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionDto {
    pub(super) token: String,
    #[serde(default)]
    pub(super) expires_at: Option<DateTime<Utc>>,
}

impl SessionDto {
    pub(super) fn into_assertion(self) -> Result<SessionAssertion, String> {
        if self.token.trim().is_empty() {
            return Err("session token is blank".to_owned());
        }
        Ok(SessionAssertion::new(self.token, self.expires_at))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobDraftDto<'a> {
    pub(super) client_id: UserId,
    pub(super) service: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) custom_service: Option<&'a str>,
    pub(super) scheduled_at: DateTime<Utc>,
    pub(super) address: &'a str,
    pub(super) location: &'a str,
    pub(super) description: &'a str,
    pub(super) urgent: bool,
}

impl<'a> From<&'a JobDraft> for JobDraftDto<'a> {
    fn from(draft: &'a JobDraft) -> Self {
        Self {
            client_id: draft.client_id,
            service: draft.service.as_str(),
            custom_service: draft.custom_service.as_deref(),
            scheduled_at: draft.scheduled_at,
            address: draft.address.as_str(),
            location: draft.location.as_str(),
            description: draft.description.as_str(),
            urgent: draft.urgent,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StatusChangeDto {
    pub(super) status: JobStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewDto<'a> {
    pub(super) review: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignmentDto {
    pub(super) craftsman_id: UserId,
}

#[derive(Debug, Serialize)]
pub(super) struct QuoteDto {
    pub(super) amount: Amount,
}
