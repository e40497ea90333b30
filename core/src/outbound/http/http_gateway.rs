//! Reqwest-backed gateway adapter.
//!
//! This adapter owns transport details only: bearer authentication, request
//! serialisation, timeout and HTTP status mapping, and JSON decoding into
//! domain records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::dto::{
    AssignmentDto, FederatedLoginDto, JobDraftDto, PasswordLoginDto, QuoteDto, RegistrationDto,
    ReviewDto, SessionDto, StatusChangeDto,
};
use crate::domain::ports::{Gateway, GatewayError, JobScope, PaymentScope};
use crate::domain::{
    Amount, AuthenticationRequest, Identity, JobDraft, JobId, JobRequest, JobStatus, Payment,
    PaymentId, Registration, SessionAssertion, UserId,
};

const DEFAULT_USER_AGENT: &str = "kaakazini-core/0.1";
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Gateway adapter speaking JSON over HTTPS to one API root.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// `base_url` is treated as a directory: a missing trailing `/` is added
    /// so relative endpoint paths resolve beneath it.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: directory_url(base_url),
        })
    }

    /// API root all endpoints resolve against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|error| GatewayError::rejected(format!("invalid endpoint {path}: {error}")))
    }

    fn get(
        &self,
        assertion: &SessionAssertion,
        path: &str,
    ) -> Result<RequestBuilder, GatewayError> {
        Ok(self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(assertion.bearer()))
    }

    fn post<B>(
        &self,
        assertion: Option<&SessionAssertion>,
        path: &str,
        body: &B,
    ) -> Result<RequestBuilder, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.client.post(self.endpoint(path)?).json(body);
        Ok(match assertion {
            Some(assertion) => request.bearer_auth(assertion.bearer()),
            None => request,
        })
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, GatewayError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "gateway returned an error status");
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn fetch<T>(&self, request: RequestBuilder) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let body = self.execute(request).await?;
        decode(&body)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<SessionAssertion, GatewayError> {
        let builder = match request {
            AuthenticationRequest::Password(credentials) => self.post(
                None,
                "accounts/login/",
                &PasswordLoginDto::from(credentials),
            )?,
            AuthenticationRequest::Federated {
                token,
                requested_role,
            } => self.post(
                None,
                "accounts/google-login/",
                &FederatedLoginDto {
                    token: token.as_str(),
                    role: *requested_role,
                },
            )?,
        };
        let session: SessionDto = self.fetch(builder).await?;
        session.into_assertion().map_err(GatewayError::decode)
    }

    async fn register(&self, registration: &Registration) -> Result<(), GatewayError> {
        let builder = self.post(
            None,
            "accounts/signup/",
            &RegistrationDto::from(registration),
        )?;
        self.execute(builder).await?;
        Ok(())
    }

    async fn fetch_identity(
        &self,
        assertion: &SessionAssertion,
    ) -> Result<Identity, GatewayError> {
        self.fetch(self.get(assertion, "accounts/me/")?).await
    }

    async fn revoke_session(&self, assertion: &SessionAssertion) -> Result<(), GatewayError> {
        let builder = self.post(Some(assertion), "accounts/logout/", &serde_json::json!({}))?;
        self.execute(builder).await?;
        Ok(())
    }

    async fn create_job(
        &self,
        assertion: &SessionAssertion,
        draft: &JobDraft,
    ) -> Result<JobRequest, GatewayError> {
        let builder = self.post(Some(assertion), "job-requests/", &JobDraftDto::from(draft))?;
        self.fetch(builder).await
    }

    async fn list_jobs(
        &self,
        assertion: &SessionAssertion,
        scope: JobScope,
    ) -> Result<Vec<JobRequest>, GatewayError> {
        let builder = self
            .get(assertion, "job-requests/")?
            .query(&job_scope_query(scope));
        self.fetch(builder).await
    }

    async fn find_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<JobRequest, GatewayError> {
        self.fetch(self.get(assertion, &format!("job-requests/{job_id}/"))?)
            .await
    }

    async fn update_job_status(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        target: JobStatus,
    ) -> Result<JobRequest, GatewayError> {
        let builder = self.post(
            Some(assertion),
            &format!("job-requests/{job_id}/status/"),
            &StatusChangeDto { status: target },
        )?;
        self.fetch(builder).await
    }

    async fn attach_review(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        text: &str,
    ) -> Result<JobRequest, GatewayError> {
        let builder = self.post(
            Some(assertion),
            &format!("job-requests/{job_id}/review/"),
            &ReviewDto { review: text },
        )?;
        self.fetch(builder).await
    }

    async fn assign_craftsman(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        craftsman_id: UserId,
    ) -> Result<JobRequest, GatewayError> {
        let builder = self.post(
            Some(assertion),
            &format!("job-requests/{job_id}/assign/"),
            &AssignmentDto { craftsman_id },
        )?;
        self.fetch(builder).await
    }

    async fn quote_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
        amount: Amount,
    ) -> Result<JobRequest, GatewayError> {
        let builder = self.post(
            Some(assertion),
            &format!("job-requests/{job_id}/quote/"),
            &QuoteDto { amount },
        )?;
        self.fetch(builder).await
    }

    async fn list_payments(
        &self,
        assertion: &SessionAssertion,
        scope: PaymentScope,
    ) -> Result<Vec<Payment>, GatewayError> {
        let builder = self
            .get(assertion, "payments/")?
            .query(&payment_scope_query(scope));
        self.fetch(builder).await
    }

    async fn find_payment_for_job(
        &self,
        assertion: &SessionAssertion,
        job_id: JobId,
    ) -> Result<Option<Payment>, GatewayError> {
        self.fetch(self.get(assertion, &format!("job-requests/{job_id}/payment/"))?)
            .await
    }

    async fn find_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        self.fetch(self.get(assertion, &format!("payments/{payment_id}/"))?)
            .await
    }

    async fn release_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        let builder = self
            .post(
                Some(assertion),
                &format!("payments/{payment_id}/release/"),
                &serde_json::json!({}),
            )?
            .header(IDEMPOTENCY_KEY, release_idempotency_key(payment_id));
        self.fetch(builder).await
    }

    async fn cancel_payment(
        &self,
        assertion: &SessionAssertion,
        payment_id: PaymentId,
    ) -> Result<Payment, GatewayError> {
        let builder = self.post(
            Some(assertion),
            &format!("payments/{payment_id}/cancel/"),
            &serde_json::json!({}),
        )?;
        self.fetch(builder).await
    }
}

fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn decode<T>(body: &[u8]) -> Result<T, GatewayError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|error| {
        GatewayError::decode(format!(
            "invalid gateway JSON payload: {error} (body: {})",
            body_preview(body)
        ))
    })
}

fn job_scope_query(scope: JobScope) -> Vec<(&'static str, String)> {
    match scope {
        JobScope::All => vec![("scope", "all".to_owned())],
        JobScope::OwnedBy(client) => vec![("client", client.to_string())],
        JobScope::AssignedTo(craftsman) => vec![("craftsman", craftsman.to_string())],
    }
}

fn payment_scope_query(scope: PaymentScope) -> Vec<(&'static str, String)> {
    match scope {
        PaymentScope::All => vec![("scope", "all".to_owned())],
        PaymentScope::OwnedBy(client) => vec![("client", client.to_string())],
    }
}

/// Stable per-payment key, so a retried release is recognised server-side.
fn release_idempotency_key(payment_id: PaymentId) -> String {
    format!("release-{payment_id}")
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(error.to_string())
    } else if error.is_decode() {
        GatewayError::decode(error.to_string())
    } else {
        GatewayError::unavailable(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::UNAUTHORIZED => GatewayError::unauthorized(message),
        StatusCode::FORBIDDEN => GatewayError::forbidden(message),
        StatusCode::NOT_FOUND => GatewayError::not_found(message),
        StatusCode::CONFLICT => GatewayError::conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::timeout(message)
        }
        _ if status.is_client_error() => GatewayError::rejected(message),
        _ => GatewayError::unavailable(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
