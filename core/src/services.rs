//! Builders that assemble the session store and the services around it.
//!
//! All services share one gateway, one session store and one clock. Embedders
//! build a [`CoreServices`] once at start-up and hand out clones.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tracing::info;

use crate::config::CoreSettings;
use crate::domain::ports::{CredentialStore, CredentialStoreError, Gateway};
use crate::domain::{JobRegistry, SessionStore, SettlementEngine};
use crate::outbound::credentials::{FileCredentialStore, MemoryCredentialStore};
use crate::outbound::http::HttpGateway;
use crate::outbound::memory::InMemoryGateway;

/// Failures while assembling services from settings.
#[derive(Debug, Error)]
pub enum WiringError {
    /// Configured gateway URL is not absolute.
    #[error("gateway url is invalid: {0}")]
    GatewayUrl(#[from] url::ParseError),
    /// TLS or client setup failed.
    #[error("http client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// Slot directory could not be created or opened.
    #[error("credential slot unavailable: {0}")]
    CredentialSlot(#[from] CredentialStoreError),
}

/// Session store plus the job and payment services bound to it.
pub struct CoreServices<G> {
    gateway: Arc<G>,
    sessions: Arc<SessionStore<G>>,
    jobs: JobRegistry<G>,
    settlements: SettlementEngine<G>,
}

impl<G> Clone for CoreServices<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            sessions: Arc::clone(&self.sessions),
            jobs: self.jobs.clone(),
            settlements: self.settlements.clone(),
        }
    }
}

impl<G> CoreServices<G>
where
    G: Gateway + 'static,
{
    /// Wire services around an existing gateway and credential slot.
    pub fn new(
        gateway: Arc<G>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            Arc::clone(&gateway),
            credentials,
            Arc::clone(&clock),
        ));
        let jobs = JobRegistry::new(
            Arc::clone(&gateway),
            Arc::clone(&sessions),
            Arc::clone(&clock),
        );
        let settlements = SettlementEngine::new(Arc::clone(&gateway), Arc::clone(&sessions), clock);
        Self {
            gateway,
            sessions,
            jobs,
            settlements,
        }
    }

    /// Gateway shared by every service.
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Process-wide session store.
    pub fn sessions(&self) -> &Arc<SessionStore<G>> {
        &self.sessions
    }

    /// Job request service.
    pub fn jobs(&self) -> &JobRegistry<G> {
        &self.jobs
    }

    /// Payment settlement service.
    pub fn settlements(&self) -> &SettlementEngine<G> {
        &self.settlements
    }
}

impl CoreServices<HttpGateway> {
    /// Build services that talk to the configured HTTP back end.
    ///
    /// # Errors
    ///
    /// Fails when the gateway URL does not parse, the HTTP client cannot be
    /// built, or the credential slot cannot be opened.
    pub fn from_settings(
        settings: &CoreSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WiringError> {
        let gateway = HttpGateway::new(settings.gateway_url()?, settings.request_timeout())?;
        info!(base_url = %gateway.base_url(), "using http gateway");
        let credentials = credential_slot(settings)?;
        Ok(Self::new(Arc::new(gateway), credentials, clock))
    }
}

impl CoreServices<InMemoryGateway> {
    /// Build services backed by the in-process gateway.
    ///
    /// # Errors
    ///
    /// Fails when the configured credential slot cannot be opened.
    pub fn offline(settings: &CoreSettings, clock: Arc<dyn Clock>) -> Result<Self, WiringError> {
        let gateway = InMemoryGateway::with_session_ttl(Arc::clone(&clock), settings.session_ttl());
        info!("using in-memory gateway");
        let credentials = credential_slot(settings)?;
        Ok(Self::new(Arc::new(gateway), credentials, clock))
    }
}

fn credential_slot(settings: &CoreSettings) -> Result<Arc<dyn CredentialStore>, WiringError> {
    Ok(match settings.credential_path() {
        Some(path) => Arc::new(FileCredentialStore::open(path)?),
        None => Arc::new(MemoryCredentialStore::new()),
    })
}
