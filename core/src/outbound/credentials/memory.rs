//! Process-local credential slot.

use std::sync::{Mutex, MutexGuard};

use crate::domain::SessionAssertion;
use crate::domain::ports::{CredentialStore, CredentialStoreError};

/// Credential slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<SessionAssertion>>,
}

impl MemoryCredentialStore {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-populated with `assertion`.
    pub fn with_assertion(assertion: SessionAssertion) -> Self {
        Self {
            slot: Mutex::new(Some(assertion)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<SessionAssertion>>, CredentialStoreError> {
        self.slot
            .lock()
            .map_err(|_| CredentialStoreError::io("credential slot lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<SessionAssertion>, CredentialStoreError> {
        Ok(self.lock()?.clone())
    }

    fn store(&self, assertion: &SessionAssertion) -> Result<(), CredentialStoreError> {
        *self.lock()? = Some(assertion.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        *self.lock()? = None;
        Ok(())
    }
}
