//! Port for the persisted session credential slot.
//!
//! Only the opaque [`SessionAssertion`] is persisted. Role and identity are
//! never stored here; they are re-derived from the gateway on restore.

use crate::domain::SessionAssertion;

use super::define_port_error;

define_port_error! {
    /// Errors raised by credential slot adapters.
    pub enum CredentialStoreError {
        /// Slot could not be read or written.
        Io { message: String } => "credential slot i/o failed: {message}",
        /// Slot content could not be decoded.
        Corrupt { message: String } => "credential slot is corrupt: {message}",
    }
}

/// Scoped, renewable slot holding the current session assertion.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Read the stored assertion, if any.
    fn load(&self) -> Result<Option<SessionAssertion>, CredentialStoreError>;

    /// Replace the stored assertion.
    fn store(&self, assertion: &SessionAssertion) -> Result<(), CredentialStoreError>;

    /// Remove the stored assertion. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}
