//! Store error taxonomy.

use agent_service_client::AgentError;
use client_registry::RegistryError;
use thiserror::Error;

/// Failure of a store action.
///
/// The display text is the human-readable message recorded in store error
/// state, so variants carrying a message display it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No client could be obtained because discovery failed.
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// A CRUD or lifecycle call was rejected. May carry an empty message.
    #[error("{0}")]
    RemoteCallFailed(String),

    /// The service accepted a create call but returned no usable entity.
    #[error("{0}")]
    ValidationFailed(String),

    /// The entity already has a lifecycle operation in flight.
    ///
    /// Never recorded as a user-visible error.
    #[error("Operation already in progress for {0}")]
    ConcurrencyRejected(String),
}

impl StoreError {
    /// Message to record for this failure, or `fallback` when it has none.
    pub fn message_or(&self, fallback: &str) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

impl From<RegistryError> for StoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::BackendUnreachable(message) => Self::BackendUnreachable(message),
        }
    }
}

impl From<AgentError> for StoreError {
    fn from(err: AgentError) -> Self {
        Self::RemoteCallFailed(err.message().unwrap_or_default())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
