//! Error types for the client registry.

use thiserror::Error;

/// Failure to produce a client handle.
///
/// `Clone` because one discovery failure is delivered to every caller that
/// was waiting on the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Discovery failed, or answered with something that is not a usable address.
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
