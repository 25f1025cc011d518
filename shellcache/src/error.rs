//! Error types of the coordinator.

use shellcache_backend::StoreError;
use shellcache_core::{GenerationId, NetworkError};
use smol_str::SmolStr;
use thiserror::Error;

use crate::dispatch::EventKind;

/// Installation of a generation failed. The registry is left unchanged.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A manifest entry could not be fetched or answered with a non-success
    /// status.
    #[error("precache entry {entry} unavailable: {reason}")]
    MissingEntry {
        /// Manifest path of the entry.
        entry: SmolStr,
        /// Network error or status line.
        reason: String,
    },
    /// The generation is already current; reinstalling it would replace the
    /// live shell.
    #[error("generation {0} is already current")]
    AlreadyCurrent(GenerationId),
    /// Generation ids must not be blank.
    #[error("generation id is empty")]
    EmptyGeneration,
    /// The shell namespace could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejected registry transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Only the pending, fully installed generation can be promoted.
    #[error("generation {0} is not installed")]
    NotInstalled(GenerationId),
}

/// Promotion or the following sweep failed.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// Promotion was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The store could not list its namespaces.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A fetch that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The network failed and no cached fallback was available (or allowed).
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Invalid coordinator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be deserialized.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_saphyr::Error),
    /// A field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of a dispatched event.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The install event failed.
    #[error(transparent)]
    Install(#[from] InstallError),
    /// The activate event failed.
    #[error(transparent)]
    Activation(#[from] ActivationError),
    /// A store operation outside install or activation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The handler registered for this kind does not accept the event.
    #[error("no handler accepts {0} events")]
    Unhandled(EventKind),
}

/// The worker could not deliver an event.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker loop has stopped.
    #[error("worker stopped")]
    Stopped,
    /// The event was handled and failed.
    #[error(transparent)]
    Event(#[from] CoordinatorError),
}
