#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Request classification by origin and path pattern.
///
/// [`RequestClassifier`] maps an intercepted URL to a
/// [`RequestClass`](shellcache_core::RequestClass); API paths are matched
/// with actix-router patterns.
pub mod classifier;

/// Open foreground clients and generation-changed notices.
pub mod clients;

/// Configuration loaded from YAML.
pub mod config;

/// The one-way control channel of the foreground application.
pub mod control;

/// Events, their handlers and the [`Coordinator`] dispatch table.
pub mod dispatch;

/// Error types.
///
/// One enum per concern:
/// - [`InstallError`] for installs
/// - [`RegistryError`] and [`ActivationError`] for promotion
/// - [`FetchError`] for intercepted requests
/// - [`ConfigError`] for configuration
pub mod error;

/// All-or-nothing precaching of a generation's shell.
pub mod install;

/// The precache manifest.
pub mod manifest;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, this module provides counters for
/// fetches by class and source, install outcomes, namespace deletions and
/// failed namespace writes.
pub mod metrics;

/// The current-generation registry.
pub mod registry;

/// Per-class response strategies.
pub mod strategy;

/// Promotion cleanup and cache purging.
pub mod sweep;

/// The inbound event queue.
pub mod worker;

pub use classifier::{ApiPattern, RequestClassifier};
pub use clients::{ClientId, ClientNotice, ClientRegistry};
pub use config::CoordinatorConfig;
pub use control::ControlChannel;
pub use dispatch::{
    ControlReport, Coordinator, CoordinatorBuilder, Event, EventHandler, EventKind, EventOutcome,
};
pub use error::{
    ActivationError, ConfigError, CoordinatorError, FetchError, InstallError, RegistryError,
    WorkerError,
};
pub use install::{InstallCoordinator, InstallReport};
pub use manifest::PrecacheManifest;
pub use registry::{CacheVersionRegistry, GenerationChange, RegistrySnapshot};
pub use strategy::{FetchOutcome, ServedResponse, StrategyExecutor};
pub use sweep::{ActivationSweeper, PurgeReport, SweepReport};
pub use worker::Worker;

pub use shellcache_core::{
    ControlCommand, ControlMessage, EntryKey, GenerationId, InterceptedRequest, NamespaceName,
    NamespaceRole, Network, NetworkError, RequestClass, ResponseSnapshot, ResponseSource,
};
