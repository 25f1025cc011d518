#![warn(missing_docs)]
//! # shellcache-core
//!
//! Core types for the shellcache offline cache coordinator.
//!
//! This crate defines the vocabulary shared by the coordinator, the storage
//! backends and the network integrations:
//!
//! - **Generations** name one cohort of caches per deployment ([`GenerationId`])
//! - **Namespaces** scope stored responses to a generation and a role
//!   ([`NamespaceName`], [`NamespaceRole`])
//! - **Requests and responses** crossing the interception boundary
//!   ([`InterceptedRequest`], [`EntryKey`], [`ResponseSnapshot`])
//! - **Classification** of intercepted requests ([`RequestClass`])
//! - **Control messages** posted by the foreground application ([`ControlMessage`])
//! - **Network access** through the [`Network`] trait
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Enable [`mock::MockNetwork`] for tests
//!

pub mod class;
pub mod control;
pub mod generation;
pub mod label;
#[cfg(feature = "test-helpers")]
pub mod mock;
pub mod namespace;
pub mod network;
pub mod request;
pub mod response;

pub use class::RequestClass;
pub use control::{ControlCommand, ControlMessage};
pub use generation::GenerationId;
pub use label::StoreLabel;
pub use namespace::{NamespaceName, NamespaceRole};
pub use network::{Network, NetworkError};
pub use request::{EntryKey, InterceptedRequest};
pub use response::{ResponseSnapshot, ResponseSource};
#[doc(hidden)]
pub use smol_str::SmolStr;
