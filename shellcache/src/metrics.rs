//! Metrics declaration and recording.
//!
//! Enable the `metrics` feature to emit these through the `metrics` facade.
//! Without it every recording function is a no-op.
//!
//! ## Naming Pattern
//!
//! All metrics follow the pattern: `shellcache_{subject}_{event}_total`

use shellcache_core::{RequestClass, ResponseSource};

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track served fetches per class and source.
    pub static ref FETCH_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_fetch_total",
            "Total number of intercepted fetches, by class and response source."
        );
        "shellcache_fetch_total"
    };
    /// Track fetches that produced no response.
    pub static ref FETCH_FAILED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_fetch_failed_total",
            "Total number of intercepted fetches that failed, by class."
        );
        "shellcache_fetch_failed_total"
    };
    /// Track install attempts per outcome.
    pub static ref INSTALL_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_install_total",
            "Total number of generation installs, by outcome."
        );
        "shellcache_install_total"
    };
    /// Track namespaces deleted by sweeps and purges.
    pub static ref NAMESPACE_DELETED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_namespace_deleted_total",
            "Total number of namespaces deleted."
        );
        "shellcache_namespace_deleted_total"
    };
    /// Track namespace deletions that failed.
    pub static ref NAMESPACE_DELETE_FAILED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_namespace_delete_failed_total",
            "Total number of namespace deletions that failed."
        );
        "shellcache_namespace_delete_failed_total"
    };
    /// Track failed namespace writes.
    pub static ref STORE_WRITE_FAILED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "shellcache_store_write_failed_total",
            "Total number of failed namespace writes, by role."
        );
        "shellcache_store_write_failed_total"
    };
}

/// Records a served fetch.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch(class: RequestClass, source: &ResponseSource) {
    metrics::counter!(
        *FETCH_COUNTER,
        "class" => class.as_str(),
        "source" => source.as_str()
    )
    .increment(1);
}

/// Records a served fetch (no-op when metrics disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch(_class: RequestClass, _source: &ResponseSource) {}

/// Records a fetch that failed.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch_failed(class: RequestClass) {
    metrics::counter!(*FETCH_FAILED_COUNTER, "class" => class.as_str()).increment(1);
}

/// Records a fetch that failed (no-op when metrics disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch_failed(_class: RequestClass) {}

/// Records an install outcome: `installed` or `failed`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_install(outcome: &'static str) {
    metrics::counter!(*INSTALL_COUNTER, "outcome" => outcome).increment(1);
}

/// Records an install outcome (no-op when metrics disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_install(_outcome: &'static str) {}

/// Records namespace deletions of a sweep or purge.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_namespace_deletions(deleted: usize, failed: usize) {
    metrics::counter!(*NAMESPACE_DELETED_COUNTER).increment(deleted as u64);
    metrics::counter!(*NAMESPACE_DELETE_FAILED_COUNTER).increment(failed as u64);
}

/// Records namespace deletions (no-op when metrics disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_namespace_deletions(_deleted: usize, _failed: usize) {}

/// Records a failed namespace write.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_write_failed(role: &'static str) {
    metrics::counter!(*STORE_WRITE_FAILED_COUNTER, "role" => role).increment(1);
}

/// Records a failed namespace write (no-op when metrics disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_write_failed(_role: &'static str) {}
