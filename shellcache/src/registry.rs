//! Generation bookkeeping.
//!
//! [`CacheVersionRegistry`] knows which generation is current, which one has
//! been installed and waits for promotion, and which generations still own
//! namespaces. The whole state lives behind a `tokio::sync::watch` sender, so
//! every transition is a single atomic swap: a reader either sees the state
//! before a promotion or after it, never in between.

use std::collections::BTreeSet;

use shellcache_core::GenerationId;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::error::RegistryError;

const CHANGE_CAPACITY: usize = 16;

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    current: Option<GenerationId>,
    pending: Option<GenerationId>,
    known: BTreeSet<GenerationId>,
}

impl RegistrySnapshot {
    /// The generation requests are served from.
    pub fn current(&self) -> Option<&GenerationId> {
        self.current.as_ref()
    }

    /// The installed generation waiting for promotion.
    pub fn pending(&self) -> Option<&GenerationId> {
        self.pending.as_ref()
    }

    /// Every generation that may still own namespaces.
    pub fn known(&self) -> &BTreeSet<GenerationId> {
        &self.known
    }
}

/// Emitted on every successful promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationChange {
    /// Generation that was current before the promotion.
    pub previous: Option<GenerationId>,
    /// Newly current generation.
    pub current: GenerationId,
}

/// Owner of the current-generation pointer.
///
/// Shared by handle (`Arc`). [`promote`](Self::promote) is the only way to
/// change the current generation.
#[derive(Debug)]
pub struct CacheVersionRegistry {
    state: watch::Sender<RegistrySnapshot>,
    changes: broadcast::Sender<GenerationChange>,
}

impl CacheVersionRegistry {
    /// Creates a registry with no generation.
    pub fn new() -> Self {
        Self::from_snapshot(RegistrySnapshot::default())
    }

    /// Creates a registry whose current generation is already activated,
    /// for coordinators restarted over a populated store.
    pub fn with_current(generation: GenerationId) -> Self {
        let mut known = BTreeSet::new();
        known.insert(generation.clone());
        Self::from_snapshot(RegistrySnapshot {
            current: Some(generation),
            pending: None,
            known,
        })
    }

    fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let (state, _) = watch::channel(snapshot);
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { state, changes }
    }

    /// The current generation, `None` before the first activation.
    pub fn current_generation(&self) -> Option<GenerationId> {
        self.state.borrow().current.clone()
    }

    /// Whether `generation` is the current one.
    pub fn is_current(&self, generation: &GenerationId) -> bool {
        self.state.borrow().current.as_ref() == Some(generation)
    }

    /// The installed generation waiting for promotion.
    pub fn pending(&self) -> Option<GenerationId> {
        self.state.borrow().pending.clone()
    }

    /// Every generation that may still own namespaces.
    pub fn all_known_generations(&self) -> BTreeSet<GenerationId> {
        self.state.borrow().known.clone()
    }

    /// Copy of the whole state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.borrow().clone()
    }

    /// Records that the shell namespace of `generation` is fully populated.
    ///
    /// The generation becomes the pending one, replacing any earlier pending
    /// generation that was never promoted.
    pub fn mark_installed(&self, generation: GenerationId) {
        self.state.send_modify(|state| {
            state.known.insert(generation.clone());
            if let Some(replaced) = state.pending.replace(generation.clone())
                && replaced != generation
            {
                debug!(%replaced, %generation, "pending generation replaced");
            }
        });
    }

    /// Makes the pending `generation` current.
    ///
    /// Fails with [`RegistryError::NotInstalled`] unless `generation` is the
    /// pending one.
    pub fn promote(&self, generation: &GenerationId) -> Result<GenerationChange, RegistryError> {
        let mut change = None;
        self.state.send_if_modified(|state| {
            if state.pending.as_ref() != Some(generation) {
                return false;
            }
            state.pending = None;
            let previous = state.current.replace(generation.clone());
            change = Some(GenerationChange {
                previous,
                current: generation.clone(),
            });
            true
        });

        let change = change.ok_or_else(|| RegistryError::NotInstalled(generation.clone()))?;
        info!(
            previous = change.previous.as_ref().map(|g| g.as_str()),
            current = %change.current,
            "generation promoted"
        );
        // No subscribers is fine.
        let _ = self.changes.send(change.clone());
        Ok(change)
    }

    /// Clears the pending slot if it holds `generation`.
    ///
    /// Called before a generation's shell namespace is rebuilt, so a failed
    /// rebuild cannot leave a pending generation whose namespace is gone.
    pub fn withdraw(&self, generation: &GenerationId) -> bool {
        let withdrawn = self.state.send_if_modified(|state| {
            if state.pending.as_ref() != Some(generation) {
                return false;
            }
            state.pending = None;
            true
        });
        if withdrawn {
            debug!(%generation, "pending generation withdrawn");
        }
        withdrawn
    }

    /// Drops a destroyed generation. The current and pending generations are
    /// never forgotten.
    pub fn forget(&self, generation: &GenerationId) -> bool {
        self.state.send_if_modified(|state| {
            if state.current.as_ref() == Some(generation)
                || state.pending.as_ref() == Some(generation)
            {
                return false;
            }
            state.known.remove(generation)
        })
    }

    /// Subscribes to promotions.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationChange> {
        self.changes.subscribe()
    }

    /// Watches the whole state.
    pub fn watch(&self) -> watch::Receiver<RegistrySnapshot> {
        self.state.subscribe()
    }
}

impl Default for CacheVersionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> GenerationId {
        GenerationId::new(s)
    }

    #[test]
    fn test_empty_registry() {
        let registry = CacheVersionRegistry::new();
        assert!(registry.current_generation().is_none());
        assert!(registry.pending().is_none());
        assert!(registry.all_known_generations().is_empty());
    }

    #[test]
    fn test_promote_requires_install() {
        let registry = CacheVersionRegistry::new();
        assert_eq!(
            registry.promote(&id("v1")),
            Err(RegistryError::NotInstalled(id("v1")))
        );
        assert!(registry.current_generation().is_none());
    }

    #[test]
    fn test_promote_installed() {
        let registry = CacheVersionRegistry::with_current(id("v1"));
        registry.mark_installed(id("v2"));
        assert_eq!(registry.pending(), Some(id("v2")));

        let change = registry.promote(&id("v2")).unwrap();
        assert_eq!(change.previous, Some(id("v1")));
        assert_eq!(change.current, id("v2"));
        assert_eq!(registry.current_generation(), Some(id("v2")));
        assert!(registry.pending().is_none());

        // Promotion consumes the pending slot.
        assert!(registry.promote(&id("v2")).is_err());
    }

    #[test]
    fn test_newer_install_replaces_pending() {
        let registry = CacheVersionRegistry::new();
        registry.mark_installed(id("v1"));
        registry.mark_installed(id("v2"));
        assert!(registry.promote(&id("v1")).is_err());
        assert!(registry.promote(&id("v2")).is_ok());
        assert_eq!(
            registry.all_known_generations().into_iter().collect::<Vec<_>>(),
            vec![id("v1"), id("v2")]
        );
    }

    #[test]
    fn test_forget_keeps_live_generations() {
        let registry = CacheVersionRegistry::with_current(id("v1"));
        registry.mark_installed(id("v2"));
        registry.mark_installed(id("v3"));
        assert!(!registry.forget(&id("v1")));
        assert!(!registry.forget(&id("v3")));
        assert!(registry.forget(&id("v2")));
        assert!(!registry.forget(&id("v2")));
    }

    #[test]
    fn test_withdraw_clears_only_matching_pending() {
        let registry = CacheVersionRegistry::with_current(id("v1"));
        registry.mark_installed(id("v2"));

        assert!(!registry.withdraw(&id("v1")));
        assert!(!registry.withdraw(&id("v3")));
        assert_eq!(registry.pending(), Some(id("v2")));

        assert!(registry.withdraw(&id("v2")));
        assert!(registry.pending().is_none());
        assert!(registry.promote(&id("v2")).is_err());
        assert_eq!(registry.current_generation(), Some(id("v1")));
        // Still known until a sweep confirms its namespaces are gone.
        assert!(registry.all_known_generations().contains(&id("v2")));
        assert!(registry.forget(&id("v2")));
    }

    #[tokio::test]
    async fn test_promotion_is_broadcast() {
        let registry = CacheVersionRegistry::new();
        let mut changes = registry.subscribe();
        let mut state = registry.watch();

        registry.mark_installed(id("v1"));
        registry.promote(&id("v1")).unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.current, id("v1"));
        assert!(state.has_changed().unwrap());
        assert_eq!(state.borrow_and_update().current(), Some(&id("v1")));
    }
}
