//! Handle registry
//!
//! Maps each native handle to the proxy currently bound to it. Entries are
//! either strong (the registry owns the proxy and keeps it alive) or weak
//! (identity only).
//!
//! The map is split into shards so that unrelated handles rarely contend.
//! A handle always hashes to the same shard, which makes every operation on
//! one handle fully serialized. Locks are never held while a proxy is dropped:
//! displaced entries are handed back to the caller and dropped after the
//! guard is released, because a proxy's drop path re-enters the registry.

use super::kind::ProxyKind;
use super::proxy::RefCounted;
use super::Handle;
use crate::core::error::{BindingError, BindingResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// How the registry holds a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strength {
    Strong,
    Weak,
}

impl Strength {
    /// Evaluated once, at registration. Later changes to the native count do
    /// not promote or demote the entry.
    pub fn decide(native_refs: u32, kind: &ProxyKind) -> Self {
        if native_refs >= 1 || kind.is_strong_by_default() {
            Self::Strong
        } else {
            Self::Weak
        }
    }
}

enum Target {
    Strong(Arc<dyn RefCounted>),
    Weak(Weak<dyn RefCounted>),
}

struct Entry {
    serial: u64,
    kind: &'static ProxyKind,
    target: Target,
}

impl Entry {
    fn new(object: &Arc<dyn RefCounted>, strength: Strength) -> Self {
        let proxy = object.proxy();
        let target = match strength {
            Strength::Strong => Target::Strong(Arc::clone(object)),
            Strength::Weak => Target::Weak(Arc::downgrade(object)),
        };
        Self {
            serial: proxy.serial(),
            kind: proxy.kind(),
            target,
        }
    }

    fn strength(&self) -> Strength {
        match self.target {
            Target::Strong(_) => Strength::Strong,
            Target::Weak(_) => Strength::Weak,
        }
    }

    fn live(&self) -> Option<Arc<dyn RefCounted>> {
        match &self.target {
            Target::Strong(object) => Some(Arc::clone(object)),
            Target::Weak(object) => object.upgrade(),
        }
    }

    fn is_live(&self) -> bool {
        match &self.target {
            Target::Strong(_) => true,
            Target::Weak(object) => object.strong_count() > 0,
        }
    }
}

type Shard = HashMap<Handle, Entry>;

/// Outcome of an owner-checked release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// The entry belonged to the caller and was removed.
    Released,
    /// Another proxy now owns the handle; the caller no longer speaks for
    /// the native object.
    Superseded,
    /// Nothing is bound to the handle.
    Vacant,
}

/// Process-wide cache of bound proxies, keyed by handle.
pub struct HandleRegistry {
    shards: Box<[Mutex<Shard>]>,
}

impl HandleRegistry {
    pub const DEFAULT_SHARDS: usize = 16;

    pub fn new() -> Self {
        Self::with_shards(Self::DEFAULT_SHARDS)
    }

    /// `shards` is rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count).map(|_| Mutex::new(Shard::new())).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, handle: Handle) -> MutexGuard<'_, Shard> {
        // Handles are aligned addresses; fold the high bits down before masking.
        let mixed = (handle.raw() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let index = (mixed >> 32) as usize & (self.shards.len() - 1);
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `object` to `handle`.
    ///
    /// A live entry of a related kind (one assignable to the other) is
    /// replaced. A live entry of an unrelated kind is an identity conflict.
    /// Entries whose weakly held proxy is already gone are vacant.
    pub fn register(
        &self,
        handle: Handle,
        object: &Arc<dyn RefCounted>,
        strength: Strength,
    ) -> BindingResult<()> {
        let kind = object.proxy().kind();
        let displaced = {
            let mut shard = self.shard(handle);
            if let Some(existing) = shard.get(&handle) {
                if existing.is_live() && !existing.kind.is_related_to(kind) {
                    tracing::error!(
                        target: "registry",
                        "identity conflict on {}: {} vs {}",
                        handle,
                        existing.kind,
                        kind
                    );
                    return Err(BindingError::IdentityConflict {
                        handle,
                        existing: existing.kind.name(),
                        requested: kind.name(),
                    });
                }
            }
            shard.insert(handle, Entry::new(object, strength))
        };

        match &displaced {
            Some(old) => tracing::debug!(
                target: "registry",
                "{} rebound from {} to {} ({:?})",
                handle,
                old.kind,
                kind,
                strength
            ),
            None => tracing::trace!(target: "registry", "{} bound to {} ({:?})", handle, kind, strength),
        }
        drop(displaced);
        Ok(())
    }

    /// Remove whatever is bound to `handle`. Returns whether an entry existed.
    pub fn unregister(&self, handle: Handle) -> bool {
        let removed = self.shard(handle).remove(&handle);
        removed.is_some()
    }

    /// Remove the entry for `handle` only if it still belongs to the proxy
    /// with `serial`. A late finalizer must not unbind a newer proxy that
    /// reused the same address.
    pub(crate) fn release(&self, handle: Handle, serial: u64) -> Release {
        let removed = {
            let mut shard = self.shard(handle);
            match shard.get(&handle) {
                Some(entry) if entry.serial == serial => shard.remove(&handle),
                Some(_) => return Release::Superseded,
                None => return Release::Vacant,
            }
        };
        drop(removed);
        Release::Released
    }

    /// The live proxy bound to `handle`, if any.
    pub fn lookup(&self, handle: Handle) -> Option<Arc<dyn RefCounted>> {
        self.shard(handle).get(&handle).and_then(Entry::live)
    }

    /// Like [`lookup`](Self::lookup), downcast to the concrete binding type.
    pub fn lookup_as<T: RefCounted + Any>(&self, handle: Handle) -> Option<Arc<T>> {
        self.lookup(handle)?.into_any_arc().downcast::<T>().ok()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.shard(handle).contains_key(&handle)
    }

    pub fn strength(&self, handle: Handle) -> Option<Strength> {
        self.shard(handle).get(&handle).map(Entry::strength)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every registered handle.
    pub fn handles(&self) -> Vec<Handle> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Drop every entry and return how many there were. Never asks native
    /// code to delete anything; owned proxies are released after all shard
    /// locks are dropped.
    pub fn clear(&self) -> usize {
        let drained: Vec<Shard> = self
            .shards
            .iter()
            .map(|shard| std::mem::take(&mut *shard.lock().unwrap_or_else(PoisonError::into_inner)))
            .collect();
        let count = drained.iter().map(Shard::len).sum();
        tracing::debug!(target: "registry", "cleared {} entries", count);
        drop(drained);
        count
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::kind::REF_COUNTED;
    use crate::bindings::native::NativeApi;
    use crate::bindings::proxy::{NativeObject, Proxy};
    use crate::native::NativeHeap;

    static RESOURCE: ProxyKind = ProxyKind::derived("Resource", &REF_COUNTED);
    static TEXTURE: ProxyKind = ProxyKind::derived("Texture", &RESOURCE);
    static SOUND: ProxyKind = ProxyKind::derived("Sound", &RESOURCE);
    static NODE: ProxyKind = ProxyKind::derived("Node", &REF_COUNTED).with_strong_by_default(true);

    // Proxies built here have no runtime, so their drop never reaches the
    // registry or native code.
    fn object(heap: &Arc<NativeHeap>, handle: Handle, kind: &'static ProxyKind) -> Arc<dyn RefCounted> {
        let native: Arc<dyn NativeApi> = heap.clone();
        let proxy = Proxy::new(handle, kind, native, Weak::new()).unwrap();
        Arc::new(NativeObject::new(proxy))
    }

    #[test]
    fn test_strength_decision() {
        assert_eq!(Strength::decide(0, &TEXTURE), Strength::Weak);
        assert_eq!(Strength::decide(1, &TEXTURE), Strength::Strong);
        assert_eq!(Strength::decide(3, &TEXTURE), Strength::Strong);
        assert_eq!(Strength::decide(0, &NODE), Strength::Strong);
    }

    #[test]
    fn test_register_then_lookup() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let texture = object(&heap, handle, &TEXTURE);

        registry.register(handle, &texture, Strength::Weak).unwrap();

        let found = registry.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &texture));
        assert_eq!(registry.strength(handle), Some(Strength::Weak));
        assert!(registry.lookup_as::<NativeObject>(handle).is_some());
    }

    #[test]
    fn test_weak_entry_does_not_keep_proxy_alive() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let texture = object(&heap, handle, &TEXTURE);

        registry.register(handle, &texture, Strength::Weak).unwrap();
        drop(texture);

        assert!(registry.contains(handle));
        assert!(registry.lookup(handle).is_none());
    }

    #[test]
    fn test_strong_entry_keeps_proxy_alive() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let node = object(&heap, handle, &NODE);
        let weak = Arc::downgrade(&node);

        registry.register(handle, &node, Strength::Strong).unwrap();
        drop(node);

        assert!(weak.upgrade().is_some());
        assert!(registry.unregister(handle));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_unrelated_kinds_conflict() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let texture = object(&heap, handle, &TEXTURE);
        let sound = object(&heap, handle, &SOUND);

        registry.register(handle, &texture, Strength::Weak).unwrap();
        let err = registry.register(handle, &sound, Strength::Weak).unwrap_err();

        assert_eq!(
            err,
            BindingError::IdentityConflict {
                handle,
                existing: "Texture",
                requested: "Sound",
            }
        );
        let found = registry.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &texture));
    }

    #[test]
    fn test_related_kinds_replace() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let resource = object(&heap, handle, &RESOURCE);
        let texture = object(&heap, handle, &TEXTURE);

        registry.register(handle, &resource, Strength::Weak).unwrap();
        registry.register(handle, &texture, Strength::Strong).unwrap();
        let found = registry.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &texture));
        assert_eq!(registry.strength(handle), Some(Strength::Strong));

        // Supertype over subtype is allowed as well.
        registry.register(handle, &resource, Strength::Weak).unwrap();
        let found = registry.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &resource));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dead_weak_entry_is_vacant() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();

        let texture = object(&heap, handle, &TEXTURE);
        registry.register(handle, &texture, Strength::Weak).unwrap();
        drop(texture);

        let sound = object(&heap, handle, &SOUND);
        registry.register(handle, &sound, Strength::Weak).unwrap();
        let found = registry.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &sound));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let texture = object(&heap, handle, &TEXTURE);

        registry.register(handle, &texture, Strength::Weak).unwrap();
        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_checks_owner() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::new();
        let handle = heap.create();
        let old = object(&heap, handle, &TEXTURE);
        let new = object(&heap, handle, &TEXTURE);

        registry.register(handle, &old, Strength::Weak).unwrap();
        registry.register(handle, &new, Strength::Weak).unwrap();

        assert_eq!(registry.release(handle, old.proxy().serial()), Release::Superseded);
        assert!(registry.contains(handle));
        assert_eq!(registry.release(handle, new.proxy().serial()), Release::Released);
        assert!(!registry.contains(handle));
        assert_eq!(registry.release(handle, new.proxy().serial()), Release::Vacant);
    }

    #[test]
    fn test_clear_drains_every_shard() {
        let heap = Arc::new(NativeHeap::new());
        let registry = HandleRegistry::with_shards(4);
        let objects: Vec<_> = (0..32)
            .map(|_| {
                let handle = heap.create();
                let obj = object(&heap, handle, &TEXTURE);
                registry.register(handle, &obj, Strength::Strong).unwrap();
                obj
            })
            .collect();

        assert_eq!(registry.len(), 32);
        assert_eq!(registry.handles().len(), 32);
        assert_eq!(registry.clear(), 32);
        assert!(registry.is_empty());
        assert!(objects.iter().all(|obj| Arc::strong_count(obj) == 1));
    }

    #[test]
    fn test_shard_count_rounds_up() {
        assert_eq!(HandleRegistry::with_shards(0).shard_count(), 1);
        assert_eq!(HandleRegistry::with_shards(5).shard_count(), 8);
        assert_eq!(HandleRegistry::new().shard_count(), 16);
    }
}
