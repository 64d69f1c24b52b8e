//! Proxy kind descriptors.
//!
//! Every concrete proxy type is described by a `'static` [`ProxyKind`] that
//! names its parent kind. The registry uses the parent chain to decide
//! whether two proxies claiming the same handle are the same object seen
//! through related types, or two unrelated bindings colliding on a reused
//! address.
//!
//! ```ignore
//! pub static RESOURCE: ProxyKind = ProxyKind::derived("Resource", &REF_COUNTED);
//! pub static TEXTURE: ProxyKind = ProxyKind::derived("Texture", &RESOURCE);
//! pub static APPLICATION: ProxyKind =
//!     ProxyKind::derived("Application", &REF_COUNTED).with_native_delete(false);
//! ```

use std::fmt;
use std::ptr;

/// Static description of a proxy kind.
///
/// Policies left unset are inherited from the parent kind. At the root the
/// defaults are: weak by default, native deletion permitted.
pub struct ProxyKind {
    name: &'static str,
    parent: Option<&'static ProxyKind>,
    strong_by_default: Option<bool>,
    native_delete: Option<bool>,
}

/// Root of every kind hierarchy.
pub static REF_COUNTED: ProxyKind = ProxyKind::root("RefCounted");

impl ProxyKind {
    pub const fn root(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            strong_by_default: None,
            native_delete: None,
        }
    }

    pub const fn derived(name: &'static str, parent: &'static ProxyKind) -> Self {
        Self {
            name,
            parent: Some(parent),
            strong_by_default: None,
            native_delete: None,
        }
    }

    /// Registry entries for this kind own the proxy even when the native
    /// reference count is zero.
    pub const fn with_strong_by_default(self, strong: bool) -> Self {
        Self {
            strong_by_default: Some(strong),
            ..self
        }
    }

    /// Whether explicit disposal may ask native code to delete the object.
    pub const fn with_native_delete(self, allowed: bool) -> Self {
        Self {
            native_delete: Some(allowed),
            ..self
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static ProxyKind> {
        self.parent
    }

    pub fn is_strong_by_default(&self) -> bool {
        self.lineage()
            .find_map(|kind| kind.strong_by_default)
            .unwrap_or(false)
    }

    pub fn allows_native_delete(&self) -> bool {
        self.lineage()
            .find_map(|kind| kind.native_delete)
            .unwrap_or(true)
    }

    /// This kind followed by its ancestors, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &ProxyKind> {
        std::iter::successors(Some(self), |kind| kind.parent.map(|p| p as &ProxyKind))
    }

    /// True when `self` is `other` or derives from it.
    pub fn is_subtype_of(&self, other: &ProxyKind) -> bool {
        self.lineage().any(|kind| ptr::eq(kind, other))
    }

    /// True when either kind is assignable to the other.
    pub fn is_related_to(&self, other: &ProxyKind) -> bool {
        self.is_subtype_of(other) || other.is_subtype_of(self)
    }
}

impl PartialEq for ProxyKind {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for ProxyKind {}

impl fmt::Debug for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<&str> = self.lineage().map(|kind| kind.name).collect();
        f.debug_struct("ProxyKind")
            .field("lineage", &path.join(" : "))
            .field("strong_by_default", &self.is_strong_by_default())
            .field("native_delete", &self.allows_native_delete())
            .finish()
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
