//! Identifier interning.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::IdentifierRef;

struct Inner {
    map: FxHashMap<Box<str>, IdentifierRef>,
    items: Vec<Box<str>>,
}

/// Interns identifier strings to stable references; equal strings always
/// yield the same reference.
pub struct IdentifierPool {
    inner: RwLock<Inner>,
}

impl IdentifierPool {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: FxHashMap::default(),
                items: Vec::new(),
            }),
        }
    }

    pub fn intern(&self, name: &str) -> IdentifierRef {
        if let Some(r) = self.inner.read().map.get(name) {
            return *r;
        }
        let mut inner = self.inner.write();
        if let Some(r) = inner.map.get(name) {
            return *r;
        }
        let r = IdentifierRef::new(inner.items.len() as u32);
        inner.map.insert(name.into(), r);
        inner.items.push(name.into());
        r
    }

    pub fn name(&self, id: IdentifierRef) -> String {
        if id.is_invalid() {
            return String::new();
        }
        self.inner.read().items[id.index()].to_string()
    }
}

impl Default for IdentifierPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let pool = IdentifierPool::new();
        let a = pool.intern("main");
        let b = pool.intern("main");
        let c = pool.intern("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.name(a), "main");
    }
}
