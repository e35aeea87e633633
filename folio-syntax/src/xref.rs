//! An in-memory table of indirect objects.

use crate::object::{ObjRef, Object, ObjectModel};
use rustc_hash::FxHashMap;

/// An object model whose objects all live in memory.
///
/// Streams inserted into the table remember their identity, so that they can
/// be used as cache keys by consumers.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjects {
    objects: FxHashMap<ObjRef, Object>,
    next_num: u32,
}

impl MemoryObjects {
    /// Create a new, empty table.
    pub fn new() -> Self {
        Self {
            objects: FxHashMap::default(),
            next_num: 1,
        }
    }

    /// Insert an object under a fresh object number and return its reference.
    pub fn insert(&mut self, obj: Object) -> ObjRef {
        let id = ObjRef::new(self.next_num.max(1), 0);
        self.set(id, obj);

        id
    }

    /// Insert an object under the given reference, replacing any previous one.
    pub fn set(&mut self, id: ObjRef, mut obj: Object) {
        if let Object::Stream(s) = &mut obj {
            s.set_id(id);
        }

        self.next_num = self.next_num.max(id.num.saturating_add(1));
        self.objects.insert(id, obj);
    }

    /// The number of objects in the table.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectModel for MemoryObjects {
    fn resolve(&self, id: ObjRef) -> Option<Object> {
        self.objects.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Dict, Stream};

    #[test]
    fn streams_know_their_identity() {
        let mut objects = MemoryObjects::new();
        let id = objects.insert(Object::Stream(Stream::new(Dict::new(), b"q Q".to_vec())));

        let resolved = objects.resolve(id).unwrap();
        assert_eq!(resolved.as_stream().unwrap().id(), Some(id));
    }

    #[test]
    fn references_are_followed() {
        let mut objects = MemoryObjects::new();
        let inner = objects.insert(Object::Number(3.0));
        let outer = objects.insert(Object::Ref(inner));
        let dict = Object::Dict(Dict::new().with("Key", Object::Ref(outer)));

        assert_eq!(objects.dict_get(&dict, b"Key"), Some(Object::Number(3.0)));
        assert_eq!(objects.dict_get(&dict, b"Missing"), None);
    }

    #[test]
    fn cycles_resolve_to_null() {
        let mut objects = MemoryObjects::new();
        let id = ObjRef::new(7, 0);
        objects.set(id, Object::Ref(id));

        assert_eq!(objects.resolve_object(&Object::Ref(id)), Object::Null);
    }

    #[test]
    fn fresh_numbers_skip_explicit_ones() {
        let mut objects = MemoryObjects::new();
        objects.set(ObjRef::new(10, 0), Object::Null);

        assert_eq!(objects.insert(Object::Bool(true)), ObjRef::new(11, 0));
    }
}
