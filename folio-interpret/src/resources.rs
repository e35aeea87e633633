//! Looking up named resources.

use folio_syntax::{Dict, Name, Object, ObjectModel};
use core::fmt;
use std::sync::Arc;

/// The category of a named resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    /// Fonts, used by `Tf`.
    Font,
    /// External objects, used by `Do`.
    XObject,
    /// Graphics state parameter dictionaries, used by `gs`.
    ExtGState,
    /// Patterns, used by `scn` and `SCN`.
    Pattern,
    /// Shadings, used by `sh`.
    Shading,
    /// Property lists, used by marked content.
    Properties,
    /// Color spaces, used by `cs`, `CS` and inline images.
    ColorSpace,
}

impl ResourceCategory {
    /// The key of the category in a resource dictionary.
    pub fn key(self) -> &'static [u8] {
        match self {
            Self::Font => b"Font",
            Self::XObject => b"XObject",
            Self::ExtGState => b"ExtGState",
            Self::Pattern => b"Pattern",
            Self::Shading => b"Shading",
            Self::Properties => b"Properties",
            Self::ColorSpace => b"ColorSpace",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(core::str::from_utf8(self.key()).unwrap_or("?"))
    }
}

/// Access to the named resources of a content stream.
pub trait ResourceLookup: Send + Sync {
    /// Find a resource by name. The returned object may still be an
    /// indirect reference.
    fn find(&self, name: &Name, category: ResourceCategory) -> Option<Object>;
}

/// Resources backed by a `/Resources` dictionary.
///
/// Lookups that fail are forwarded to an optional parent, so that form
/// XObjects without resources of their own can use the ones of the page.
#[derive(Clone)]
pub struct DictResources {
    dict: Dict,
    objects: Arc<dyn ObjectModel>,
    parent: Option<Arc<dyn ResourceLookup>>,
}

impl DictResources {
    /// Create resources from a resource dictionary.
    pub fn new(dict: Dict, objects: Arc<dyn ObjectModel>) -> Self {
        Self {
            dict,
            objects,
            parent: None,
        }
    }

    /// Create resources without any entries.
    pub fn empty(objects: Arc<dyn ObjectModel>) -> Self {
        Self::new(Dict::new(), objects)
    }

    /// Set the resources to fall back to.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<dyn ResourceLookup>) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl ResourceLookup for DictResources {
    fn find(&self, name: &Name, category: ResourceCategory) -> Option<Object> {
        let own = self
            .dict
            .get(category.key())
            .map(|sub| self.objects.resolve_object(sub))
            .and_then(|sub| sub.as_dict().and_then(|d| d.get(name)).cloned());

        own.or_else(|| self.parent.as_ref()?.find(name, category))
    }
}

impl fmt::Debug for DictResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictResources")
            .field("dict", &self.dict)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_syntax::MemoryObjects;

    #[test]
    fn indirect_category_and_parent() {
        let mut objects = MemoryObjects::new();
        let fonts = objects.insert(Object::Dict(Dict::new().with("F1", Object::Number(1.0))));
        let objects: Arc<dyn ObjectModel> = Arc::new(objects);

        let page = DictResources::new(Dict::new().with("Font", Object::Ref(fonts)), objects.clone());
        assert_eq!(
            page.find(&Name::from("F1"), ResourceCategory::Font),
            Some(Object::Number(1.0))
        );
        assert_eq!(page.find(&Name::from("F1"), ResourceCategory::XObject), None);

        let form = DictResources::empty(objects).with_parent(Arc::new(page));
        assert_eq!(
            form.find(&Name::from("F1"), ResourceCategory::Font),
            Some(Object::Number(1.0))
        );
    }
}
