//! Reference dictionaries: hstore values that point at other entities.
//!
//! Each value is stored as `"<tag>:<pk>"`, where the tag names an entity type
//! registered in a [`ReferenceRegistry`]. Reads resolve the reference through
//! the registry on first access and memoize the result in place; a
//! reference whose row has gone away resolves to `None`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use hstore_rs_core::{HStoreError, HStoreResult};

use crate::dict::{json_text, HStoreDict};
use crate::value::Value;

/// An entity that can be the target of a reference.
pub trait ReferenceTarget: Send + Sync + fmt::Debug {
    /// The registry tag of the entity's type, e.g. `"app.ref"`.
    fn reference_tag(&self) -> &str;

    /// The primary key rendered as text.
    fn reference_pk(&self) -> String;
}

/// A shared handle to a resolved entity.
pub type EntityHandle = Arc<dyn ReferenceTarget>;

type LookupFn = dyn Fn(&str) -> HStoreResult<Option<EntityHandle>> + Send + Sync;

/// Returns the `"<tag>:<pk>"` reference string for `entity`.
pub fn identify_instance(entity: &dyn ReferenceTarget) -> String {
    format!("{}:{}", entity.reference_tag(), entity.reference_pk())
}

/// Maps entity tags to lookup functions.
///
/// Populated once at startup and passed to every call that resolves
/// references.
#[derive(Default, Clone)]
pub struct ReferenceRegistry {
    lookups: HashMap<String, Arc<LookupFn>>,
}

impl ReferenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the lookup for entities tagged `tag`, replacing any
    /// previous registration.
    pub fn register<F>(&mut self, tag: impl Into<String>, lookup: F)
    where
        F: Fn(&str) -> HStoreResult<Option<EntityHandle>> + Send + Sync + 'static,
    {
        self.lookups.insert(tag.into(), Arc::new(lookup));
    }

    /// Returns `true` if `tag` has a lookup.
    pub fn contains(&self, tag: &str) -> bool {
        self.lookups.contains_key(tag)
    }

    /// Resolves a reference string.
    ///
    /// The string is split on its first `:`. A missing separator, an empty
    /// tag or pk, and an unregistered tag all fail with
    /// [`HStoreError::ReferenceResolution`]. A lookup that finds nothing,
    /// or reports [`HStoreError::DoesNotExist`], resolves to `None`.
    pub fn acquire(&self, reference: &str) -> HStoreResult<Option<EntityHandle>> {
        let (tag, pk) = reference
            .split_once(':')
            .filter(|(tag, pk)| !tag.is_empty() && !pk.is_empty())
            .ok_or_else(|| {
                HStoreError::ReferenceResolution(format!("malformed reference '{reference}'"))
            })?;
        let lookup = self.lookups.get(tag).ok_or_else(|| {
            HStoreError::ReferenceResolution(format!("unknown reference type '{tag}'"))
        })?;

        match lookup(pk) {
            Ok(found) => Ok(found),
            Err(e) if e.is_does_not_exist() => {
                tracing::debug!(reference, "referenced entity no longer exists");
                Ok(None)
            }
            Err(e) => Err(HStoreError::ReferenceResolution(format!(
                "lookup for '{reference}' failed: {e}"
            ))),
        }
    }
}

impl fmt::Debug for ReferenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.lookups.keys().collect();
        tags.sort();
        f.debug_struct("ReferenceRegistry").field("tags", &tags).finish()
    }
}

/// One slot of a [`ReferenceDict`].
#[derive(Debug, Clone)]
pub enum Reference {
    /// Not yet resolved.
    Serialized(String),
    /// Resolved; `None` when the target no longer exists.
    Resolved(Option<EntityHandle>),
}

/// A dictionary whose values are references to other entities.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDict {
    slots: BTreeMap<String, Reference>,
    /// Original reference strings, kept so resolved-to-`None` slots still
    /// serialize.
    origins: BTreeMap<String, String>,
}

impl ReferenceDict {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads stored references. Keys with a `NULL` value are skipped.
    pub fn from_hstore(map: &BTreeMap<String, Option<String>>) -> Self {
        let mut dict = Self::new();
        for (key, value) in map {
            if let Some(reference) = value {
                dict.insert_reference(key.clone(), reference.clone());
            }
        }
        dict
    }

    /// Loads the references held by a plain dictionary.
    pub fn from_dict(dict: &HStoreDict) -> Self {
        Self::from_hstore(&dict.to_hstore())
    }

    /// Stores a resolved entity under `key`.
    pub fn insert_entity(&mut self, key: impl Into<String>, entity: EntityHandle) {
        let key = key.into();
        self.origins.insert(key.clone(), identify_instance(entity.as_ref()));
        self.slots.insert(key, Reference::Resolved(Some(entity)));
    }

    /// Stores an unresolved reference string under `key`.
    pub fn insert_reference(&mut self, key: impl Into<String>, reference: impl Into<String>) {
        let key = key.into();
        let reference = reference.into();
        self.origins.insert(key.clone(), reference.clone());
        self.slots.insert(key, Reference::Serialized(reference));
    }

    /// Returns the entity referenced under `key`, resolving it on first
    /// access.
    ///
    /// Fails with [`HStoreError::KeyNotFound`] for a missing key and with
    /// [`HStoreError::ReferenceResolution`] for an unresolvable reference.
    pub fn get(
        &mut self,
        key: &str,
        registry: &ReferenceRegistry,
    ) -> HStoreResult<Option<EntityHandle>> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| HStoreError::KeyNotFound(key.to_string()))?;
        let resolved = match slot {
            Reference::Resolved(entity) => return Ok(entity.clone()),
            Reference::Serialized(reference) => registry.acquire(reference)?,
        };
        *slot = Reference::Resolved(resolved.clone());
        Ok(resolved)
    }

    /// Like [`get`](Self::get), returning `default` for a missing key.
    pub fn get_or(
        &mut self,
        key: &str,
        default: Option<EntityHandle>,
        registry: &ReferenceRegistry,
    ) -> HStoreResult<Option<EntityHandle>> {
        if self.slots.contains_key(key) {
            self.get(key, registry)
        } else {
            Ok(default)
        }
    }

    /// Returns the slot for `key` without resolving it.
    pub fn slot(&self, key: &str) -> Option<&Reference> {
        self.slots.get(key)
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &str) -> Option<Reference> {
        self.origins.remove(key);
        self.slots.remove(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Returns the stored reference strings as a driver-ready text map.
    pub fn to_hstore(&self) -> BTreeMap<String, Option<String>> {
        self.origins
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect()
    }

    /// Returns the stored reference strings as JSON object text; empty
    /// dictionaries give the empty string.
    pub fn to_text(&self) -> String {
        if self.origins.is_empty() {
            return String::new();
        }
        json_text(&Value::HStore(self.to_hstore()).to_json())
    }
}

/// Converts a map of entities into reference strings.
pub fn serialize_references(
    map: &BTreeMap<String, EntityHandle>,
) -> BTreeMap<String, Option<String>> {
    map.iter()
        .map(|(k, entity)| (k.clone(), Some(identify_instance(entity.as_ref()))))
        .collect()
}

/// Resolves every reference string of `map`; `NULL` values resolve to
/// `None`.
pub fn unserialize_references(
    map: &BTreeMap<String, Option<String>>,
    registry: &ReferenceRegistry,
) -> HStoreResult<BTreeMap<String, Option<EntityHandle>>> {
    map.iter()
        .map(|(k, v)| {
            let resolved = match v {
                Some(reference) => registry.acquire(reference)?,
                None => None,
            };
            Ok((k.clone(), resolved))
        })
        .collect()
}
