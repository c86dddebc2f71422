use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RepoError, Result};
use crate::item::Item;

/// Schema entry for one collection: its item type, its class chain (the
/// ordered list of primary-key-owning ancestor classes, most-derived last
/// here but reported derived-first by `Item::class_chain`), and the factory
/// that materialises a stored record back into a concrete item.
///
/// Implemented by the type that stands in for a collection in client code
/// (one zero-sized marker type per collection, analogous to the teacher's
/// `PersistEntityFactory` per-entity factory trait).
pub trait CollectionClass: Send + Sync + 'static {
    /// Concrete item type stored in this collection.
    type Item: Item + 'static;

    /// The collection's own (most-derived, for this class) name.
    const NAME: &'static str;

    /// Derived-first class chain; `NAME` must be `class_chain()[0]`.
    fn class_chain() -> &'static [&'static str];

    /// Reconstructs an item of this class from its primary key and the
    /// opaque record the object store returned.
    fn from_record(key: &str, record: &Value) -> Result<Self::Item>;
}

/// Object-safe registration entry backing `ClassRegistry`. One entry per
/// registered `CollectionClass`, type-erased so the registry can hold a
/// heterogeneous set of them (mirrors the teacher's `HeteroPersistVec`
/// per-type registration table in `persist/core/containers_and_values.rs`).
trait ClassRegistration: Send + Sync {
    fn name(&self) -> &'static str;
    fn class_chain(&self) -> &'static [&'static str];
    fn materialize(&self, key: &str, record: &Value) -> Result<Box<dyn Item>>;
}

struct ClassEntry<C: CollectionClass>(PhantomData<fn() -> C>);

impl<C: CollectionClass> ClassRegistration for ClassEntry<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn class_chain(&self) -> &'static [&'static str] {
        C::class_chain()
    }

    fn materialize(&self, key: &str, record: &Value) -> Result<Box<dyn Item>> {
        let item = C::from_record(key, record)?;
        Ok(Box::new(item))
    }
}

/// Resolves a class name to a collection factory, and materialises stored
/// records at their true, most-derived class (§4.A).
pub struct ClassRegistry {
    entries: HashMap<&'static str, Arc<dyn ClassRegistration>>,
}

impl ClassRegistry {
    pub fn builder() -> ClassRegistryBuilder {
        ClassRegistryBuilder::default()
    }

    pub fn is_registered(&self, class_name: &str) -> bool {
        self.entries.contains_key(class_name)
    }

    /// Number of classes registered on this repository.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the class chain registered for `class_name`, if known.
    pub fn class_chain_of(&self, class_name: &str) -> Result<&'static [&'static str]> {
        self.entries
            .get(class_name)
            .map(|entry| entry.class_chain())
            .ok_or_else(|| RepoError::UnknownClass(class_name.to_string()))
    }

    /// Materialises a record at the class named `class_name`, failing with
    /// `UnknownClass` if that class was never registered on this repository.
    pub fn materialize(&self, class_name: &str, key: &str, record: &Value) -> Result<Box<dyn Item>> {
        let entry = self
            .entries
            .get(class_name)
            .ok_or_else(|| RepoError::UnknownClass(class_name.to_string()))?;
        entry.materialize(key, record)
    }
}

/// Builds a `ClassRegistry` by registering one `CollectionClass` at a time.
#[derive(Default)]
pub struct ClassRegistryBuilder {
    entries: HashMap<&'static str, Arc<dyn ClassRegistration>>,
}

impl ClassRegistryBuilder {
    pub fn register<C: CollectionClass>(mut self) -> Self {
        self.entries
            .insert(C::NAME, Arc::new(ClassEntry::<C>(PhantomData)));
        self
    }

    pub fn build(self) -> ClassRegistry {
        ClassRegistry {
            entries: self.entries,
        }
    }
}
