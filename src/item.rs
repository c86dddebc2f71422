use std::any::Any;

use serde_json::Value;

use crate::error::Result;

/// The capability the repository core needs from a user-facing item.
///
/// The core never inspects item contents beyond this surface: it asks for a
/// class, a primary key, a JSON-shaped record to persist, and a way to fold a
/// freshly read record back into an existing instance. Everything else about
/// the item — validation, dirty tracking beyond `is_new`, derived fields — is
/// the implementor's business.
pub trait Item: Send + Sync + Any {
    /// The most-derived class this concrete item belongs to.
    fn class_name(&self) -> &'static str;

    /// The item's class chain, most-derived first. Each entry is a class
    /// that owns a primary key and therefore has its own collection.
    fn class_chain(&self) -> &'static [&'static str];

    /// The item's primary key value.
    fn primary_key(&self) -> &str;

    /// `true` until the item has been successfully written once.
    fn is_new(&self) -> bool;

    /// Serializes the item's property bag into an opaque, JSON-shaped record.
    fn serialize(&self) -> Value;

    /// Refreshes in-place state from a freshly read record, e.g. after a
    /// `get` resolves against the item's own most-derived class.
    fn replace_value(&mut self, record: &Value) -> Result<()>;

    /// Transitions `is_new` to `false`. Called by the repository exactly
    /// once, right after a `put` the store has accepted.
    fn mark_persisted(&mut self);

    /// Type-erased view for downcasting a polymorphically returned item back
    /// to its concrete Rust type.
    fn as_any(&self) -> &dyn Any;
}

/// Downcasts a boxed, polymorphically returned item to a concrete type.
///
/// Returns `None` if the item was materialised at a different class than `T`
/// — e.g. a query over a base collection returned an item of a derived class.
pub fn downcast_ref<T: Item + 'static>(item: &dyn Item) -> Option<&T> {
    item.as_any().downcast_ref::<T>()
}
