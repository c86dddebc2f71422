use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::options::FindOptions;

/// A record as returned by the object database: the class chain the stored
/// item belongs to (`classes[0]` is the most-derived class that owns it) and
/// its opaque, JSON-shaped value.
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub classes: Vec<String>,
    pub key: String,
    pub value: Value,
}

/// The narrow interface the repository core consumes from the underlying
/// object database (§6 of the spec). Treated as an external collaborator:
/// the core's algorithms — lifecycle, polymorphic dispatch, transaction
/// scoping — depend only on this trait, never on a concrete store.
///
/// `begin_transaction`/`commit_transaction`/`abort_transaction` stand in for
/// the spec's `objectDatabase.transaction(fn)`: the core calls
/// `begin_transaction` to obtain a transactional handle, runs the caller's
/// body against it, then calls `commit_transaction` or `abort_transaction` on
/// that handle depending on the body's outcome. A store is free to implement
/// the transactional handle as itself (auto-commit) if it has no real
/// isolation to offer, or as a staged, rollback-capable view if it does.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Ensures the object database's own on-disk/in-memory structures exist.
    async fn initialize(&self) -> Result<()>;

    /// Tears down the object database. Destructive; the caller serialises
    /// this externally (§5).
    async fn destroy(&self) -> Result<()>;

    /// Acquires the database-wide lock used around `upgrade_repository`.
    async fn lock_database(&self) -> Result<()>;

    /// Releases the database-wide lock.
    async fn unlock_database(&self) -> Result<()>;

    /// Reads the singleton repository record.
    async fn get_record(&self, error_if_missing: bool) -> Result<Option<Value>>;

    /// Writes the singleton repository record.
    async fn put_record(&self, value: &Value, error_if_exists: bool, create_if_missing: bool) -> Result<()>;

    async fn get_item(
        &self,
        class_name: &str,
        key: &str,
        error_if_missing: bool,
    ) -> Result<Option<StoreRecord>>;

    /// Bulk read. Keys with no matching record are simply absent from the
    /// result; callers that need to detect misses do so by comparing lengths
    /// or by falling back to `get_item` per key.
    async fn get_items(&self, class_name: &str, keys: &[String]) -> Result<Vec<StoreRecord>>;

    async fn put_item(
        &self,
        classes: &'static [&'static str],
        key: &str,
        value: Value,
        error_if_exists: bool,
        create_if_missing: bool,
    ) -> Result<()>;

    async fn delete_item(&self, class_name: &str, key: &str, error_if_missing: bool) -> Result<bool>;

    async fn find_items(&self, class_name: &str, options: &FindOptions) -> Result<Vec<StoreRecord>>;

    async fn count_items(&self, class_name: &str, options: &FindOptions) -> Result<u64>;

    /// Opens a transactional handle. The returned store is used for every
    /// call made inside the transaction body; it is committed or aborted
    /// exactly once.
    async fn begin_transaction(&self) -> Result<std::sync::Arc<dyn ObjectStore>>;

    /// Commits a transactional handle obtained from `begin_transaction`.
    async fn commit_transaction(&self) -> Result<()>;

    /// Aborts a transactional handle obtained from `begin_transaction`,
    /// discarding every write made through it.
    async fn abort_transaction(&self) -> Result<()>;
}
