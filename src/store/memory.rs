use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::{RepoError, Result};
use crate::options::{FindOptions, Order};
use crate::store::object_store::{ObjectStore, StoreRecord};

#[derive(Debug, Clone)]
struct StoredEntry {
    classes: Vec<String>,
    value: Value,
}

type Table = BTreeMap<String, StoredEntry>;

/// Shared, process-local state backing both the root store and every
/// transactional handle opened from it — grounded on the teacher's
/// `InMemoryStorage` (`storage/memory.rs`) table layout, generalised from
/// fixed SQL tables to per-class key/value tables.
struct MemoryState {
    tables: RwLock<HashMap<String, Table>>,
    record: RwLock<Option<Value>>,
    lock: Mutex<()>,
    held_guard: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl MemoryState {
    fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            record: RwLock::new(None),
            lock: Mutex::new(()),
            held_guard: Mutex::new(None),
        }
    }
}

/// The one concrete `ObjectStore` this crate ships: an in-process, in-memory
/// key/value store with per-class tables and cross-class indexing (an item
/// stored under a derived class is also written into every ancestor class's
/// table, which is what makes §3's cross-class query invariant hold).
pub struct MemoryObjectStore {
    state: Arc<MemoryState>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState::new()),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn matches_query(value: &Value, query: &BTreeMap<String, Value>) -> bool {
    query.iter().all(|(field, expected)| value.get(field) == Some(expected))
}

fn in_range(key: &str, options: &FindOptions) -> bool {
    if let Some(start) = &options.start {
        if key < start.as_str() {
            return false;
        }
    }
    if let Some(end) = &options.end {
        if key > end.as_str() {
            return false;
        }
    }
    if let Some(start_after) = &options.start_after {
        if key <= start_after.as_str() {
            return false;
        }
    }
    if let Some(end_before) = &options.end_before {
        if key >= end_before.as_str() {
            return false;
        }
    }
    true
}

fn order_fields(order: &Order) -> Vec<&str> {
    match order {
        Order::Field(field) => vec![field.as_str()],
        Order::Fields(fields) => fields.iter().map(String::as_str).collect(),
    }
}

fn apply_find_options(mut items: Vec<StoreRecord>, options: &FindOptions) -> Vec<StoreRecord> {
    if let Some(order) = &options.order {
        let fields = order_fields(order);
        items.sort_by(|a, b| {
            for field in &fields {
                let ord = compare_values(a.value.get(*field), b.value.get(*field));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    if options.reverse {
        items.reverse();
    }
    if let Some(limit) = options.limit {
        items.truncate(limit);
    }
    items
}

fn filtered_records(table: &Table, options: &FindOptions) -> Vec<StoreRecord> {
    table
        .iter()
        .filter(|(key, _)| in_range(key, options))
        .filter(|(_, entry)| matches_query(&entry.value, &options.query))
        .map(|(key, entry)| StoreRecord {
            classes: entry.classes.clone(),
            key: key.clone(),
            value: entry.value.clone(),
        })
        .collect()
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.state.tables.write().await.clear();
        *self.state.record.write().await = None;
        Ok(())
    }

    async fn lock_database(&self) -> Result<()> {
        let guard = self.state.lock.clone().lock_owned().await;
        *self.state.held_guard.lock().await = Some(guard);
        Ok(())
    }

    async fn unlock_database(&self) -> Result<()> {
        *self.state.held_guard.lock().await = None;
        Ok(())
    }

    async fn get_record(&self, error_if_missing: bool) -> Result<Option<Value>> {
        match &*self.state.record.read().await {
            Some(value) => Ok(Some(value.clone())),
            None if error_if_missing => Err(RepoError::NotFound("$Repository".into())),
            None => Ok(None),
        }
    }

    async fn put_record(&self, value: &Value, error_if_exists: bool, create_if_missing: bool) -> Result<()> {
        let mut record = self.state.record.write().await;
        let exists = record.is_some();
        if exists && error_if_exists {
            return Err(RepoError::AlreadyExists("$Repository".into()));
        }
        if !exists && !create_if_missing {
            return Err(RepoError::NotFound("$Repository".into()));
        }
        *record = Some(value.clone());
        Ok(())
    }

    async fn get_item(&self, class_name: &str, key: &str, error_if_missing: bool) -> Result<Option<StoreRecord>> {
        let tables = self.state.tables.read().await;
        match tables.get(class_name).and_then(|table| table.get(key)) {
            Some(entry) => Ok(Some(StoreRecord {
                classes: entry.classes.clone(),
                key: key.to_string(),
                value: entry.value.clone(),
            })),
            None if error_if_missing => Err(RepoError::NotFound(key.to_string())),
            None => Ok(None),
        }
    }

    async fn get_items(&self, class_name: &str, keys: &[String]) -> Result<Vec<StoreRecord>> {
        let tables = self.state.tables.read().await;
        let Some(table) = tables.get(class_name) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| {
                table.get(key).map(|entry| StoreRecord {
                    classes: entry.classes.clone(),
                    key: key.clone(),
                    value: entry.value.clone(),
                })
            })
            .collect())
    }

    async fn put_item(
        &self,
        classes: &'static [&'static str],
        key: &str,
        value: Value,
        error_if_exists: bool,
        create_if_missing: bool,
    ) -> Result<()> {
        let mut tables = self.state.tables.write().await;
        let primary = classes[0];
        let exists = tables.get(primary).is_some_and(|table| table.contains_key(key));
        if exists && error_if_exists {
            return Err(RepoError::AlreadyExists(key.to_string()));
        }
        if !exists && !create_if_missing {
            return Err(RepoError::NotFound(key.to_string()));
        }
        let entry = StoredEntry {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            value,
        };
        for class in classes {
            tables
                .entry(class.to_string())
                .or_default()
                .insert(key.to_string(), entry.clone());
        }
        Ok(())
    }

    async fn delete_item(&self, class_name: &str, key: &str, error_if_missing: bool) -> Result<bool> {
        let mut tables = self.state.tables.write().await;
        let entry = tables.get(class_name).and_then(|table| table.get(key)).cloned();
        match entry {
            None if error_if_missing => Err(RepoError::NotFound(key.to_string())),
            None => Ok(false),
            Some(entry) => {
                for class in &entry.classes {
                    if let Some(table) = tables.get_mut(class.as_str()) {
                        table.remove(key);
                    }
                }
                Ok(true)
            }
        }
    }

    async fn find_items(&self, class_name: &str, options: &FindOptions) -> Result<Vec<StoreRecord>> {
        let tables = self.state.tables.read().await;
        let Some(table) = tables.get(class_name) else {
            return Ok(Vec::new());
        };
        Ok(apply_find_options(filtered_records(table, options), options))
    }

    async fn count_items(&self, class_name: &str, options: &FindOptions) -> Result<u64> {
        let tables = self.state.tables.read().await;
        let Some(table) = tables.get(class_name) else {
            return Ok(0);
        };
        Ok(filtered_records(table, options).len() as u64)
    }

    async fn begin_transaction(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(TransactionalStore {
            state: self.state.clone(),
            staged_tables: Mutex::new(HashMap::new()),
            staged_record: Mutex::new(None),
        }))
    }

    async fn commit_transaction(&self) -> Result<()> {
        Ok(())
    }

    async fn abort_transaction(&self) -> Result<()> {
        Ok(())
    }
}

/// Transactional handle returned by `MemoryObjectStore::begin_transaction`.
/// Writes are staged in-memory and applied to the shared state atomically on
/// commit; on abort the staged buffer is simply dropped, so nothing written
/// through the handle is ever observable outside the transaction (§8
/// invariant 9).
struct TransactionalStore {
    state: Arc<MemoryState>,
    staged_tables: Mutex<HashMap<String, BTreeMap<String, Option<StoredEntry>>>>,
    staged_record: Mutex<Option<Option<Value>>>,
}

impl TransactionalStore {
    /// Merges the base table for `class_name` with this transaction's staged
    /// overlay: staged inserts take precedence, staged deletes (`None`)
    /// remove the base entry.
    async fn merged_table(&self, class_name: &str) -> Table {
        let mut merged = self
            .state
            .tables
            .read()
            .await
            .get(class_name)
            .cloned()
            .unwrap_or_default();
        if let Some(overlay) = self.staged_tables.lock().await.get(class_name) {
            for (key, staged) in overlay {
                match staged {
                    Some(entry) => {
                        merged.insert(key.clone(), entry.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }
        merged
    }
}

#[async_trait]
impl ObjectStore for TransactionalStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.state.tables.write().await.clear();
        *self.state.record.write().await = None;
        Ok(())
    }

    async fn lock_database(&self) -> Result<()> {
        let guard = self.state.lock.clone().lock_owned().await;
        *self.state.held_guard.lock().await = Some(guard);
        Ok(())
    }

    async fn unlock_database(&self) -> Result<()> {
        *self.state.held_guard.lock().await = None;
        Ok(())
    }

    async fn get_record(&self, error_if_missing: bool) -> Result<Option<Value>> {
        if let Some(staged) = &*self.staged_record.lock().await {
            return match staged {
                Some(value) => Ok(Some(value.clone())),
                None if error_if_missing => Err(RepoError::NotFound("$Repository".into())),
                None => Ok(None),
            };
        }
        match &*self.state.record.read().await {
            Some(value) => Ok(Some(value.clone())),
            None if error_if_missing => Err(RepoError::NotFound("$Repository".into())),
            None => Ok(None),
        }
    }

    async fn put_record(&self, value: &Value, error_if_exists: bool, create_if_missing: bool) -> Result<()> {
        let exists = match &*self.staged_record.lock().await {
            Some(staged) => staged.is_some(),
            None => self.state.record.read().await.is_some(),
        };
        if exists && error_if_exists {
            return Err(RepoError::AlreadyExists("$Repository".into()));
        }
        if !exists && !create_if_missing {
            return Err(RepoError::NotFound("$Repository".into()));
        }
        *self.staged_record.lock().await = Some(Some(value.clone()));
        Ok(())
    }

    async fn get_item(&self, class_name: &str, key: &str, error_if_missing: bool) -> Result<Option<StoreRecord>> {
        let merged = self.merged_table(class_name).await;
        match merged.get(key) {
            Some(entry) => Ok(Some(StoreRecord {
                classes: entry.classes.clone(),
                key: key.to_string(),
                value: entry.value.clone(),
            })),
            None if error_if_missing => Err(RepoError::NotFound(key.to_string())),
            None => Ok(None),
        }
    }

    async fn get_items(&self, class_name: &str, keys: &[String]) -> Result<Vec<StoreRecord>> {
        let merged = self.merged_table(class_name).await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                merged.get(key).map(|entry| StoreRecord {
                    classes: entry.classes.clone(),
                    key: key.clone(),
                    value: entry.value.clone(),
                })
            })
            .collect())
    }

    async fn put_item(
        &self,
        classes: &'static [&'static str],
        key: &str,
        value: Value,
        error_if_exists: bool,
        create_if_missing: bool,
    ) -> Result<()> {
        let primary = classes[0];
        let exists = self.merged_table(primary).await.contains_key(key);
        if exists && error_if_exists {
            return Err(RepoError::AlreadyExists(key.to_string()));
        }
        if !exists && !create_if_missing {
            return Err(RepoError::NotFound(key.to_string()));
        }
        let entry = StoredEntry {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            value,
        };
        let mut staged = self.staged_tables.lock().await;
        for class in classes {
            staged
                .entry(class.to_string())
                .or_default()
                .insert(key.to_string(), Some(entry.clone()));
        }
        Ok(())
    }

    async fn delete_item(&self, class_name: &str, key: &str, error_if_missing: bool) -> Result<bool> {
        let merged = self.merged_table(class_name).await;
        match merged.get(key) {
            None if error_if_missing => Err(RepoError::NotFound(key.to_string())),
            None => Ok(false),
            Some(entry) => {
                let mut staged = self.staged_tables.lock().await;
                for class in &entry.classes {
                    staged.entry(class.clone()).or_default().insert(key.to_string(), None);
                }
                Ok(true)
            }
        }
    }

    async fn find_items(&self, class_name: &str, options: &FindOptions) -> Result<Vec<StoreRecord>> {
        let merged = self.merged_table(class_name).await;
        Ok(apply_find_options(filtered_records(&merged, options), options))
    }

    async fn count_items(&self, class_name: &str, options: &FindOptions) -> Result<u64> {
        let merged = self.merged_table(class_name).await;
        Ok(filtered_records(&merged, options).len() as u64)
    }

    async fn begin_transaction(&self) -> Result<Arc<dyn ObjectStore>> {
        Err(RepoError::StoreError(
            "nested transactions are flattened at the repository layer".into(),
        ))
    }

    async fn commit_transaction(&self) -> Result<()> {
        let staged_tables = std::mem::take(&mut *self.staged_tables.lock().await);
        {
            let mut tables = self.state.tables.write().await;
            for (class, overlay) in staged_tables {
                let table = tables.entry(class).or_default();
                for (key, staged) in overlay {
                    match staged {
                        Some(entry) => {
                            table.insert(key, entry);
                        }
                        None => {
                            table.remove(&key);
                        }
                    }
                }
            }
        }
        if let Some(staged_record) = self.staged_record.lock().await.take() {
            *self.state.record.write().await = staged_record;
        }
        Ok(())
    }

    async fn abort_transaction(&self) -> Result<()> {
        self.staged_tables.lock().await.clear();
        *self.staged_record.lock().await = None;
        Ok(())
    }
}
