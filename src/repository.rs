use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::sleep;

use crate::class::{ClassRegistry, ClassRegistryBuilder, CollectionClass};
use crate::collection::Collection;
use crate::config::RepoConfig;
use crate::error::{RepoError, Result};
use crate::events::{EventBus, RepoEvent};
use crate::idgen;
use crate::record::{RepositoryRecord, VERSION};
use crate::store::{MemoryObjectStore, ObjectStore};

const REPOSITORY_ID_LEN: usize = 16;

/// Internal, mutex-guarded bookkeeping shared by every clone of a given root
/// `RepositoryHandle` (never by a transactional view of it — a view borrows
/// the same `Arc<Mutex<LifecycleState>>`, so lifecycle state is visible
/// consistently inside and outside a transaction).
///
/// `init_cell` is the one-shot barrier guarding `initialize()` (§4.C, §5
/// "Initialisation race"): the first caller to reach
/// `OnceCell::get_or_try_init` runs the real initialization work, and every
/// concurrent caller racing it awaits that same in-flight call and receives
/// its result — success or failure — instead of being told to retry or
/// rejected outright. `destroy_repository` swaps in a fresh, unset cell so a
/// later `initialize()` runs for real again.
#[derive(Debug, Default)]
struct LifecycleState {
    init_cell: Arc<OnceCell<()>>,
    repository_id: Option<String>,
}

/// Entry point: registers collections and builds a `RepositoryHandle`.
pub struct RepositoryBuilder {
    config: RepoConfig,
    registry: ClassRegistryBuilder,
    store: Option<Arc<dyn ObjectStore>>,
}

impl RepositoryBuilder {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            config: RepoConfig::new(name, url),
            registry: ClassRegistry::builder(),
            store: None,
        }
    }

    pub fn register<C: CollectionClass>(mut self) -> Self {
        self.registry = self.registry.register::<C>();
        self
    }

    /// Overrides the default `MemoryObjectStore` with a caller-supplied
    /// object store implementation.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: RepoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RepositoryHandle {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryObjectStore::new()));
        RepositoryHandle {
            name: self.config.name.clone().into(),
            config: Arc::new(self.config),
            registry: Arc::new(self.registry.build()),
            events: EventBus::new(),
            state: Arc::new(Mutex::new(LifecycleState::default())),
            store,
            is_view: false,
        }
    }
}

/// Entry point matching the teacher's `Persist`/`ManagedPersist` naming: a
/// thin namespace over `RepositoryBuilder`.
pub struct Repository;

impl Repository {
    pub fn builder(name: impl Into<String>, url: impl Into<String>) -> RepositoryBuilder {
        RepositoryBuilder::new(name, url)
    }
}

/// A handle onto one repository. Cheaply `Clone`-able — every field is an
/// `Arc`, an `Arc<str>`, or a `bool` — because `transaction()` hands the
/// caller's body a *view* of the same repository rebound to a transactional
/// store, and that view needs to be passed around (captured by async
/// closures, stored, returned) exactly like a root handle.
///
/// `is_inside_transaction` is **not** identity- or pointer-based: it reads
/// the explicit `is_view` flag set once when a view is constructed inside
/// `transaction()` and never reset by cloning. Two clones of a view are both
/// still views; a clone of the root is still the root.
#[derive(Clone)]
pub struct RepositoryHandle {
    name: Arc<str>,
    config: Arc<RepoConfig>,
    registry: Arc<ClassRegistry>,
    events: EventBus,
    state: Arc<Mutex<LifecycleState>>,
    store: Arc<dyn ObjectStore>,
    is_view: bool,
}

impl RepositoryHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub(crate) fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_inside_transaction(&self) -> bool {
        self.is_view
    }

    pub fn collection<C: CollectionClass>(&self) -> Collection<C> {
        Collection::new(self.clone())
    }

    /// Number of classes registered on this repository.
    pub fn class_count(&self) -> usize {
        self.registry.len()
    }

    /// Ensures the backing store exists and the `$Repository` singleton
    /// record is present, creating and, if necessary, upgrading it.
    ///
    /// Calling this from inside a transaction is a programmer error the
    /// spec calls out explicitly: a transaction that tries to initialize a
    /// repository would need to observe its own uncommitted writes to decide
    /// whether the record exists, which no object store here promises.
    ///
    /// Idempotent and safe to call concurrently: every caller racing to
    /// initialize the same repository shares the same in-flight attempt
    /// through `LifecycleState::init_cell` and observes its outcome, rather
    /// than one winning and the rest failing (§4.C, §5, §8 invariant 7).
    pub async fn initialize(&self) -> Result<()> {
        if self.is_view {
            return Err(RepoError::InitInsideTransaction);
        }
        self.ensure_initialized().await
    }

    /// Lazy-initialization entry point used internally by `Collection`
    /// operations and by `transaction()` (§2's data flow, §3's "object
    /// database structure is created lazily on first operation"). Unlike the
    /// public `initialize()`, a call made from inside a view that is already
    /// backed by a fully initialized repository succeeds silently instead of
    /// being rejected — by the time a transactional view exists, the root it
    /// was opened from has always already completed `ensure_initialized`
    /// itself, so the only way this can still observe an uninitialized
    /// repository from inside a view is a repository that was never
    /// initialized at all, which genuinely cannot be bootstrapped from
    /// inside a transaction (§4.C step 3).
    pub(crate) async fn ensure_initialized(&self) -> Result<()> {
        let cell = {
            let state = self.state.lock().await;
            if state.init_cell.initialized() {
                return Ok(());
            }
            state.init_cell.clone()
        };
        if self.is_view {
            return Err(RepoError::InitInsideTransaction);
        }
        cell.get_or_try_init(|| self.initialize_inner()).await?;
        Ok(())
    }

    async fn initialize_inner(&self) -> Result<()> {
        self.store.initialize().await?;
        let record = self.create_repository_if_missing().await?;
        {
            let mut state = self.state.lock().await;
            state.repository_id = Some(record.id.clone());
        }
        info!(target: "objrepo", "repository '{}' initialized (id={})", self.name, record.id);
        self.events.publish(RepoEvent::DidInitialize);
        Ok(())
    }

    async fn create_repository_if_missing(&self) -> Result<RepositoryRecord> {
        match self.store.get_record(false).await? {
            None => {
                let record = RepositoryRecord {
                    name: self.name.to_string(),
                    version: VERSION,
                    id: idgen::generate_id(REPOSITORY_ID_LEN),
                };
                let value = serde_json::to_value(&record)?;
                match self.store.put_record(&value, true, true).await {
                    Ok(()) => {
                        debug!(target: "objrepo", "created $Repository record id={}", record.id);
                        self.events.publish(RepoEvent::DidCreate);
                        Ok(record)
                    }
                    Err(RepoError::AlreadyExists(_)) => self.read_existing_record().await,
                    Err(err) => Err(err),
                }
            }
            Some(_) => self.read_existing_record().await,
        }
    }

    async fn read_existing_record(&self) -> Result<RepositoryRecord> {
        let value = self
            .store
            .get_record(true)
            .await?
            .expect("get_record(true) never returns Ok(None)");
        let mut record: RepositoryRecord = serde_json::from_value(value)?;
        if record.version > VERSION {
            return Err(RepoError::CannotDowngrade {
                found: record.version,
                supported: VERSION,
            });
        }
        if record.version < VERSION {
            record = self.upgrade_repository(record).await?;
        }
        Ok(record)
    }

    async fn upgrade_repository(&self, mut record: RepositoryRecord) -> Result<RepositoryRecord> {
        self.lock_database_with_retry().await?;
        let upgrade_result = async {
            // Re-read under the lock in case another initializer upgraded
            // concurrently while we were waiting for it.
            let value = self.store.get_record(true).await?.expect("checked above");
            let mut current: RepositoryRecord = serde_json::from_value(value)?;
            if current.version >= VERSION {
                return Ok(current);
            }
            let from = current.version;
            self.events.publish(RepoEvent::UpgradeDidStart { from, to: VERSION });
            match from {
                v if v < 2 => {
                    // No migrations exist yet; reserved for a future
                    // version-2 step.
                }
                _ => {}
            }
            current.version = VERSION;
            let value = serde_json::to_value(&current)?;
            self.store.put_record(&value, false, false).await?;
            self.events.publish(RepoEvent::UpgradeDidStop { from, to: VERSION });
            info!(target: "objrepo", "upgraded repository record from version {from} to {VERSION}");
            Ok(current)
        }
        .await;
        self.store.unlock_database().await?;
        record = upgrade_result?;
        Ok(record)
    }

    async fn lock_database_with_retry(&self) -> Result<()> {
        loop {
            match self.store.lock_database().await {
                Ok(()) => return Ok(()),
                Err(_) => sleep(self.config.lock_poll).await,
            }
        }
    }

    pub async fn get_repository_id(&self) -> Result<String> {
        if let Some(id) = self.state.lock().await.repository_id.clone() {
            return Ok(id);
        }
        let value = self.store.get_record(true).await?.expect("checked above");
        let record: RepositoryRecord = serde_json::from_value(value)?;
        self.state.lock().await.repository_id = Some(record.id.clone());
        Ok(record.id)
    }

    /// Tears down the repository's backing store entirely. The caller is
    /// responsible for ensuring no other task is using this repository
    /// concurrently (§5 Non-goals: no internal coordination beyond a single
    /// in-process lock is provided for this).
    pub async fn destroy_repository(&self) -> Result<()> {
        if !self.state.lock().await.init_cell.initialized() {
            return Err(RepoError::StoreError(
                "destroy_repository() called before initialize() ever completed".into(),
            ));
        }
        self.events.publish(RepoEvent::WillDestroy);
        warn!(target: "objrepo", "destroying repository '{}'", self.name);
        self.store.destroy().await?;
        let mut state = self.state.lock().await;
        state.init_cell = Arc::new(OnceCell::new());
        state.repository_id = None;
        drop(state);
        self.events.publish(RepoEvent::DidDestroy);
        Ok(())
    }

    /// Runs `body` against a transactional view of this repository. Nesting
    /// is flat: calling `transaction()` again from inside an already-open
    /// transaction simply reuses the current view instead of opening a
    /// second, nested transaction the store has no way to represent (§4.C).
    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(RepositoryHandle) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.is_view {
            return body(self.clone()).await;
        }

        self.ensure_initialized().await?;
        let tx_store = self.store.begin_transaction().await?;
        let view = RepositoryHandle {
            name: self.name.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
            store: tx_store,
            is_view: true,
        };

        match body(view.clone()).await {
            Ok(value) => {
                view.store.commit_transaction().await?;
                Ok(value)
            }
            Err(err) => {
                view.store.abort_transaction().await?;
                Err(err)
            }
        }
    }
}
