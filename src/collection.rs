use std::future::Future;
use std::marker::PhantomData;

use crate::class::CollectionClass;
use crate::error::{RepoError, Result};
use crate::events::RepoEvent;
use crate::item::Item;
use crate::options::{DeleteOptions, FindOptions, GetOptions, PutOptions};
use crate::repository::RepositoryHandle;
use crate::store::StoreRecord;

/// A typed view onto one registered class, and the home of every
/// per-item operation the repository exposes (§4.D).
///
/// Reads that may cross into derived classes — `get_item`, `get_items`,
/// `find_items`, `for_each_items`, `find_and_delete_items` — return
/// `Box<dyn Item>` rather than `C::Item`, because the record found under
/// `C::NAME` may in truth belong to a more specific class (§3). Callers that
/// need the concrete type back use [`crate::item::downcast_ref`].
pub struct Collection<C: CollectionClass> {
    repo: RepositoryHandle,
    _marker: PhantomData<fn() -> C>,
}

impl<C: CollectionClass> Collection<C> {
    pub(crate) fn new(repo: RepositoryHandle) -> Self {
        Self {
            repo,
            _marker: PhantomData,
        }
    }

    fn ensure_registered(&self) -> Result<()> {
        if self.repo.registry().is_registered(C::NAME) {
            Ok(())
        } else {
            Err(RepoError::UnknownClass(C::NAME.to_string()))
        }
    }

    fn materialize(&self, record: &StoreRecord) -> Result<Box<dyn Item>> {
        let most_derived = record.classes.first().map(String::as_str).unwrap_or(C::NAME);
        self.repo.registry().materialize(most_derived, &record.key, &record.value)
    }

    pub async fn get_item(&self, key: &str, options: GetOptions) -> Result<Option<Box<dyn Item>>> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        match self
            .repo
            .store()
            .get_item(C::NAME, key, options.error_if_missing)
            .await?
        {
            Some(record) => Ok(Some(self.materialize(&record)?)),
            None => Ok(None),
        }
    }

    /// Refreshes `item` in place from the store, following the spec's
    /// `getItem(item, options)` same-class fast path (§4.E.4): rather than
    /// discarding `item` and materializing a fresh one, the record's value
    /// is folded into it via `Item::replace_value`. Returns `false` (`item`
    /// left untouched) when the key is absent and `options.error_if_missing`
    /// is `false`.
    ///
    /// Because `item` is statically typed as `C::Item`, this only ever
    /// covers the same-class path — there's no way to refresh it in place
    /// with a value materialized at a more-derived class. Querying through a
    /// base collection for an item that may actually be of a derived class
    /// is what `get_item` (returning `Box<dyn Item>` via `ClassRegistry`)
    /// is for; use that instead when the stored class isn't known to be
    /// `C::NAME` up front.
    pub async fn refresh_item(&self, item: &mut C::Item, options: GetOptions) -> Result<bool> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let key = item.primary_key().to_string();
        match self
            .repo
            .store()
            .get_item(C::NAME, &key, options.error_if_missing)
            .await?
        {
            Some(record) => {
                item.replace_value(&record.value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn get_items(&self, keys: &[String]) -> Result<Vec<Box<dyn Item>>> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let records = self.repo.store().get_items(C::NAME, keys).await?;
        self.materialize_with_respiration(&records).await
    }

    /// Writes `item`. Inserts if `item.is_new()`, requiring the key be
    /// unused; otherwise requires the key already exist, and honors
    /// `options.error_if_exists` for that update path. On success, marks
    /// `item` persisted and raises `DidPutItem`.
    ///
    /// A new item always writes with `error_if_exists` forced to `true`
    /// regardless of `options` — §4.E: "If `item.isNew` → force
    /// `errorIfExists = true` in a local clone of `options`."
    pub async fn put_item(&self, item: &mut C::Item, options: PutOptions) -> Result<()> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let classes = item.class_chain();
        let key = item.primary_key().to_string();
        let value = item.serialize();
        let is_new = item.is_new();
        let error_if_exists = if is_new { true } else { options.error_if_exists };
        self.repo
            .store()
            .put_item(classes, &key, value, error_if_exists, is_new)
            .await?;
        item.mark_persisted();
        self.repo.events().publish(RepoEvent::DidPutItem {
            class_name: item.class_name().to_string(),
            persist_id: key,
        });
        Ok(())
    }

    pub async fn delete_item(&self, key: &str, options: DeleteOptions) -> Result<bool> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let deleted = self
            .repo
            .store()
            .delete_item(C::NAME, key, options.error_if_missing)
            .await?;
        if deleted {
            self.repo.events().publish(RepoEvent::DidDeleteItem {
                class_name: C::NAME.to_string(),
                persist_id: key.to_string(),
            });
        }
        Ok(deleted)
    }

    pub async fn find_items(&self, options: &FindOptions) -> Result<Vec<Box<dyn Item>>> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let records = self.repo.store().find_items(C::NAME, options).await?;
        self.materialize_with_respiration(&records).await
    }

    /// Unserialises a batch of store records, yielding to the runtime every
    /// `respiration_rate` items so a large `getItems`/`findItems` call
    /// doesn't monopolise a single-threaded executor (§4.E, §8 invariant 10).
    async fn materialize_with_respiration(&self, records: &[StoreRecord]) -> Result<Vec<Box<dyn Item>>> {
        let rate = self.repo.config().respiration_rate;
        let mut items = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            items.push(self.materialize(record)?);
            if rate > 0 && (index + 1) % rate == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(items)
    }

    pub async fn count_items(&self, options: &FindOptions) -> Result<u64> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        self.repo.store().count_items(C::NAME, options).await
    }

    /// Total number of items in this collection, ignoring any query/range
    /// narrowing. Convenience wrapper over `count_items`.
    pub async fn len(&self) -> Result<u64> {
        self.count_items(&FindOptions::default()).await
    }

    /// Walks every item matching `options`, awaiting `f` for each one in
    /// order, yielding to the runtime every `respiration_rate` items so a
    /// large walk doesn't starve other tasks sharing this executor (§4.D).
    pub async fn for_each_items<F, Fut>(&self, options: &FindOptions, mut f: F) -> Result<()>
    where
        F: FnMut(Box<dyn Item>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let records = self.repo.store().find_items(C::NAME, options).await?;
        let rate = self.repo.config().respiration_rate;
        for (index, record) in records.iter().enumerate() {
            let item = self.materialize(record)?;
            f(item).await?;
            if rate > 0 && (index + 1) % rate == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    /// Finds every item matching `options` and deletes each one at its true,
    /// most-derived class, returning the number deleted. Respires the same
    /// way `for_each_items` does.
    pub async fn find_and_delete_items(&self, options: &FindOptions) -> Result<u64> {
        self.repo.ensure_initialized().await?;
        self.ensure_registered()?;
        let records = self.repo.store().find_items(C::NAME, options).await?;
        let rate = self.repo.config().respiration_rate;
        let mut deleted = 0u64;
        for (index, record) in records.iter().enumerate() {
            let class_name = record.classes.first().cloned().unwrap_or_else(|| C::NAME.to_string());
            if self
                .repo
                .store()
                .delete_item(&class_name, &record.key, false)
                .await?
            {
                deleted += 1;
                self.repo.events().publish(RepoEvent::DidDeleteItem {
                    class_name,
                    persist_id: record.key.clone(),
                });
            }
            if rate > 0 && (index + 1) % rate == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(deleted)
    }
}
