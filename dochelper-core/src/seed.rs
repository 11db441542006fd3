//! Declarative seeding of collections.
//!
//! A [`SeedTableTask`] lists the records a collection should contain. [`Seeder::seed_data`]
//! reconciles each record against the collection: it asks the task's find filter how to locate
//! the stored counterpart, then replaces the match or inserts a new document.
//!
//! Failures are per item. A record whose filter, lookup or write fails is recorded and the batch
//! moves on; the collected failures come back as a single [`StoreError::Multiple`].
//!
//! # Example
//!
//! ```ignore
//! use dochelper::query::Filter;
//! use dochelper::seed::SeedTableTask;
//!
//! let task = SeedTableTask::builder("countries")
//!     .items(vec![Country::new("GB"), Country::new("FR")])
//!     .find_filter(|c: &Country| Ok(Some(Filter::eq("code", c.code.clone()))))
//!     .on_seeded(|c| println!("seeded {:?}", c.id))
//!     .model(Country::default())
//!     .build();
//!
//! helper.seeder().seed_data(&task).await?;
//! ```

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info, warn};

use crate::{
    collection::Collection,
    error::{ErrorList, StoreError, StoreResult},
    helper::StoreHelper,
    model::{Identity, Model},
    query::Expr,
};

/// Maps a record to the filter that locates its stored counterpart.
///
/// Returning `Ok(None)` means the record cannot be matched and is always inserted.
pub type FindFilterFn<M> = Box<dyn Fn(&M) -> StoreResult<Option<Expr>> + Send + Sync>;

/// Called with each record after it was written, identity included.
pub type SeededFn<M> = Box<dyn Fn(&M) + Send + Sync>;

/// The desired contents of one collection.
pub struct SeedTableTask<M: Model> {
    collection: String,
    items: Vec<M>,
    find_filter: Option<FindFilterFn<M>>,
    on_seeded: Option<SeededFn<M>>,
    model: Option<M>,
}

impl<M: Model> SeedTableTask<M> {
    pub fn builder(collection: impl Into<String>) -> SeedTableTaskBuilder<M> {
        SeedTableTaskBuilder {
            task: SeedTableTask {
                collection: collection.into(),
                items: Vec::new(),
                find_filter: None,
                on_seeded: None,
                model: None,
            },
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn items(&self) -> &[M] {
        &self.items
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }
}

impl<M: Model + fmt::Debug> fmt::Debug for SeedTableTask<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedTableTask")
            .field("collection", &self.collection)
            .field("items", &self.items)
            .field("find_filter", &self.find_filter.is_some())
            .field("on_seeded", &self.on_seeded.is_some())
            .field("model", &self.model)
            .finish()
    }
}

/// Builder for [`SeedTableTask`].
///
/// Nothing is validated here; an incomplete task is rejected when it is seeded.
pub struct SeedTableTaskBuilder<M: Model> {
    task: SeedTableTask<M>,
}

impl<M: Model> SeedTableTaskBuilder<M> {
    /// Appends a single record.
    pub fn item(mut self, item: M) -> Self {
        self.task.items.push(item);
        self
    }

    /// Appends records, keeping their order.
    pub fn items(mut self, items: impl IntoIterator<Item = M>) -> Self {
        self.task.items.extend(items);
        self
    }

    pub fn find_filter<F>(mut self, find_filter: F) -> Self
    where
        F: Fn(&M) -> StoreResult<Option<Expr>> + Send + Sync + 'static,
    {
        self.task.find_filter = Some(Box::new(find_filter));
        self
    }

    pub fn on_seeded<F>(mut self, on_seeded: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.task.on_seeded = Some(Box::new(on_seeded));
        self
    }

    /// Sets the prototype found documents are decoded into.
    pub fn model(mut self, model: M) -> Self {
        self.task.model = Some(model);
        self
    }

    pub fn build(self) -> SeedTableTask<M> {
        self.task
    }
}

/// A seed task with its record type erased, so tasks over different models can share a list.
#[async_trait]
pub trait SeedTask: Send + Sync {
    /// Target collection.
    fn collection(&self) -> &str;

    /// Number of records the task wants present.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn seed(&self, helper: &StoreHelper) -> StoreResult<()>;
}

#[async_trait]
impl<M: Model> SeedTask for SeedTableTask<M> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    async fn seed(&self, helper: &StoreHelper) -> StoreResult<()> {
        helper.seeder().seed_data(self).await
    }
}

impl fmt::Debug for dyn SeedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedTask")
            .field("collection", &self.collection())
            .field("items", &self.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seeded {
    Inserted,
    Updated,
}

/// Runs seed tasks against a [`StoreHelper`].
#[derive(Debug, Clone, Copy)]
pub struct Seeder<'a> {
    helper: &'a StoreHelper,
}

impl<'a> Seeder<'a> {
    pub fn new(helper: &'a StoreHelper) -> Self {
        Self { helper }
    }

    /// Reconciles every record of `task` against its collection.
    ///
    /// Records are processed in order, one at a time. For each record the find filter is
    /// evaluated and, if it yields a filter, the first match is decoded into a copy of the
    /// model prototype. A match carrying an identity is replaced by the record (keeping the
    /// stored identity); otherwise the record is inserted, receiving a fresh identity first when
    /// its identity kind is store-generated. The seeded callback sees the written record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoCollection`], [`StoreError::NoFindFilterFn`] or [`StoreError::NoModel`]
    ///   if the task is incomplete; nothing is written in that case.
    /// - [`StoreError::Multiple`] with one entry per failed record. A cancelled token records
    ///   [`StoreError::Cancelled`] and skips the remaining records.
    ///
    /// A `None` task is a no-op.
    pub async fn seed_data<'t, M: Model>(
        &self,
        task: impl Into<Option<&'t SeedTableTask<M>>>,
    ) -> StoreResult<()> {
        let Some(task) = task.into() else {
            return Ok(());
        };

        if task.collection.is_empty() {
            return Err(StoreError::NoCollection);
        }
        let Some(find_filter) = task.find_filter.as_ref() else {
            return Err(StoreError::NoFindFilterFn);
        };
        let Some(model) = task.model.as_ref() else {
            return Err(StoreError::NoModel);
        };

        let collection = self.helper.collection(&task.collection);
        let mut errors = ErrorList::new();
        let (mut inserted, mut updated) = (0_usize, 0_usize);

        for (position, item) in task.items.iter().enumerate() {
            if self.helper.is_cancelled() {
                errors.push(StoreError::Cancelled("seed data".to_string()));
                break;
            }

            match seed_item(&collection, find_filter, model, item).await {
                Ok((seeded, outcome)) => {
                    debug!(collection = %task.collection, position, ?outcome, "seeded item");
                    match outcome {
                        Seeded::Inserted => inserted += 1,
                        Seeded::Updated => updated += 1,
                    }
                    if let Some(on_seeded) = &task.on_seeded {
                        on_seeded(&seeded);
                    }
                }
                Err(err) => {
                    warn!(
                        collection = %task.collection,
                        position,
                        error = %err,
                        "failed to seed item"
                    );
                    let cancelled = err.is_cancelled();
                    errors.push(err);
                    if cancelled {
                        break;
                    }
                }
            }
        }

        info!(
            collection = %task.collection,
            inserted,
            updated,
            failed = errors.len(),
            "seeded collection"
        );

        errors.into_store_result()
    }
}

async fn seed_item<M: Model>(
    collection: &Collection<'_>,
    find_filter: &FindFilterFn<M>,
    model: &M,
    item: &M,
) -> StoreResult<(M, Seeded)> {
    let mut item = item.clone();
    let mut existing = model.clone();

    let filter = find_filter(&item)?;
    let found = match &filter {
        Some(filter) => collection.find_one(filter, &mut existing).await?,
        None => false,
    };

    let stored_id = if found && existing.exists() {
        existing.id()
    } else {
        None
    };

    match (filter, stored_id) {
        (Some(filter), Some(id)) => {
            item.set_id(id);
            collection.update_one(&filter, &item).await?;
            Ok((item, Seeded::Updated))
        }
        _ => {
            if let Some(id) = M::Id::generate() {
                item.set_id(id);
            }
            collection.insert_one(&item).await?;
            Ok((item, Seeded::Inserted))
        }
    }
}

impl StoreHelper {
    /// Returns a [`Seeder`] running against this helper.
    pub fn seeder(&self) -> Seeder<'_> {
        Seeder::new(self)
    }
}
