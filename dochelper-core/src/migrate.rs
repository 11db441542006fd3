//! Declarative migration tasks and the runner that applies them.
//!
//! A migration is a set of named [`Task`]s. Each task targets one collection and is one of:
//!
//! - [`Task::CreateIndex`] - make sure a named index exists
//! - [`Task::SeedTable`] - reconcile a list of records into a collection
//! - [`Task::Other`] - a task whose kind this runner does not know; running it is an error
//!
//! [`Migrator::run`] applies every task, collecting failures instead of stopping at the first one.
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use dochelper::index::IndexKeys;
//! use dochelper::migrate::{CreateIndexTask, Migrator, Task};
//!
//! let mut tasks = HashMap::new();
//! tasks.insert(
//!     "countries code index".to_string(),
//!     CreateIndexTask::new("countries", "code_1", IndexKeys::new().asc("code")).into(),
//! );
//! tasks.insert("countries".to_string(), Task::seed(countries_task));
//!
//! Migrator::new(&helper).run(&tasks).await?;
//! ```

use std::{collections::HashMap, fmt};
use tracing::{info, warn};

use crate::{
    error::{ErrorList, StoreError, StoreResult},
    helper::StoreHelper,
    index::IndexKeys,
    model::Model,
    seed::{SeedTableTask, SeedTask},
};

/// The kind of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    CreateIndex,
    SeedTable,
    Other,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::CreateIndex => "CreateIndexTask",
            TaskKind::SeedTable => "SeedTableTask",
            TaskKind::Other => "Task",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ensures a named index exists on a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexTask {
    collection: String,
    name: String,
    keys: IndexKeys,
    unique: bool,
}

impl CreateIndexTask {
    pub fn new(collection: impl Into<String>, name: impl Into<String>, keys: IndexKeys) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            keys,
            unique: false,
        }
    }

    /// Same as [`CreateIndexTask::new`], but a newly created index enforces uniqueness.
    pub fn unique(collection: impl Into<String>, name: impl Into<String>, keys: IndexKeys) -> Self {
        Self {
            unique: true,
            ..Self::new(collection, name, keys)
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &IndexKeys {
        &self.keys
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// A task declared with a kind the runner cannot dispatch, such as one loaded from configuration
/// under an unrecognised type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherTask {
    collection: String,
    kind: String,
}

impl OtherTask {
    pub fn new(collection: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            kind: kind.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// A single unit of a migration.
#[derive(Debug)]
pub enum Task {
    CreateIndex(CreateIndexTask),
    SeedTable(Box<dyn SeedTask>),
    Other(OtherTask),
}

impl Task {
    /// Wraps a seed task over any model type.
    pub fn seed<M: Model>(task: SeedTableTask<M>) -> Self {
        Task::SeedTable(Box::new(task))
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::CreateIndex(_) => TaskKind::CreateIndex,
            Task::SeedTable(_) => TaskKind::SeedTable,
            Task::Other(_) => TaskKind::Other,
        }
    }

    /// The collection this task targets.
    pub fn collection(&self) -> &str {
        match self {
            Task::CreateIndex(task) => task.collection(),
            Task::SeedTable(task) => task.collection(),
            Task::Other(task) => task.collection(),
        }
    }
}

impl From<CreateIndexTask> for Task {
    fn from(task: CreateIndexTask) -> Self {
        Task::CreateIndex(task)
    }
}

impl<M: Model> From<SeedTableTask<M>> for Task {
    fn from(task: SeedTableTask<M>) -> Self {
        Task::seed(task)
    }
}

impl From<OtherTask> for Task {
    fn from(task: OtherTask) -> Self {
        Task::Other(task)
    }
}

/// Applies migration tasks through a [`StoreHelper`].
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'a> {
    helper: &'a StoreHelper,
}

impl<'a> Migrator<'a> {
    pub fn new(helper: &'a StoreHelper) -> Self {
        Self { helper }
    }

    /// Runs every task in `tasks`, in map iteration order.
    ///
    /// Tasks are independent: a failing task does not stop the others. The order tasks run in
    /// is unspecified, so tasks that depend on each other should go through
    /// [`Migrator::run_ordered`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Multiple`] holding one entry per failure. Each entry is a
    /// [`StoreError::Task`] naming the task, except unknown task kinds which are reported as
    /// [`StoreError::UnknownTaskKind`]. A seed task that fails for several records contributes
    /// one entry per record.
    pub async fn run(&self, tasks: &HashMap<String, Task>) -> StoreResult<()> {
        self.run_ordered(tasks.iter().map(|(name, task)| (name.as_str(), task)))
            .await
    }

    /// Runs tasks in the order given.
    ///
    /// Failure handling matches [`Migrator::run`]. Once the helper's token is cancelled no further
    /// task is started and a single [`StoreError::Cancelled`] entry is recorded, either the one
    /// raised inside the interrupted task or one for the run itself.
    pub async fn run_ordered<'t, I>(&self, tasks: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (&'t str, &'t Task)>,
    {
        let mut errors = ErrorList::new();
        let mut completed = 0_usize;

        for (name, task) in tasks {
            if self.helper.is_cancelled() {
                errors.push(StoreError::Cancelled("run migrations".to_string()));
                break;
            }

            let failed_before = errors.len();
            match self.run_task(name, task).await {
                Ok(()) => {
                    completed += 1;
                    info!(
                        task = name,
                        kind = %task.kind(),
                        collection = task.collection(),
                        "ran migration task"
                    );
                }
                Err(err @ StoreError::UnknownTaskKind { .. }) => {
                    warn!(task = name, error = %err, "skipped migration task");
                    errors.push(err);
                }
                Err(StoreError::Multiple(causes)) => {
                    warn!(task = name, failures = causes.len(), "migration task failed");
                    for cause in causes {
                        errors.push(task_error(name, cause));
                    }
                }
                Err(err) => {
                    warn!(task = name, error = %err, "migration task failed");
                    errors.push(task_error(name, err));
                }
            }

            // a cancellation inside the task is the only cause recorded for it
            if errors.iter().skip(failed_before).any(StoreError::is_cancelled) {
                break;
            }
        }

        info!(completed, failed = errors.len(), "migrations finished");

        errors.into_store_result()
    }

    async fn run_task(&self, name: &str, task: &Task) -> StoreResult<()> {
        match task {
            Task::CreateIndex(index) if index.unique => {
                self.helper
                    .ensure_unique_index(&index.collection, index.keys.clone(), &index.name)
                    .await
            }
            Task::CreateIndex(index) => {
                self.helper
                    .ensure_index(&index.collection, index.keys.clone(), &index.name)
                    .await
            }
            Task::SeedTable(seed) => seed.seed(self.helper).await,
            Task::Other(other) => Err(StoreError::UnknownTaskKind {
                task: name.to_string(),
                kind: other.kind.clone(),
            }),
        }
    }
}

fn task_error(task: &str, source: StoreError) -> StoreError {
    StoreError::Task {
        task: task.to_string(),
        source: Box::new(source),
    }
}

impl StoreHelper {
    /// Returns a [`Migrator`] running against this helper.
    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        let index: Task = CreateIndexTask::new("test", "num_1", IndexKeys::new().asc("num")).into();
        let other: Task = OtherTask::new("test", "DropTableTask").into();

        assert_eq!(index.kind(), TaskKind::CreateIndex);
        assert_eq!(other.kind(), TaskKind::Other);
        assert_eq!(other.collection(), "test");
    }

    #[test]
    fn unique_index_task() {
        let task = CreateIndexTask::unique("test", "str_1", IndexKeys::new().asc("str"));

        assert!(task.is_unique());
        assert_eq!(task.name(), "str_1");
        assert_eq!(task.keys().fields().collect::<Vec<_>>(), vec!["str"]);
    }
}
