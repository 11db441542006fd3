//! Convenient re-exports of commonly used types from dochelper.
//!
//! ```ignore
//! use dochelper::prelude::*;
//! ```

pub use dochelper_core::{
    CancellationToken,
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{ErrorList, StoreError, StoreResult},
    helper::StoreHelper,
    index::{IndexDescriptor, IndexKeys, IndexModel},
    migrate::{CreateIndexTask, Migrator, OtherTask, Task, TaskKind},
    model::{Identity, Model, ModelExt},
    page::{FindOptions, Pagination, PaginationResult},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, Sort, SortDirection},
    seed::{SeedTableTask, SeedTask, Seeder},
};
pub use dochelper_macros::Model;
