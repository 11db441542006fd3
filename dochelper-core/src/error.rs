//! Error types and result types for store helper operations.
//!
//! Every fallible operation in this crate returns [`StoreResult<T>`]. Batch operations (seeding and
//! migration runs) collect their failures into an [`ErrorList`] and report it through
//! [`StoreError::Multiple`].

use bson::error::Error as BsonError;
use std::{fmt, slice, vec};
use thiserror::Error;

/// Represents all possible errors that can occur when working with a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A seed or index task did not name a collection.
    #[error("you must specify the collection")]
    NoCollection,
    /// A seed task has no find filter function.
    #[error("you must specify a find filter function")]
    NoFindFilterFn,
    /// A seed task has no model prototype.
    #[error("you must specify a model")]
    NoModel,
    /// An update matched no documents.
    #[error("no matches found for query")]
    NoMatches,
    /// The backend acknowledged an insert without any identity.
    #[error("unexpected insert result")]
    UnexpectedInsertResult,
    /// A migration task has a kind the runner cannot dispatch.
    /// The first argument is the task name, the second is the kind.
    #[error("could not run migration task '{task}': unknown type '{kind}'")]
    UnknownTaskKind { task: String, kind: String },
    /// The operation was aborted through its cancellation token.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
    /// Serialization/deserialization error when converting between models and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given identity already exists in the collection.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DuplicateKey(String, String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A store operation failed; `op` names the facade operation.
    #[error("failed {op}: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: Box<StoreError>,
    },
    /// A migration task failed.
    #[error("migration task '{task}': {source}")]
    Task {
        task: String,
        #[source]
        source: Box<StoreError>,
    },
    /// Several independent failures collected during a batch.
    #[error("{0}")]
    Multiple(ErrorList),
}

impl StoreError {
    /// Wraps this error with the name of the operation that produced it.
    ///
    /// Cancellations are passed through untouched so callers can match on them directly.
    pub fn during(self, op: &'static str) -> Self {
        match self {
            StoreError::Cancelled(_) => self,
            other => StoreError::Operation {
                op,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping operation and task wrappers.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Operation { source, .. } | StoreError::Task { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), StoreError::Cancelled(_))
    }
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// An ordered collection of failures gathered while running a batch.
///
/// An empty list means the batch succeeded: [`ErrorList::into_result`] turns it into `Ok(())`
/// rather than an error wrapping zero causes.
///
/// # Example
///
/// ```ignore
/// let mut errors = ErrorList::new();
/// assert!(errors.into_result().is_ok());
///
/// let mut errors = ErrorList::new();
/// errors.push(StoreError::NoMatches);
/// assert_eq!(errors.into_result().unwrap_err().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<StoreError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends a failure. Nested aggregates are flattened so every cause stays enumerable.
    pub fn push(&mut self, error: StoreError) {
        match error {
            StoreError::Multiple(list) => self.errors.extend(list.errors),
            other => self.errors.push(other),
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, StoreError> {
        self.errors.iter()
    }

    /// Converts the list into a result: `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Like [`ErrorList::into_result`], but wraps a non-empty list in [`StoreError::Multiple`].
    pub fn into_store_result(self) -> StoreResult<()> {
        self.into_result().map_err(StoreError::Multiple)
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "1 error occurred: {single}"),
            errors => {
                write!(f, "{} errors occurred:", errors.len())?;
                for error in errors {
                    write!(f, "\n\t* {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorList {}

impl IntoIterator for ErrorList {
    type Item = StoreError;
    type IntoIter = vec::IntoIter<StoreError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a StoreError;
    type IntoIter = slice::Iter<'a, StoreError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl FromIterator<StoreError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = StoreError>>(iter: I) -> Self {
        let mut list = ErrorList::new();
        for error in iter {
            list.push(error);
        }
        list
    }
}
