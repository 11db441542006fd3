//! Index key specifications and index descriptors.

use bson::{Bson, Document};

use crate::query::SortDirection;

/// An ordered mapping of field names to index directions.
///
/// Key order is significant for compound indexes and is preserved exactly as added.
///
/// ```ignore
/// let keys = IndexKeys::new().asc("country").desc("created_at");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexKeys {
    keys: Document,
}

impl IndexKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.key(field, SortDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.key(field, SortDirection::Desc)
    }

    pub fn key(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.insert(field.into(), direction.as_i32());
        self
    }

    /// Adds a key with a raw value, for special index types such as `"text"` or `"2dsphere"`.
    pub fn raw(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.keys.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn as_document(&self) -> &Document {
        &self.keys
    }

    pub fn into_document(self) -> Document {
        self.keys
    }
}

impl From<Document> for IndexKeys {
    fn from(keys: Document) -> Self {
        Self { keys }
    }
}

/// A request to create a named index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexModel {
    pub name: String,
    pub keys: IndexKeys,
    pub unique: bool,
}

impl IndexModel {
    pub fn new(name: impl Into<String>, keys: IndexKeys) -> Self {
        Self {
            name: name.into(),
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// An index as reported by a backend listing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub keys: IndexKeys,
    pub unique: bool,
}

impl From<IndexModel> for IndexDescriptor {
    fn from(model: IndexModel) -> Self {
        Self {
            name: model.name,
            keys: model.keys,
            unique: model.unique,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn keys_keep_insertion_order() {
        let keys = IndexKeys::new().desc("b").asc("a").raw("body", "text");

        assert_eq!(keys.fields().collect::<Vec<_>>(), vec!["b", "a", "body"]);
        assert_eq!(keys.into_document(), doc! { "b": -1, "a": 1, "body": "text" });
    }
}
