//! Core traits for records that can be seeded into a collection.
//!
//! The reconciliation engine only ever talks to caller types through [`Model`]: whether a record
//! already carries a persisted identity, what that identity is, and how to assign a new one.
//! Everything else about the record is opaque and travels through serde.

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

use crate::error::{StoreError, StoreResult};

/// A value usable as a document identity.
///
/// Identity kinds that the store generates on its own (MongoDB's `ObjectId`) return a fresh value
/// from [`Identity::generate`]; caller-assigned kinds such as `String` return `None` and are
/// trusted to be supplied by the record itself.
pub trait Identity: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Produces a fresh identity if this is the store's auto-generated kind.
    fn generate() -> Option<Self> {
        None
    }
}

impl Identity for ObjectId {
    fn generate() -> Option<Self> {
        Some(ObjectId::new())
    }
}

impl Identity for String {}

impl Identity for bson::Uuid {}

impl Identity for i32 {}

impl Identity for i64 {}

/// A record that can be looked up, inserted and replaced by the seeding engine.
///
/// # Example
///
/// ```ignore
/// use dochelper::model::Model;
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// pub struct Country {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<ObjectId>,
///     pub code: String,
/// }
///
/// impl Model for Country {
///     type Id = ObjectId;
///
///     fn id(&self) -> Option<ObjectId> {
///         self.id
///     }
///
///     fn set_id(&mut self, id: ObjectId) {
///         self.id = Some(id);
///     }
/// }
/// ```
///
/// Most types can use `#[derive(Model)]` from the `dochelper` crate instead.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The identity type stored in the document's `_id` field.
    type Id: Identity;

    /// Returns the persisted identity, or `None` if the record has none yet.
    fn id(&self) -> Option<Self::Id>;

    /// Assigns an identity to the record.
    fn set_id(&mut self, id: Self::Id);

    /// Returns `true` if the record already carries a persisted identity.
    fn exists(&self) -> bool {
        self.id().is_some()
    }
}

/// Extension trait converting serializable values into BSON documents.
///
/// Implemented for every `Serialize` type; see [`from_document`] for the reverse direction.
pub trait ModelExt {
    /// Serializes the value into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the value does not serialize to a document.
    fn to_document(&self) -> StoreResult<Document>;
}

impl<T: Serialize> ModelExt for T {
    fn to_document(&self) -> StoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(StoreError::InvalidDocument(format!(
                "expected a document, found {:?}",
                other.element_type()
            ))),
        }
    }
}

/// Decodes a BSON document into any deserializable type.
pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Country {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<ObjectId>,
        code: String,
    }

    impl Model for Country {
        type Id = ObjectId;

        fn id(&self) -> Option<ObjectId> {
            self.id
        }

        fn set_id(&mut self, id: ObjectId) {
            self.id = Some(id);
        }
    }

    #[test]
    fn only_object_ids_are_generated() {
        assert!(ObjectId::generate().is_some());
        assert!(String::generate().is_none());
        assert!(i64::generate().is_none());
    }

    #[test]
    fn exists_follows_identity() {
        let mut country = Country {
            id: None,
            code: "GB".into(),
        };
        assert!(!country.exists());

        country.set_id(ObjectId::new());
        assert!(country.exists());
    }

    #[test]
    fn documents_round_trip_through_models() {
        let id = ObjectId::new();
        let country = Country {
            id: Some(id),
            code: "FR".into(),
        };

        let document = country.to_document().unwrap();
        assert_eq!(document, doc! { "_id": id, "code": "FR" });
        assert_eq!(from_document::<Country>(document).unwrap(), country);
    }

    #[test]
    fn absent_identity_is_not_serialized() {
        let document = Country {
            id: None,
            code: "ES".into(),
        }
        .to_document()
        .unwrap();

        assert!(!document.contains_key("_id"));
    }

    #[test]
    fn scalars_are_not_documents() {
        assert!(matches!(7_i32.to_document(), Err(StoreError::InvalidDocument(_))));
    }
}
