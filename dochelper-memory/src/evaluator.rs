//! Filter evaluation for in-memory documents.
//!
//! Field names are resolved as dotted paths through embedded documents, so `"sub.type_id"`
//! reaches `{ sub: { type_id: .. } }`. A path that does not resolve behaves like a missing field.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use dochelper_core::{
    error::StoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Resolves a dotted field path inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Comparable view of a BSON value.
///
/// Integers compare exactly as `i64`; only a comparison against a double goes through `f64`.
/// Values of different kinds are never equal and have no partial order; [`Comparable::sort_cmp`]
/// provides the total order used for sorting.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Kinds without a natural order (binaries, regexes, ...), compared for equality only.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    /// Position of this value's kind in the cross-kind sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Integer(_) | Comparable::Double(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order for sorting: values of the same kind compare naturally, otherwise by kind.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Integer(a), Comparable::Double(b))
            | (Comparable::Double(b), Comparable::Integer(a)) => *a as f64 == *b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates filter expressions against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<bool, StoreError> {
        self.visit_expr(expr)
    }

    /// Returns `true` if `document` matches `filter`; no filter matches everything.
    pub fn matches(document: &Document, filter: Option<&Expr>) -> Result<bool, StoreError> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

fn any_of(field: Comparable<'_>, value: Comparable<'_>) -> bool {
    match (field, value) {
        (Comparable::Array(items), Comparable::Array(values)) => {
            values.iter().any(|value| items.contains(value))
        }
        (Comparable::Array(items), single) => items.contains(&single),
        (single, Comparable::Array(values)) => values.contains(&single),
        _ => false,
    }
}

fn contains(field: Comparable<'_>, value: Comparable<'_>) -> Option<bool> {
    match (field, value) {
        (Comparable::Array(items), value) => Some(items.contains(&value)),
        (Comparable::String(left), Comparable::String(right)) => Some(left.contains(right)),
        _ => None,
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            // a missing field only satisfies the negative operators
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf));
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOp::Contains => contains(left, right).unwrap_or(false),
            FieldOp::NotContains => !contains(left, right).unwrap_or(false),
            FieldOp::StartsWith => match (left, right) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            },
            FieldOp::EndsWith => match (left, right) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            },
            FieldOp::AnyOf => any_of(left, right),
            FieldOp::NoneOf => !any_of(left, right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use dochelper_core::query::Filter;

    fn eval(document: &Document, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn dotted_paths_reach_embedded_documents() {
        let document = doc! { "str": "a", "sub": { "type_id": 4 } };

        assert!(eval(&document, Filter::eq("sub.type_id", 4)));
        assert!(eval(&document, Filter::exists("sub.type_id")));
        assert!(!eval(&document, Filter::exists("sub.missing")));
        assert!(!eval(&document, Filter::eq("str.inner", "a")));
    }

    #[test]
    fn integers_and_doubles_compare_as_numbers() {
        let document = doc! { "num": 999_i64 };

        assert!(eval(&document, Filter::eq("num", 999_i32)));
        assert!(eval(&document, Filter::lt("num", 999.5)));
        assert!(!eval(&document, Filter::gt("num", 1000)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let (low, high) = (1_i64 << 53, (1_i64 << 53) + 1);
        let document = doc! { "_id": high };

        assert!(eval(&document, Filter::id(high)));
        assert!(!eval(&document, Filter::id(low)));
        assert!(eval(&document, Filter::gt("_id", low)));
        assert_eq!(
            Comparable::from(&Bson::Int64(low)).sort_cmp(&Comparable::from(&Bson::Int64(high))),
            Ordering::Less,
        );
    }

    #[test]
    fn object_ids_match_by_value() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };

        assert!(eval(&document, Filter::id(id)));
        assert!(!eval(&document, Filter::id(ObjectId::new())));
        assert!(!eval(&document, Filter::id(id.to_hex())));
    }

    #[test]
    fn missing_fields_only_satisfy_negations() {
        let document = doc! { "num": 1 };

        assert!(!eval(&document, Filter::eq("str", "x")));
        assert!(eval(&document, Filter::ne("str", "x")));
        assert!(eval(&document, Filter::none_of("str", vec!["x", "y"])));
    }

    #[test]
    fn membership_operators() {
        let document = doc! { "tags": ["red", "blue"], "str": "test1" };

        assert!(eval(&document, Filter::contains("tags", "red")));
        assert!(eval(&document, Filter::contains("str", "est")));
        assert!(eval(&document, Filter::any_of("str", vec!["test1", "test2"])));
        assert!(eval(&document, Filter::none_of("tags", vec!["green"])));
        assert!(eval(
            &document,
            Filter::starts_with("str", "te").and(Filter::ends_with("str", "1"))
        ));
    }

    #[test]
    fn sort_order_spans_kinds() {
        let (null, number, string) = (Bson::Null, Bson::Int32(5), Bson::String("a".into()));

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(
            Comparable::from(&string).sort_cmp(&Comparable::from(&number)),
            Ordering::Greater
        );
    }
}
