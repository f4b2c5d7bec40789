//! Query language understood by every `DocumentStore`.
//!
//! Filters are a small typed subset of the Mongo query language. Backends
//! that speak a real wire protocol render them with [`Filter::to_document`];
//! the in-memory backend evaluates them directly with [`Filter::matches`].

use serde_json::{Map, Value, json};
use std::cmp::Ordering;

use super::{Document, Field};
use crate::types::{OwnerScope, SearchCriteria};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document
    #[default]
    All,
    /// Field equals value. `Null` also matches a missing field.
    Eq(String, Value),
    Ne(String, Value),
    Exists(String, bool),
    Gte(String, Value),
    Lte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(field.into(), true)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    /// Conjunction that flattens nested `And`s and drops `All`.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), f) => {
                left.push(f);
                Self::And(left)
            }
            (f, Self::And(mut right)) => {
                right.insert(0, f);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Evaluate against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, expected) => match get_path(doc, field) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            },
            Self::Ne(field, expected) => {
                !Self::Eq(field.clone(), expected.clone()).matches(doc)
            }
            Self::Exists(field, should_exist) => get_path(doc, field).is_some() == *should_exist,
            Self::Gte(field, bound) => get_path(doc, field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Less),
            Self::Lte(field, bound) => get_path(doc, field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Greater),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }

    /// Render as a Mongo-style query document.
    pub fn to_document(&self) -> Value {
        match self {
            Self::All => Value::Object(Map::new()),
            Self::Eq(field, value) => json!({ field: value }),
            Self::Ne(field, value) => json!({ field: { "$ne": value } }),
            Self::Exists(field, flag) => json!({ field: { "$exists": flag } }),
            Self::Gte(field, value) => json!({ field: { "$gte": value } }),
            Self::Lte(field, value) => json!({ field: { "$lte": value } }),
            Self::And(filters) => {
                json!({ "$and": filters.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
            Self::Or(filters) => {
                json!({ "$or": filters.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
        }
    }
}

impl From<&SearchCriteria> for Filter {
    fn from(criteria: &SearchCriteria) -> Self {
        let mut filter = Filter::All;
        if let Some(table) = &criteria.table {
            filter = filter.and(Filter::eq(Field::Table, table.as_str()));
        }
        if let Some(owner) = &criteria.owner {
            filter = filter.and(match owner {
                OwnerScope::Agent(agent) => Filter::eq(Field::AgentId, agent.to_string()),
                OwnerScope::AgentOrShared(agent) => Filter::Or(vec![
                    Filter::eq(Field::AgentId, agent.to_string()),
                    Filter::eq(Field::IsShared, true),
                ]),
                OwnerScope::User(user) => Filter::eq(Field::UserId, user.to_string()),
            });
        }
        if let Some(room) = &criteria.room_id {
            filter = filter.and(Filter::eq(Field::RoomId, room.to_string()));
        }
        if criteria.unique_only {
            filter = filter.and(Filter::eq(Field::Unique, true));
        }
        filter
    }
}

/// Resolve a dotted path ("content.text") inside a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Order two scalar values of the same kind. Mixed kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
