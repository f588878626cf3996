use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Live query results: one full snapshot per change, ending once dropped.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>, StoreError>>;

/// Document store capability the messaging components are built on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the document if missing, otherwise merges `writes` into it.
    async fn upsert_merge(&self, doc: &DocumentPath, writes: &[FieldWrite])
    -> Result<(), StoreError>;

    /// Inserts a new document under a generated id and returns the id.
    async fn add_record(
        &self,
        collection: &CollectionPath,
        writes: &[FieldWrite],
    ) -> Result<String, StoreError>;

    /// Merges `writes` into an existing document; `NotFound` otherwise.
    async fn update_fields(&self, doc: &DocumentPath, writes: &[FieldWrite])
    -> Result<(), StoreError>;

    /// Watches `query`. The current result is delivered first.
    async fn subscribe_query(&self, query: Query) -> Result<SnapshotStream, StoreError>;
}

/// Slash separated collection path, e.g. `chats` or `chats/a_b/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subcollection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{}", self.collection, self.id, name))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Path to a (possibly nested) field. Segments are kept apart so that
/// identifiers containing dots stay a single key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for FieldPath {
    fn from(segment: &str) -> Self {
        FieldPath::new(segment)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(Value),
    /// Resolved by the store to its clock, in epoch milliseconds.
    ServerTimestamp,
    /// Atomic add; a missing or non-numeric field counts as 0.
    Increment(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub path: FieldPath,
    pub value: FieldValue,
}

impl FieldWrite {
    pub fn set(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: FieldValue::Set(value.into()),
        }
    }

    pub fn server_timestamp(path: impl Into<FieldPath>) -> Self {
        Self {
            path: path.into(),
            value: FieldValue::ServerTimestamp,
        }
    }

    pub fn increment(path: impl Into<FieldPath>, amount: i64) -> Self {
        Self {
            path: path.into(),
            value: FieldValue::Increment(amount),
        }
    }
}

/// Applies `writes` to a document body, creating intermediate maps as needed.
pub fn apply_writes(data: &mut Value, writes: &[FieldWrite], now_millis: i64) {
    for write in writes {
        let Some(slot) = slot_mut(data, &write.path) else {
            continue;
        };
        match &write.value {
            FieldValue::Set(value) => *slot = value.clone(),
            FieldValue::ServerTimestamp => *slot = Value::from(now_millis),
            FieldValue::Increment(amount) => {
                let current = slot.as_i64().unwrap_or(0);
                *slot = Value::from(current + amount);
            }
        }
    }
}

fn slot_mut<'a>(root: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.segments() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()?
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    Some(current)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Field value, treating explicit `null` as absent.
    pub fn field(&self, path: &FieldPath) -> Option<&Value> {
        let mut current = &self.data;
        for segment in path.segments() {
            current = current.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    ArrayContains { field: FieldPath, value: Value },
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::ArrayContains { field, value } => doc
                .field(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: FieldPath,
    pub direction: Direction,
}

impl OrderBy {
    /// Documents missing the field sort after the rest in both directions.
    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        match (a.field(&self.field), b.field(&self.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y);
                match self.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(x: &Value, y: &Value) -> Ordering {
    match (x, y) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(x).cmp(&type_rank(y)),
    }
}

/// Collection query with at most one filter and one ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filter: Option<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filter: None,
            order_by: None,
        }
    }

    pub fn array_contains(mut self, field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<FieldPath>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.matches(doc))
    }

    /// Filters and orders `docs`, which arrive in insertion order. Ties keep
    /// that order.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        docs.retain(|doc| self.matches(doc));
        if let Some(order) = &self.order_by {
            docs.sort_by(|a, b| order.compare(a, b));
        }
        docs
    }
}
