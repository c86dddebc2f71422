use std::collections::BTreeMap;

use serde_json::Value;

/// Ordering directive for `find`/`for_each`/`find_and_delete`.
#[derive(Debug, Clone)]
pub enum Order {
    Field(String),
    Fields(Vec<String>),
}

/// Options shared by `get_item`/`get_items`.
#[derive(Debug, Clone, Copy)]
pub struct GetOptions {
    pub error_if_missing: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            error_if_missing: true,
        }
    }
}

impl GetOptions {
    pub fn error_if_missing(mut self, value: bool) -> Self {
        self.error_if_missing = value;
        self
    }
}

/// Options for `put_item`. `error_if_exists` is forced to `true` by the
/// caller-side op whenever the item being written is new — see
/// `Collection::put_item`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    pub error_if_exists: bool,
}

impl PutOptions {
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }
}

/// Options for `delete_item`.
#[derive(Debug, Clone, Copy)]
pub struct DeleteOptions {
    pub error_if_missing: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            error_if_missing: true,
        }
    }
}

impl DeleteOptions {
    pub fn error_if_missing(mut self, value: bool) -> Self {
        self.error_if_missing = value;
        self
    }
}

/// Range/query/order options recognised by `find_items`, `count_items`,
/// `for_each_items` and `find_and_delete_items`. Semantics are defined by the
/// underlying `ObjectStore`; the repository core passes these through
/// verbatim (§4.E of the spec).
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub start: Option<String>,
    pub end: Option<String>,
    pub start_after: Option<String>,
    pub end_before: Option<String>,
    pub order: Option<Order>,
    pub query: BTreeMap<String, Value>,
    pub limit: Option<usize>,
    pub reverse: bool,
    pub batch_size: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order = Some(Order::Field(field.into()));
        self
    }

    pub fn order_by_fields(mut self, fields: Vec<String>) -> Self {
        self.order = Some(Order::Fields(fields));
        self
    }

    pub fn query_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}
