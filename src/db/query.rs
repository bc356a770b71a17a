// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Query description shared by every document source.

use std::cmp::Ordering;

use super::value::{FieldValue, RawDocument};

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    ArrayContains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// A single `where(field, op, value)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FieldValue,
}

impl Filter {
    pub fn new(field: &str, op: FilterOp, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate this clause against a document.
    pub fn matches(&self, doc: &RawDocument) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Equal => actual.total_cmp(&self.value).is_eq(),
            FilterOp::ArrayContains => match actual {
                FieldValue::Array(items) => items.iter().any(|v| v.total_cmp(&self.value).is_eq()),
                _ => false,
            },
            // Range filters only match values of the same type.
            FilterOp::LessThan => same_kind(actual, &self.value) && actual.total_cmp(&self.value).is_lt(),
            FilterOp::LessThanOrEqual => {
                same_kind(actual, &self.value) && actual.total_cmp(&self.value).is_le()
            }
            FilterOp::GreaterThan => {
                same_kind(actual, &self.value) && actual.total_cmp(&self.value).is_gt()
            }
            FilterOp::GreaterThanOrEqual => {
                same_kind(actual, &self.value) && actual.total_cmp(&self.value).is_ge()
            }
        }
    }
}

fn same_kind(a: &FieldValue, b: &FieldValue) -> bool {
    a.type_name() == b.type_name()
}

/// Pseudo-field naming the document key in orderings and cursors.
pub const DOCUMENT_KEY: &str = "__name__";

/// Sort direction for an `order_by` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Opaque pagination marker: the last raw document of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(RawDocument);

impl Cursor {
    pub fn new(doc: RawDocument) -> Self {
        Self(doc)
    }

    pub fn document(&self) -> &RawDocument {
        &self.0
    }

    /// Values of the ordering fields at the cursor position, in `order_by`
    /// order. [`DOCUMENT_KEY`] yields a reference to the cursor document.
    pub fn values_for(&self, order_by: &[OrderBy]) -> Vec<FieldValue> {
        order_by
            .iter()
            .map(|o| {
                if o.field == DOCUMENT_KEY {
                    FieldValue::Reference(self.0.reference.clone())
                } else {
                    self.0.field(&o.field).cloned().unwrap_or(FieldValue::Null)
                }
            })
            .collect()
    }
}

/// A live query over one collection.
///
/// Clauses are applied in the database's order: filters, sort, cursor, limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub start_after: Option<Cursor>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            start_after: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The ordering with the document key made explicit, as `compare` applies
    /// it. A cursor positioned with these clauses is unique even when the
    /// explicit fields tie.
    pub fn keyed_order(&self) -> Vec<OrderBy> {
        let mut order = self.order_by.clone();
        if !order.iter().any(|o| o.field == DOCUMENT_KEY) {
            let direction = order
                .last()
                .map(|o| o.direction)
                .unwrap_or(Direction::Ascending);
            order.push(OrderBy {
                field: DOCUMENT_KEY.to_string(),
                direction,
            });
        }
        order
    }

    /// Compare two documents by this query's ordering. Ties fall back to the
    /// document path, in the direction of the last explicit order clause.
    pub fn compare(&self, a: &RawDocument, b: &RawDocument) -> Ordering {
        for order in &self.order_by {
            let null = FieldValue::Null;
            let va = a.field(&order.field).unwrap_or(&null);
            let vb = b.field(&order.field).unwrap_or(&null);
            let ord = apply_direction(va.total_cmp(vb), order.direction);
            if ord.is_ne() {
                return ord;
            }
        }
        let tie_direction = self
            .order_by
            .last()
            .map(|o| o.direction)
            .unwrap_or(Direction::Ascending);
        apply_direction(a.reference.cmp(&b.reference), tie_direction)
    }

    /// Run the query over an unordered set of documents from `collection`.
    pub fn evaluate<'a, I>(&self, docs: I) -> Vec<RawDocument>
    where
        I: IntoIterator<Item = &'a RawDocument>,
    {
        let mut matched: Vec<RawDocument> = docs
            .into_iter()
            .filter(|doc| doc.reference.parent() == self.collection)
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .cloned()
            .collect();

        // Firestore excludes documents missing an order-by field.
        matched.retain(|doc| self.order_by.iter().all(|o| doc.field(&o.field).is_some()));
        matched.sort_by(|a, b| self.compare(a, b));

        if let Some(cursor) = &self.start_after {
            let anchor = cursor.document();
            matched.retain(|doc| self.compare(doc, anchor).is_gt());
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit as usize);
        }
        matched
    }
}

fn apply_direction(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}
