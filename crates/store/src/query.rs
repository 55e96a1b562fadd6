//! Composable search predicates that every backend can lower.
//!
//! A [`Predicate`] is a small tree over the searchable fields `F` of one
//! entity. Only conjunction is supported; [`Predicate::Always`] is the
//! identity element, so absent filter fields simply vanish.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::PageRequest;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::model::OrderStatus;

/// A comparable value a predicate can test against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Uuid(Uuid),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    Status(OrderStatus),
}

impl Value {
    /// Orders two values of the same variant; mixed variants are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Status(a), Value::Status(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => None,
        }
    }
}

/// A one-to-many relation used by [`Predicate::HasRelated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Table holding the related rows.
    pub table: &'static str,
    /// Column of the related table that references the searched entity's id.
    pub foreign_key: &'static str,
}

/// A searchable (and sortable) field of an entity.
pub trait Field: Copy + Eq + Send + Sync + std::fmt::Debug + 'static {
    /// Column name in the entity's table, or in the related table for related fields.
    fn column(&self) -> &'static str;

    /// The relation this field is reached through, if it is not a direct column.
    fn relation(&self) -> Option<Relation> {
        None
    }
}

/// Boolean filter tree over the fields `F`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    /// Matches every row.
    Always,
    /// Field equals the value.
    Equals(F, Value),
    /// Case-insensitive substring containment on a text field.
    ContainsText(F, String),
    /// Inclusive range; a missing bound is open.
    Range {
        field: F,
        from: Option<Value>,
        to: Option<Value>,
    },
    /// At least one related row has a field equal to the value.
    ///
    /// Never multiplies result rows, whatever the number of matches.
    HasRelated(F, Value),
    /// All of the inner predicates hold.
    And(Vec<Predicate<F>>),
}

impl<F: Field> Predicate<F> {
    /// Combines with another predicate, dropping identity elements.
    pub fn and(self, other: Predicate<F>) -> Predicate<F> {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, Predicate::And(mut b)) => {
                b.insert(0, p);
                Predicate::And(b)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Conjunction of every predicate in the iterator.
    pub fn all(predicates: impl IntoIterator<Item = Predicate<F>>) -> Predicate<F> {
        predicates
            .into_iter()
            .fold(Predicate::Always, Predicate::and)
    }

    /// Returns true if the predicate matches every row.
    pub fn is_always(&self) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Range { from, to, .. } => from.is_none() && to.is_none(),
            Predicate::And(inner) => inner.iter().all(Predicate::is_always),
            _ => false,
        }
    }

    /// Evaluates the predicate against one row.
    ///
    /// `values` returns every value the row holds for a field: exactly one
    /// for a direct column, zero or more for a related field. A test passes
    /// when any of the values satisfies it.
    pub fn matches(&self, values: &impl Fn(F) -> Vec<Value>) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Equals(field, expected) | Predicate::HasRelated(field, expected) => {
                values(*field).iter().any(|v| v == expected)
            }
            Predicate::ContainsText(field, needle) => {
                let needle = needle.to_lowercase();
                values(*field).iter().any(|v| match v {
                    Value::Text(text) => text.to_lowercase().contains(&needle),
                    _ => false,
                })
            }
            Predicate::Range { field, from, to } => values(*field).iter().any(|v| {
                let above = from
                    .as_ref()
                    .is_none_or(|f| matches!(v.compare(f), Some(Ordering::Greater | Ordering::Equal)));
                let below = to
                    .as_ref()
                    .is_none_or(|t| matches!(v.compare(t), Some(Ordering::Less | Ordering::Equal)));
                above && below
            }),
            Predicate::And(inner) => inner.iter().all(|p| p.matches(values)),
        }
    }
}

/// A predicate plus the page to return.
#[derive(Debug, Clone, PartialEq)]
pub struct Query<F> {
    pub predicate: Predicate<F>,
    pub page: PageRequest<F>,
}

impl<F: Field> Query<F> {
    pub fn new(predicate: Predicate<F>, page: PageRequest<F>) -> Self {
        Self { predicate, page }
    }
}

/// Declares a field enum with its column names and sort-key spellings.
macro_rules! fields {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $column:literal, $key:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            fn base_column(&self) -> &'static str {
                match self {
                    $($name::$variant => $column,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            /// Parses the camelCase field name used in sort expressions.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key => Ok($name::$variant),)+
                    _ => Err(()),
                }
            }
        }
    };
}

fields!(
    /// Searchable fields of a client.
    ClientField {
        Id => "id", "id";
        FirstName => "first_name", "firstName";
        LastName => "last_name", "lastName";
        Email => "email", "email";
        Phone => "phone", "phone";
    }
);

impl Field for ClientField {
    fn column(&self) -> &'static str {
        self.base_column()
    }
}

fields!(
    /// Searchable fields of a product.
    ProductField {
        Id => "id", "id";
        Name => "name", "name";
        Price => "price", "price";
    }
);

impl Field for ProductField {
    fn column(&self) -> &'static str {
        self.base_column()
    }
}

fields!(
    /// Searchable fields of an order. `ProductId` is reached through its items.
    OrderField {
        Id => "id", "id";
        CreatedAt => "created_at", "createdAt";
        Status => "status", "status";
        ClientId => "client_id", "clientId";
        ProductId => "product_id", "productId";
    }
);

impl Field for OrderField {
    fn column(&self) -> &'static str {
        self.base_column()
    }

    fn relation(&self) -> Option<Relation> {
        match self {
            OrderField::ProductId => Some(Relation {
                table: "order_items",
                foreign_key: "order_id",
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, day, 12, 0, 0).unwrap()
    }

    fn order_row(status: OrderStatus, day: u32, products: Vec<Uuid>) -> impl Fn(OrderField) -> Vec<Value> {
        move |field| match field {
            OrderField::Status => vec![Value::Status(status)],
            OrderField::CreatedAt => vec![Value::Timestamp(ts(day))],
            OrderField::ProductId => products.iter().copied().map(Value::Uuid).collect(),
            _ => vec![],
        }
    }

    #[test]
    fn and_drops_identity_elements() {
        let p = Predicate::Always.and(Predicate::Equals(
            OrderField::Status,
            Value::Status(OrderStatus::New),
        ));
        assert_eq!(
            p,
            Predicate::Equals(OrderField::Status, Value::Status(OrderStatus::New))
        );
        assert_eq!(
            Predicate::<OrderField>::all(vec![Predicate::Always, Predicate::Always]),
            Predicate::Always
        );
    }

    #[test]
    fn and_flattens_nested_conjunctions() {
        let a = Predicate::ContainsText(ClientField::FirstName, "a".into());
        let b = Predicate::ContainsText(ClientField::LastName, "b".into());
        let c = Predicate::ContainsText(ClientField::Email, "c".into());
        let p = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(p, Predicate::And(vec![a, b, c]));
    }

    #[test]
    fn range_is_inclusive_on_both_bounds() {
        let row = order_row(OrderStatus::New, 10, vec![]);
        let range = |from: Option<u32>, to: Option<u32>| Predicate::Range {
            field: OrderField::CreatedAt,
            from: from.map(|d| Value::Timestamp(ts(d))),
            to: to.map(|d| Value::Timestamp(ts(d))),
        };

        assert!(range(Some(10), Some(10)).matches(&row));
        assert!(range(Some(9), Some(11)).matches(&row));
        assert!(!range(Some(11), Some(12)).matches(&row));
        assert!(range(Some(10), None).matches(&row));
        assert!(!range(Some(11), None).matches(&row));
        assert!(range(None, Some(10)).matches(&row));
        assert!(!range(None, Some(9)).matches(&row));
        assert!(range(None, None).matches(&row));
    }

    #[test]
    fn has_related_matches_any_related_value() {
        let wanted = Uuid::new_v4();
        let row = order_row(OrderStatus::New, 1, vec![Uuid::new_v4(), wanted]);
        assert!(Predicate::HasRelated(OrderField::ProductId, Value::Uuid(wanted)).matches(&row));

        let empty = order_row(OrderStatus::New, 1, vec![]);
        assert!(!Predicate::HasRelated(OrderField::ProductId, Value::Uuid(wanted)).matches(&empty));
    }

    #[test]
    fn contains_text_ignores_case() {
        let row = |field: ClientField| match field {
            ClientField::Email => vec![Value::Text("Alice@Example.com".into())],
            _ => vec![],
        };
        assert!(Predicate::ContainsText(ClientField::Email, "EXAMPLE".into()).matches(&row));
        assert!(!Predicate::ContainsText(ClientField::Email, "bob".into()).matches(&row));
    }

    #[test]
    fn open_range_counts_as_always() {
        let p: Predicate<ProductField> = Predicate::Range {
            field: ProductField::Price,
            from: None,
            to: None,
        };
        assert!(p.is_always());
    }

    #[test]
    fn fields_parse_from_sort_keys() {
        assert_eq!("createdAt".parse::<OrderField>(), Ok(OrderField::CreatedAt));
        assert_eq!("firstName".parse::<ClientField>(), Ok(ClientField::FirstName));
        assert!("created_at".parse::<OrderField>().is_err());
        assert_eq!(OrderField::ProductId.relation().unwrap().table, "order_items");
        assert!(OrderField::Status.relation().is_none());
    }
}
