//! Sparse search filters and their translation into store predicates.
//!
//! Every absent or blank field contributes [`Predicate::Always`], so an empty
//! filter matches everything.

use chrono::{DateTime, Utc};
use common::ProductId;
use rust_decimal::Decimal;
use store::{ClientField, Field, OrderField, OrderStatus, Predicate, ProductField, Value};

/// Case-insensitive substring match; blank needles match everything.
pub fn contains<F: Field>(field: F, needle: Option<&str>) -> Predicate<F> {
    match needle {
        Some(n) if !n.trim().is_empty() => Predicate::ContainsText(field, n.to_string()),
        _ => Predicate::Always,
    }
}

/// Equality; an absent value matches everything.
pub fn equals<F: Field>(field: F, value: Option<Value>) -> Predicate<F> {
    value.map_or(Predicate::Always, |v| Predicate::Equals(field, v))
}

/// Inclusive range with optional bounds.
pub fn between<F: Field>(field: F, from: Option<Value>, to: Option<Value>) -> Predicate<F> {
    if from.is_none() && to.is_none() {
        return Predicate::Always;
    }
    Predicate::Range { field, from, to }
}

/// Related-row containment; an absent value matches everything.
pub fn has_related<F: Field>(field: F, value: Option<Value>) -> Predicate<F> {
    value.map_or(Predicate::Always, |v| Predicate::HasRelated(field, v))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on the creation time.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the creation time.
    pub to: Option<DateTime<Utc>>,
    /// Only orders containing this product.
    pub product_id: Option<ProductId>,
}

impl OrderFilter {
    pub fn predicate(&self) -> Predicate<OrderField> {
        Predicate::all([
            equals(OrderField::Status, self.status.map(Value::Status)),
            between(
                OrderField::CreatedAt,
                self.from.map(Value::Timestamp),
                self.to.map(Value::Timestamp),
            ),
            has_related(
                OrderField::ProductId,
                self.product_id.map(|id| Value::Uuid(id.as_uuid())),
            ),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ClientFilter {
    pub fn predicate(&self) -> Predicate<ClientField> {
        Predicate::all([
            contains(ClientField::FirstName, self.first_name.as_deref()),
            contains(ClientField::LastName, self.last_name.as_deref()),
            contains(ClientField::Email, self.email.as_deref()),
            contains(ClientField::Phone, self.phone.as_deref()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

impl ProductFilter {
    pub fn predicate(&self) -> Predicate<ProductField> {
        Predicate::all([
            contains(ProductField::Name, self.name.as_deref()),
            between(
                ProductField::Price,
                self.price_min.map(Value::Decimal),
                self.price_max.map(Value::Decimal),
            ),
        ])
    }
}
