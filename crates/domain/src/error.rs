//! Domain error types.

use store::StoreError;
use thiserror::Error;

/// Entity named in a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Client,
    Product,
    Order,
    /// An order item, identified by its product id.
    OrderItem,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityKind::Client => "Client",
            EntityKind::Product => "Product",
            EntityKind::Order => "Order",
            EntityKind::OrderItem => "Order item (product)",
        };
        f.write_str(label)
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: EntityKind, id: String },

    /// The order already contains the product, or the request names it twice.
    #[error("Product {product_id} is already in the order")]
    DuplicateItem { product_id: String },

    /// A case-insensitive unique attribute is already taken.
    #[error("{field} '{value}' is already in use")]
    DuplicateIdentity { field: &'static str, value: String },

    /// The entity is still referenced and cannot be deleted.
    #[error("{entity} with id {id} is still referenced")]
    InUse { entity: EntityKind, id: String },

    /// The request violates a validation rule.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn duplicate_item(product_id: impl ToString) -> Self {
        metrics::counter!("domain_conflicts_total").increment(1);
        DomainError::DuplicateItem {
            product_id: product_id.to_string(),
        }
    }

    pub fn duplicate_identity(field: &'static str, value: impl Into<String>) -> Self {
        metrics::counter!("domain_conflicts_total").increment(1);
        DomainError::DuplicateIdentity {
            field,
            value: value.into(),
        }
    }

    pub fn in_use(entity: EntityKind, id: impl ToString) -> Self {
        metrics::counter!("domain_conflicts_total").increment(1);
        DomainError::InUse {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DomainError::InvalidArgument(message.into())
    }

    /// Returns true for the errors reported to callers as conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::DuplicateItem { .. }
                | DomainError::DuplicateIdentity { .. }
                | DomainError::InUse { .. }
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
