//! Shared types for the order management workspace.

mod context;
mod ids;
mod page;

pub use context::{REQUEST_ID_HEADER, RequestContext, RequestId};
pub use ids::{ClientId, OrderId, OrderItemId, ProductId};
pub use page::{Direction, Page, PageRequest, Sort, SortParseError};
