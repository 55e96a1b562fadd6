//! Batched per-client order counts.

use std::collections::HashMap;

use common::ClientId;
use store::ClientRepository;

use crate::error::Result;

/// Counts orders for every id in `ids` with one grouped query.
///
/// Every requested id is present in the result; clients without orders map to zero.
pub async fn order_counts<R>(repo: &mut R, ids: &[ClientId]) -> Result<HashMap<ClientId, u64>>
where
    R: ClientRepository + ?Sized,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut counts = repo.count_orders_by_client(ids).await?;
    for id in ids {
        counts.entry(*id).or_insert(0);
    }
    Ok(counts)
}
