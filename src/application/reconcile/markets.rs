//! Active-market set reconciliation for a single provider.

use tracing::debug;

use crate::domain::{MarketId, MarketSetDelta, ProviderId};
use crate::error::Result;
use crate::port::outbound::store::MetricsTransaction;

/// Make the provider's stored active-market set equal to `observed`.
///
/// Reads the current memberships, inserts the missing ones, and deletes the
/// stale ones. A side with nothing to change issues no write. Errors are
/// returned unchanged so the caller can roll the record back.
pub fn reconcile_active_markets(
    tx: &mut dyn MetricsTransaction,
    provider_id: ProviderId,
    observed: &[MarketId],
) -> Result<MarketSetDelta> {
    let current = tx.active_markets(provider_id)?;
    let delta = MarketSetDelta::between(&current, observed);

    if !delta.to_add.is_empty() {
        tx.add_active_markets(provider_id, &delta.to_add)?;
    }
    if !delta.to_remove.is_empty() {
        tx.remove_active_markets(provider_id, &delta.to_remove)?;
    }

    debug!(
        provider_id = %provider_id,
        added = delta.to_add.len(),
        removed = delta.to_remove.len(),
        "Active markets reconciled"
    );
    Ok(delta)
}
