use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::BookingError;

/// Key under which a seat-instance lease lives.
pub fn seat_lease_key(seat_instance_id: Uuid) -> String {
    format!("seat:lock:{}", seat_instance_id)
}

/// Distributed mutual-exclusion primitive over a shared TTL-capable store.
///
/// A lease is a hint and a guard, not state of record: the seat ledger stays
/// authoritative for seat disposition, the lease only prevents two concurrent
/// requests from racing past the ledger check at the same time. An
/// unreachable store must surface `Infrastructure` so callers fail closed.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically set `key -> holder` with expiry `ttl`, only if absent.
    /// Returns whether the lease was newly acquired.
    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, BookingError>;

    /// Delete `key` only if its current value equals `holder`. Returns
    /// whether a deletion occurred. Keeps a caller whose TTL already lapsed
    /// from releasing somebody else's lease.
    async fn release(&self, key: &str, holder: &str) -> Result<bool, BookingError>;

    /// Unconditional delete. Reserved for system-initiated cleanup by the
    /// expiry sweeper.
    async fn force_release(&self, key: &str) -> Result<(), BookingError>;

    /// Best-effort, owner-checked TTL extension.
    async fn extend(
        &self,
        key: &str,
        holder: &str,
        additional: Duration,
    ) -> Result<bool, BookingError>;
}
