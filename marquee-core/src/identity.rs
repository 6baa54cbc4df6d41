use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BookingError;

/// Identity collaborator contract. The user record is owned elsewhere; this
/// core reads the loyalty balance here and applies debits/credits inside the
/// confirmation transaction.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn points_balance(&self, user_id: Uuid) -> Result<i64, BookingError>;
}
