use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use marquee_core::catalog::{CatalogProvider, Showing, ShowingStatus};
use marquee_core::error::BookingError;

/// Read-only view over the showings table the catalog collaborator owns.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowingRow {
    id: Uuid,
    status: String,
    starts_at: DateTime<Utc>,
}

#[async_trait]
impl CatalogProvider for PgCatalog {
    async fn get_showing(&self, showing_id: Uuid) -> Result<Option<Showing>, BookingError> {
        let row: Option<ShowingRow> =
            sqlx::query_as("SELECT id, status, starts_at FROM showings WHERE id = $1")
                .bind(showing_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(BookingError::infrastructure)?;

        row.map(|row| {
            let status = ShowingStatus::parse(&row.status).ok_or_else(|| {
                BookingError::Infrastructure(format!(
                    "unrecognized showing status {:?}",
                    row.status
                ))
            })?;
            Ok(Showing {
                id: row.id,
                status,
                starts_at: row.starts_at,
            })
        })
        .transpose()
    }
}
