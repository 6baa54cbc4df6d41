use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use marquee_core::booking::{Booking, BookingSeat, BookingStatus};
use marquee_core::error::BookingError;
use marquee_core::identity::IdentityProvider;
use marquee_core::ledger::{BookingLedger, NewReservation, SeatLedger};
use marquee_core::payment::Payment;
use marquee_core::seat::{SeatInstance, SeatStatus};

const BOOKING_CODE_CONSTRAINT: &str = "bookings_code_key";
const ONE_PENDING_CONSTRAINT: &str = "bookings_one_pending_per_user_showing";

/// Postgres implementation of both ledgers. Seats and bookings live in one
/// database so every composite operation is a single transaction.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_seats(&self, row: BookingRow) -> Result<Booking, BookingError> {
        let seats: Vec<BookingSeatRow> = sqlx::query_as(
            "SELECT seat_instance_id, price FROM booking_seats WHERE booking_id = $1 ORDER BY id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.into_booking(seats)
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    showing_id: Uuid,
    row_name: String,
    seat_number: i32,
    seat_type: String,
    price: i64,
    status: String,
    locked_by: Option<Uuid>,
    locked_at: Option<DateTime<Utc>>,
}

impl SeatRow {
    fn into_seat(self) -> Result<SeatInstance, BookingError> {
        let status = SeatStatus::parse(&self.status).ok_or_else(|| {
            BookingError::Infrastructure(format!("unrecognized seat status {:?}", self.status))
        })?;
        Ok(SeatInstance {
            id: self.id,
            showing_id: self.showing_id,
            row_name: self.row_name,
            seat_number: self.seat_number,
            seat_type: self.seat_type,
            price: self.price,
            status,
            locked_by: self.locked_by,
            locked_at: self.locked_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    code: String,
    user_id: Uuid,
    showing_id: Uuid,
    total_amount: i64,
    discount_amount: i64,
    final_amount: i64,
    points_used: i32,
    points_earned: i32,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BookingRow {
    fn into_booking(self, seats: Vec<BookingSeatRow>) -> Result<Booking, BookingError> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            BookingError::Infrastructure(format!("unrecognized booking status {:?}", self.status))
        })?;
        Ok(Booking {
            id: self.id,
            code: self.code,
            user_id: self.user_id,
            showing_id: self.showing_id,
            seats: seats
                .into_iter()
                .map(|s| BookingSeat {
                    seat_instance_id: s.seat_instance_id,
                    price: s.price,
                })
                .collect(),
            total_amount: self.total_amount,
            discount_amount: self.discount_amount,
            final_amount: self.final_amount,
            points_used: self.points_used,
            points_earned: self.points_earned,
            status,
            created_at: self.created_at,
            expires_at: self.expires_at,
            confirmed_at: self.confirmed_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingSeatRow {
    seat_instance_id: Uuid,
    price: i64,
}

const SELECT_BOOKING: &str = "SELECT id, code, user_id, showing_id, total_amount, \
     discount_amount, final_amount, points_used, points_earned, status, created_at, \
     expires_at, confirmed_at, cancelled_at FROM bookings";

fn map_db_err(err: sqlx::Error) -> BookingError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            match db.constraint() {
                Some(BOOKING_CODE_CONSTRAINT) => return BookingError::CodeCollision,
                Some(ONE_PENDING_CONSTRAINT) => return BookingError::DuplicatePendingBooking,
                _ => {}
            }
        }
    }
    BookingError::infrastructure(err)
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &Payment,
) -> Result<(), BookingError> {
    sqlx::query(
        "INSERT INTO payments (id, booking_id, method, amount, status, transaction_id, \
         payment_url, paid_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(payment.id)
    .bind(payment.booking_id)
    .bind(payment.method.as_str())
    .bind(payment.amount)
    .bind(payment.status.as_str())
    .bind(payment.transaction_id.as_deref())
    .bind(payment.payment_url.as_deref())
    .bind(payment.paid_at)
    .bind(payment.created_at)
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
}

#[async_trait]
impl SeatLedger for PgLedger {
    async fn get_seats(&self, seat_ids: &[Uuid]) -> Result<Vec<SeatInstance>, BookingError> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, showing_id, row_name, seat_number, seat_type, price, status, \
             locked_by, locked_at FROM show_seats WHERE id = ANY($1)",
        )
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn unlock_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError> {
        sqlx::query(
            "UPDATE show_seats SET status = 'AVAILABLE', locked_by = NULL, locked_at = NULL \
             WHERE id = ANY($1) AND status = 'LOCKED'",
        )
        .bind(seat_ids)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn sell_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError> {
        sqlx::query(
            "UPDATE show_seats SET status = 'SOLD', locked_by = NULL, locked_at = NULL \
             WHERE id = ANY($1) AND status = 'LOCKED'",
        )
        .bind(seat_ids)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }
}

#[async_trait]
impl BookingLedger for PgLedger {
    async fn reserve(&self, reservation: NewReservation) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        // Row locks order the race between concurrent reservations that
        // slipped past the lease layer.
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, showing_id, row_name, seat_number, seat_type, price, status, \
             locked_by, locked_at FROM show_seats WHERE id = ANY($1) FOR UPDATE",
        )
        .bind(&reservation.seat_instance_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if rows.len() != reservation.seat_instance_ids.len() {
            return Err(BookingError::NotFound("seat"));
        }
        let mut prices = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            if row.showing_id != reservation.showing_id {
                return Err(BookingError::NotFound("seat"));
            }
            let seat = row.into_seat()?;
            match seat.status {
                SeatStatus::Sold => return Err(BookingError::SeatAlreadySold),
                SeatStatus::Locked => return Err(BookingError::SeatAlreadyLocked),
                SeatStatus::Available => {
                    prices.insert(seat.id, seat.price);
                }
            }
        }

        sqlx::query(
            "UPDATE show_seats SET status = 'LOCKED', locked_by = $2, locked_at = $3 \
             WHERE id = ANY($1)",
        )
        .bind(&reservation.seat_instance_ids)
        .bind(reservation.user_id)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let seats: Vec<BookingSeat> = reservation
            .seat_instance_ids
            .iter()
            .map(|id| BookingSeat {
                seat_instance_id: *id,
                price: prices[id],
            })
            .collect();
        let total: i64 = seats.iter().map(|s| s.price).sum();
        let booking_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO bookings (id, code, user_id, showing_id, total_amount, \
             discount_amount, final_amount, points_used, points_earned, status, \
             created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $5, 0, 0, 'PENDING', $6, $7)",
        )
        .bind(booking_id)
        .bind(&reservation.code)
        .bind(reservation.user_id)
        .bind(reservation.showing_id)
        .bind(total)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        for seat in &seats {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, seat_instance_id, price) \
                 VALUES ($1, $2, $3)",
            )
            .bind(booking_id)
            .bind(seat.seat_instance_id)
            .bind(seat.price)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;

        Ok(Booking {
            id: booking_id,
            code: reservation.code,
            user_id: reservation.user_id,
            showing_id: reservation.showing_id,
            seats,
            total_amount: total,
            discount_amount: 0,
            final_amount: total,
            points_used: 0,
            points_earned: 0,
            status: BookingStatus::Pending,
            created_at: reservation.created_at,
            expires_at: reservation.expires_at,
            confirmed_at: None,
            cancelled_at: None,
        })
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, \
             confirmed_at = CASE WHEN $3 = 'CONFIRMED' THEN $4 ELSE confirmed_at END, \
             cancelled_at = CASE WHEN $3 IN ('CANCELLED', 'EXPIRED') THEN $4 ELSE cancelled_at END \
             WHERE id = $1 AND status = $2",
        )
        .bind(booking_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply_checkout(
        &self,
        booking_id: Uuid,
        discount_amount: i64,
        points_used: i32,
        final_amount: i64,
        payment: Payment,
    ) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let updated = sqlx::query(
            "UPDATE bookings SET discount_amount = $2, points_used = $3, final_amount = $4 \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(booking_id)
        .bind(discount_amount)
        .bind(points_used)
        .bind(final_amount)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;
        if updated.rows_affected() != 1 {
            return Err(BookingError::BookingNotPending);
        }

        insert_payment(&mut tx, &payment).await?;
        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn confirm(
        &self,
        booking_id: Uuid,
        transaction_id: &str,
        points_earned: i32,
        at: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let won: Option<(Uuid, i32)> = sqlx::query_as(
            "UPDATE bookings SET status = 'CONFIRMED', confirmed_at = $2, points_earned = $3 \
             WHERE id = $1 AND status = 'PENDING' RETURNING user_id, points_used",
        )
        .bind(booking_id)
        .bind(at)
        .bind(points_earned)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;
        let (user_id, points_used) = won.ok_or(BookingError::BookingNotPending)?;

        sqlx::query(
            "UPDATE show_seats SET status = 'SOLD', locked_by = NULL, locked_at = NULL \
             WHERE status = 'LOCKED' AND id IN \
             (SELECT seat_instance_id FROM booking_seats WHERE booking_id = $1)",
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query(
            "UPDATE payments SET status = 'COMPLETED', transaction_id = $2, paid_at = $3 \
             WHERE booking_id = $1 AND status = 'PENDING'",
        )
        .bind(booking_id)
        .bind(transaction_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
            .bind(user_id)
            .bind((points_earned - points_used) as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        self.find_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound("booking"))
    }

    async fn has_pending(&self, user_id: Uuid, showing_id: Uuid) -> Result<bool, BookingError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE user_id = $1 AND showing_id = $2 \
             AND status = 'PENDING')",
        )
        .bind(user_id)
        .bind(showing_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(exists)
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        let sql = format!("{} WHERE id = $1", SELECT_BOOKING);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        match row {
            Some(row) => Ok(Some(self.attach_seats(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BookingError> {
        let sql = format!("{} WHERE code = $1", SELECT_BOOKING);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        match row {
            Some(row) => Ok(Some(self.attach_seats(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, BookingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SELECT_BOOKING
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            bookings.push(self.attach_seats(row).await?);
        }
        Ok(bookings)
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'PENDING' AND expires_at < $1",
            SELECT_BOOKING
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            bookings.push(self.attach_seats(row).await?);
        }
        Ok(bookings)
    }
}

/// Points balance read against the user record the identity collaborator
/// owns. Credits and debits happen inside the confirm transaction above.
pub struct PgIdentity {
    pool: PgPool,
}

impl PgIdentity {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentity {
    async fn points_balance(&self, user_id: Uuid) -> Result<i64, BookingError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT points FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.map(|(points,)| points)
            .ok_or(BookingError::NotFound("user"))
    }
}
