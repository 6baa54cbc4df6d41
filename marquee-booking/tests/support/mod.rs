#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use marquee_booking::checkout::MockPaymentGateway;
use marquee_booking::{BookingReads, CheckoutHandler, ExpirySweeper, ReservationCoordinator, ReservationRules};
use marquee_core::booking::{Booking, BookingSeat, BookingStatus};
use marquee_core::catalog::{CatalogProvider, Showing, ShowingStatus};
use marquee_core::error::BookingError;
use marquee_core::identity::IdentityProvider;
use marquee_core::ledger::{BookingLedger, NewReservation, SeatLedger};
use marquee_core::lease::LeaseStore;
use marquee_core::notify::NotificationPublisher;
use marquee_core::payment::{Payment, PaymentStatus};
use marquee_core::seat::{SeatInstance, SeatStatus};
use marquee_shared::events::{BookingEvent, BookingEventKind};

/// TTL-aware in-memory lease store with switchable unavailability so tests
/// can exercise the fail-closed path.
pub struct InMemoryLeaseStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    unavailable: AtomicBool,
    acquire_calls: AtomicU32,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            acquire_calls: AtomicU32::new(0),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn acquire_calls(&self) -> u32 {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn holder_of(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(holder, _)| holder.clone())
    }

    fn check_available(&self) -> Result<(), BookingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BookingError::Infrastructure(
                "lease store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, BookingError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        match entries.get(key) {
            Some((_, expires)) if *expires > now => Ok(false),
            _ => {
                entries.insert(key.to_string(), (holder.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, BookingError> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((current, _)) if current == holder => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_release(&self, key: &str) -> Result<(), BookingError> {
        self.check_available()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn extend(
        &self,
        key: &str,
        holder: &str,
        additional: Duration,
    ) -> Result<bool, BookingError> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some((current, expires)) if current == holder && *expires > Instant::now() => {
                *expires += additional;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
struct LedgerState {
    seats: HashMap<Uuid, SeatInstance>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Vec<Payment>>,
    points: HashMap<Uuid, i64>,
}

/// Combined seat/booking ledger plus identity provider. Every trait method
/// mutates under one mutex acquisition, mirroring the single-transaction
/// guarantee of the durable store.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    fail_next_reserve: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            fail_next_reserve: AtomicBool::new(false),
        }
    }

    /// Make the next `reserve` call fail with an infrastructure error after
    /// leases were already acquired.
    pub fn fail_next_reserve(&self) {
        self.fail_next_reserve.store(true, Ordering::SeqCst);
    }

    pub fn seed_seats(&self, showing_id: Uuid, count: usize, price: i64) -> Vec<Uuid> {
        let mut state = self.state.lock().unwrap();
        (0..count)
            .map(|i| {
                let seat = SeatInstance {
                    id: Uuid::new_v4(),
                    showing_id,
                    row_name: "A".to_string(),
                    seat_number: (i + 1) as i32,
                    seat_type: "STANDARD".to_string(),
                    price,
                    status: SeatStatus::Available,
                    locked_by: None,
                    locked_at: None,
                };
                let id = seat.id;
                state.seats.insert(id, seat);
                id
            })
            .collect()
    }

    pub fn seat(&self, seat_id: Uuid) -> SeatInstance {
        self.state.lock().unwrap().seats[&seat_id].clone()
    }

    pub fn mark_sold(&self, seat_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        state.seats.get_mut(&seat_id).unwrap().sell();
    }

    pub fn booking(&self, booking_id: Uuid) -> Booking {
        self.state.lock().unwrap().bookings[&booking_id].clone()
    }

    pub fn backdate(&self, booking_id: Uuid, expires_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.bookings.get_mut(&booking_id).unwrap().expires_at = expires_at;
    }

    pub fn set_points(&self, user_id: Uuid, points: i64) {
        self.state.lock().unwrap().points.insert(user_id, points);
    }

    pub fn points(&self, user_id: Uuid) -> i64 {
        *self.state.lock().unwrap().points.get(&user_id).unwrap_or(&0)
    }

    pub fn payments_for(&self, booking_id: Uuid) -> Vec<Payment> {
        self.state
            .lock()
            .unwrap()
            .payments
            .get(&booking_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SeatLedger for InMemoryLedger {
    async fn get_seats(&self, seat_ids: &[Uuid]) -> Result<Vec<SeatInstance>, BookingError> {
        let state = self.state.lock().unwrap();
        Ok(seat_ids
            .iter()
            .filter_map(|id| state.seats.get(id).cloned())
            .collect())
    }

    async fn unlock_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError> {
        let mut state = self.state.lock().unwrap();
        for id in seat_ids {
            if let Some(seat) = state.seats.get_mut(id) {
                if seat.is_locked() {
                    seat.unlock();
                }
            }
        }
        Ok(())
    }

    async fn sell_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError> {
        let mut state = self.state.lock().unwrap();
        for id in seat_ids {
            if let Some(seat) = state.seats.get_mut(id) {
                if seat.is_locked() {
                    seat.sell();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BookingLedger for InMemoryLedger {
    async fn reserve(&self, reservation: NewReservation) -> Result<Booking, BookingError> {
        if self.fail_next_reserve.swap(false, Ordering::SeqCst) {
            return Err(BookingError::Infrastructure(
                "durable store unreachable".to_string(),
            ));
        }

        let mut state = self.state.lock().unwrap();
        if state.bookings.values().any(|b| b.code == reservation.code) {
            return Err(BookingError::CodeCollision);
        }
        if state.bookings.values().any(|b| {
            b.user_id == reservation.user_id
                && b.showing_id == reservation.showing_id
                && b.status == BookingStatus::Pending
        }) {
            return Err(BookingError::DuplicatePendingBooking);
        }

        // Validate the whole set before touching any row.
        let mut covered = Vec::with_capacity(reservation.seat_instance_ids.len());
        for id in &reservation.seat_instance_ids {
            let seat = state.seats.get(id).ok_or(BookingError::NotFound("seat"))?;
            if seat.showing_id != reservation.showing_id {
                return Err(BookingError::NotFound("seat"));
            }
            match seat.status {
                SeatStatus::Sold => return Err(BookingError::SeatAlreadySold),
                SeatStatus::Locked => return Err(BookingError::SeatAlreadyLocked),
                SeatStatus::Available => covered.push(BookingSeat {
                    seat_instance_id: *id,
                    price: seat.price,
                }),
            }
        }

        for id in &reservation.seat_instance_ids {
            let seat = state.seats.get_mut(id).unwrap();
            seat.lock(reservation.user_id, reservation.created_at);
        }

        let total: i64 = covered.iter().map(|s| s.price).sum();
        let booking = Booking {
            id: Uuid::new_v4(),
            code: reservation.code,
            user_id: reservation.user_id,
            showing_id: reservation.showing_id,
            seats: covered,
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
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let mut state = self.state.lock().unwrap();
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::NotFound("booking"))?;
        if booking.status != from {
            return Ok(false);
        }
        booking.status = to;
        match to {
            BookingStatus::Confirmed => booking.confirmed_at = Some(at),
            BookingStatus::Cancelled | BookingStatus::Expired => booking.cancelled_at = Some(at),
            BookingStatus::Pending => {}
        }
        Ok(true)
    }

    async fn apply_checkout(
        &self,
        booking_id: Uuid,
        discount_amount: i64,
        points_used: i32,
        final_amount: i64,
        payment: Payment,
    ) -> Result<(), BookingError> {
        let mut state = self.state.lock().unwrap();
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::NotFound("booking"))?;
        booking.discount_amount = discount_amount;
        booking.points_used = points_used;
        booking.final_amount = final_amount;
        state.payments.entry(booking_id).or_default().push(payment);
        Ok(())
    }

    async fn confirm(
        &self,
        booking_id: Uuid,
        transaction_id: &str,
        points_earned: i32,
        at: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let mut state = self.state.lock().unwrap();
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::NotFound("booking"))?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::BookingNotPending);
        }
        booking.status = BookingStatus::Confirmed;
        booking.confirmed_at = Some(at);
        booking.points_earned = points_earned;
        let confirmed = booking.clone();

        let seat_ids = confirmed.seat_ids();
        for id in &seat_ids {
            if let Some(seat) = state.seats.get_mut(id) {
                if seat.is_locked() {
                    seat.sell();
                }
            }
        }

        if let Some(payments) = state.payments.get_mut(&booking_id) {
            if let Some(pending) = payments
                .iter_mut()
                .find(|p| p.status == PaymentStatus::Pending)
            {
                pending.status = PaymentStatus::Completed;
                pending.transaction_id = Some(transaction_id.to_string());
                pending.paid_at = Some(at);
            }
        }

        let delta = (points_earned - confirmed.points_used) as i64;
        *state.points.entry(confirmed.user_id).or_insert(0) += delta;

        Ok(confirmed)
    }

    async fn has_pending(&self, user_id: Uuid, showing_id: Uuid) -> Result<bool, BookingError> {
        let state = self.state.lock().unwrap();
        Ok(state.bookings.values().any(|b| {
            b.user_id == user_id && b.showing_id == showing_id && b.status == BookingStatus::Pending
        }))
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        Ok(self.state.lock().unwrap().bookings.get(&booking_id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BookingError> {
        let state = self.state.lock().unwrap();
        Ok(state.bookings.values().find(|b| b.code == code).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, BookingError> {
        let state = self.state.lock().unwrap();
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at < now)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryLedger {
    async fn points_balance(&self, user_id: Uuid) -> Result<i64, BookingError> {
        Ok(self.points(user_id))
    }
}

pub struct StaticCatalog {
    showings: Mutex<HashMap<Uuid, Showing>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self {
            showings: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_showing(&self, showing: Showing) {
        self.showings.lock().unwrap().insert(showing.id, showing);
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn get_showing(&self, showing_id: Uuid) -> Result<Option<Showing>, BookingError> {
        Ok(self.showings.lock().unwrap().get(&showing_id).cloned())
    }
}

/// Captures published events; can be told to fail so tests can prove the
/// fire-and-forget contract.
pub struct RecordingPublisher {
    events: Mutex<Vec<BookingEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn kinds(&self) -> Vec<BookingEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, event: BookingEvent) -> Result<(), BookingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BookingError::Infrastructure(
                "event broker unreachable".to_string(),
            ));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Fully wired engine over the in-memory collaborators, with one scheduled
/// showing seeded.
pub struct TestEngine {
    pub leases: Arc<InMemoryLeaseStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub catalog: Arc<StaticCatalog>,
    pub publisher: Arc<RecordingPublisher>,
    pub coordinator: ReservationCoordinator,
    pub checkout: CheckoutHandler,
    pub sweeper: ExpirySweeper,
    pub reads: BookingReads,
    pub showing_id: Uuid,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_rules(ReservationRules::default())
    }

    pub fn with_rules(rules: ReservationRules) -> Self {
        let leases = Arc::new(InMemoryLeaseStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let catalog = Arc::new(StaticCatalog::new());
        let publisher = Arc::new(RecordingPublisher::new());

        let showing_id = Uuid::new_v4();
        catalog.add_showing(Showing {
            id: showing_id,
            status: ShowingStatus::Scheduled,
            starts_at: Utc::now() + chrono::Duration::hours(4),
        });

        let coordinator = ReservationCoordinator::new(
            leases.clone(),
            ledger.clone(),
            catalog.clone(),
            publisher.clone(),
            rules.clone(),
        );
        let checkout = CheckoutHandler::new(
            ledger.clone(),
            ledger.clone(),
            leases.clone(),
            ledger.clone(),
            Arc::new(MockPaymentGateway),
            publisher.clone(),
            rules.clone(),
        );
        let sweeper = ExpirySweeper::new(
            ledger.clone(),
            ledger.clone(),
            leases.clone(),
            publisher.clone(),
            rules.sweep_interval(),
        );
        let reads = BookingReads::new(ledger.clone());

        Self {
            leases,
            ledger,
            catalog,
            publisher,
            coordinator,
            checkout,
            sweeper,
            reads,
            showing_id,
        }
    }

    pub fn seed_seats(&self, count: usize, price: i64) -> Vec<Uuid> {
        self.ledger.seed_seats(self.showing_id, count, price)
    }
}
