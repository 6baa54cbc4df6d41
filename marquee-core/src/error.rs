use thiserror::Error;

/// Error taxonomy for the reservation and booking lifecycle.
///
/// Business errors are terminal for the request that raised them; only
/// `Infrastructure` is a candidate for retry, and only during lease
/// acquisition. `CodeCollision` is internal: the coordinator retries with a
/// fresh booking code and converts it to `Infrastructure` once retries are
/// exhausted, so it never reaches a caller.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("seat is locked by another user")]
    SeatAlreadyLocked,

    #[error("seat has already been sold")]
    SeatAlreadySold,

    #[error("a pending booking already exists for this showing")]
    DuplicatePendingBooking,

    #[error("booking is not pending")]
    BookingNotPending,

    #[error("booking has expired")]
    BookingExpired,

    #[error("insufficient loyalty points")]
    InsufficientPoints,

    #[error("booking code collision")]
    CodeCollision,

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl BookingError {
    pub fn infrastructure(err: impl std::fmt::Display) -> Self {
        BookingError::Infrastructure(err.to_string())
    }

    /// Stable machine-readable kind, preserved across the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::SeatAlreadyLocked => "SEAT_ALREADY_LOCKED",
            BookingError::SeatAlreadySold => "SEAT_ALREADY_SOLD",
            BookingError::DuplicatePendingBooking => "DUPLICATE_PENDING_BOOKING",
            BookingError::BookingNotPending => "BOOKING_NOT_PENDING",
            BookingError::BookingExpired => "BOOKING_EXPIRED",
            BookingError::InsufficientPoints => "INSUFFICIENT_POINTS",
            BookingError::CodeCollision => "INTERNAL_ERROR",
            BookingError::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }

    /// Retryable by callers; everything else is a business outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, BookingError::Infrastructure(_))
    }
}
