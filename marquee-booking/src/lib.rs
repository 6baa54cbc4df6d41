pub mod checkout;
pub mod code;
pub mod coordinator;
pub mod reads;
pub mod sweeper;

pub use checkout::CheckoutHandler;
pub use coordinator::ReservationCoordinator;
pub use marquee_core::rules::ReservationRules;
pub use reads::BookingReads;
pub use sweeper::ExpirySweeper;
