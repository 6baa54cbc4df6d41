use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::Booking;
use crate::error::BookingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Ewallet,
    BankTransfer,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Ewallet => "EWALLET",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cash => "CASH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CARD" => Some(PaymentMethod::Card),
            "EWALLET" => Some(PaymentMethod::Ewallet),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            "CASH" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Payment sub-record attached to a booking. Terminal bookings keep their
/// payments; a booking may accumulate more than one across retried
/// checkouts, but at most one is PENDING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: PaymentMethod,
    pub amount: i64,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, method: PaymentMethod, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            method,
            amount,
            status: PaymentStatus::Pending,
            transaction_id: None,
            payment_url: None,
            paid_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Redirect reference handed back to the client so it can complete payment
/// with the external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub redirect_url: String,
    pub reference: String,
}

/// External payment collaborator. The gateway owns URL signing and callback
/// verification; this core only asks it for an intent and later receives the
/// verified transaction id through `confirm_payment`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        booking: &Booking,
        method: PaymentMethod,
        amount: i64,
    ) -> Result<PaymentIntent, BookingError>;
}
