//! Payment settlement values.
//!
//! A payment is created once for a completed, quoted job. Its company cut and
//! net figures are always derived from `amount` on read and never stored.
//! `Pending -> Paid` and `Pending -> Cancelled` are the only transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::Error;
use super::identity::UserId;
use super::jobs::JobId;

mod payout;

pub use payout::PayoutInstruction;

/// Company cut expressed in basis points of the payment amount (10%).
pub const COMPANY_CUT_BASIS_POINTS: i64 = 1_000;
const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// Stable payment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting release.
    Pending,
    /// Disbursed. Terminal.
    Paid,
    /// Withdrawn before release. Terminal.
    Cancelled,
}

impl PaymentStatus {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-negative amount in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Validate a raw amount.
    pub fn new(value: i64) -> Result<Self, Error> {
        if value < 0 {
            return Err(Error::InvalidAmount(value));
        }
        Ok(Self(value))
    }

    /// Raw integer value.
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Company cut and net payment for this amount.
    pub fn figures(self) -> PaymentFigures {
        let cut = i128::from(self.0) * i128::from(COMPANY_CUT_BASIS_POINTS)
            / i128::from(BASIS_POINTS_PER_UNIT);
        // cut <= amount, so it always fits back into i64.
        let company_cut = i64::try_from(cut).unwrap_or(self.0);
        PaymentFigures {
            amount: self.0,
            company_cut,
            net_payment: self.0 - company_cut,
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Derived settlement figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFigures {
    pub amount: i64,
    pub company_cut: i64,
    pub net_payment: i64,
}

/// Compute the company cut and net payment for `amount`.
///
/// The cut is `floor(amount * 0.10)`, so `company_cut + net_payment == amount`.
///
/// # Examples
/// ```
/// use kaakazini_core::domain::compute_figures;
///
/// let figures = compute_figures(1_005).unwrap();
/// assert_eq!(figures.company_cut, 100);
/// assert_eq!(figures.net_payment, 905);
/// assert!(compute_figures(-1).is_err());
/// ```
pub fn compute_figures(amount: i64) -> Result<PaymentFigures, Error> {
    Amount::new(amount).map(Amount::figures)
}

/// Parent job of a payment, as needed for scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentJobRef {
    pub job_id: JobId,
    pub client_id: UserId,
    pub craftsman_id: Option<UserId>,
}

/// Settlement of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PaymentRecord", from = "PaymentRecord")]
pub struct Payment {
    id: PaymentId,
    job: PaymentJobRef,
    amount: Amount,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
}

impl Payment {
    /// New `Pending` payment for `job`.
    pub fn create(
        id: PaymentId,
        job: PaymentJobRef,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job,
            amount,
            status: PaymentStatus::Pending,
            created_at,
        }
    }

    /// Server-assigned identifier.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Parent job and its parties.
    pub fn job(&self) -> &PaymentJobRef {
        &self.job
    }

    /// Gross amount charged to the client.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Current status.
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// When the payment was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Derived company cut and net payment.
    pub fn figures(&self) -> PaymentFigures {
        self.amount.figures()
    }

    /// `Pending -> Paid`. A second release reports [`Error::AlreadyPaid`].
    pub fn release(&mut self) -> Result<(), Error> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Paid;
                Ok(())
            }
            PaymentStatus::Paid => Err(Error::AlreadyPaid(self.id)),
            PaymentStatus::Cancelled => Err(Error::invalid_state(format!(
                "payment {} is cancelled",
                self.id
            ))),
        }
    }

    /// `Pending -> Cancelled`.
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Cancelled;
                Ok(())
            }
            status => Err(Error::invalid_state(format!(
                "cannot cancel a {status} payment"
            ))),
        }
    }
}

/// Flat, serialisable representation of a [`Payment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub job_id: JobId,
    pub client_id: UserId,
    #[serde(default)]
    pub craftsman_id: Option<UserId>,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for Payment {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            job: PaymentJobRef {
                job_id: record.job_id,
                client_id: record.client_id,
                craftsman_id: record.craftsman_id,
            },
            amount: record.amount,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

impl From<Payment> for PaymentRecord {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            job_id: payment.job.job_id,
            client_id: payment.job.client_id,
            craftsman_id: payment.job.craftsman_id,
            amount: payment.amount,
            status: payment.status,
            created_at: payment.created_at,
        }
    }
}

#[cfg(test)]
mod tests;
