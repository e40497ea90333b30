//! Mobile-money disbursement instruction for a released payment.

use serde::Serialize;

use super::{Payment, PaymentStatus};
use crate::domain::error::Error;
use crate::domain::identity::ContactPhone;

/// STK-push style payout of a payment's net figure to the craftsman.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutInstruction {
    /// Recipient in `254XXXXXXXXX` form.
    pub msisdn: String,
    /// Net payment; the company cut is retained.
    pub amount: i64,
    /// `job_<job id>`, used to reconcile the disbursement.
    pub reference: String,
    pub description: String,
}

impl PayoutInstruction {
    /// Build the instruction for a `Paid` payment.
    pub fn for_payment(payment: &Payment, phone: &ContactPhone) -> Result<Self, Error> {
        if payment.status() != PaymentStatus::Paid {
            return Err(Error::invalid_state(format!(
                "payment {} is {} and cannot be disbursed",
                payment.id(),
                payment.status()
            )));
        }
        let job_id = payment.job().job_id;
        Ok(Self {
            msisdn: phone.to_msisdn(),
            amount: payment.figures().net_payment,
            reference: format!("job_{job_id}"),
            description: format!("Payment for job {job_id}"),
        })
    }
}
