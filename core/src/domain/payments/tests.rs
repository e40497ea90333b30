//! Tests for payment figures, transitions and payouts.

use chrono::TimeZone;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::identity::ContactPhone;

#[fixture]
fn payment() -> Payment {
    let created_at = Utc
        .with_ymd_and_hms(2026, 6, 1, 8, 0, 0)
        .single()
        .expect("valid fixture timestamp");
    Payment::create(
        PaymentId::random(),
        PaymentJobRef {
            job_id: JobId::random(),
            client_id: UserId::random(),
            craftsman_id: Some(UserId::random()),
        },
        Amount::new(1_000).expect("amount"),
        created_at,
    )
}

#[rstest]
#[case(0, 0, 0)]
#[case(9, 0, 9)]
#[case(10, 1, 9)]
#[case(1_000, 100, 900)]
#[case(1_999, 199, 1_800)]
#[case(i64::MAX, i64::MAX / 10, i64::MAX - i64::MAX / 10)]
fn figures_floor_the_company_cut(#[case] amount: i64, #[case] cut: i64, #[case] net: i64) {
    let figures = compute_figures(amount).expect("non-negative amount");
    assert_eq!(figures.company_cut, cut);
    assert_eq!(figures.net_payment, net);
    assert_eq!(figures.company_cut + figures.net_payment, amount);
}

#[rstest]
fn figures_sum_to_amount_across_a_range() {
    for amount in (0..5_000).step_by(7) {
        let figures = compute_figures(amount).expect("non-negative amount");
        assert_eq!(figures.company_cut, amount / 10);
        assert_eq!(figures.company_cut + figures.net_payment, amount);
    }
}

#[rstest]
fn negative_amount_is_rejected() {
    assert_eq!(compute_figures(-5), Err(Error::InvalidAmount(-5)));
}

#[rstest]
fn release_is_applied_once(mut payment: Payment) {
    payment.release().expect("first release");
    assert_eq!(payment.status(), PaymentStatus::Paid);

    let err = payment.release().expect_err("second release");
    assert_eq!(err, Error::AlreadyPaid(payment.id()));
}

#[rstest]
fn cancelled_payment_cannot_be_released(mut payment: Payment) {
    payment.cancel().expect("cancel pending");
    let err = payment.release().expect_err("cancelled");
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(payment.status(), PaymentStatus::Cancelled);
}

#[rstest]
fn paid_payment_cannot_be_cancelled(mut payment: Payment) {
    payment.release().expect("release");
    let err = payment.cancel().expect_err("paid is terminal");
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(payment.status(), PaymentStatus::Paid);
}

#[rstest]
fn payment_json_never_carries_derived_figures(payment: Payment) {
    let json = serde_json::to_value(&payment).expect("serialise payment");
    assert_eq!(json["amount"], 1_000);
    assert_eq!(json["status"], "pending");
    assert!(json.get("companyCut").is_none());
    assert!(json.get("netPayment").is_none());
}

#[rstest]
fn negative_amount_fails_to_deserialise(payment: Payment) {
    let mut json = serde_json::to_value(&payment).expect("serialise payment");
    json["amount"] = serde_json::json!(-1);
    assert!(serde_json::from_value::<Payment>(json).is_err());
}

#[rstest]
fn payout_uses_net_figure_and_job_reference(mut payment: Payment) {
    payment.release().expect("release");
    let phone = ContactPhone::new("0712 345 678").expect("phone");

    let payout = PayoutInstruction::for_payment(&payment, &phone).expect("paid payment");
    assert_eq!(payout.msisdn, "254712345678");
    assert_eq!(payout.amount, 900);
    assert_eq!(payout.reference, format!("job_{}", payment.job().job_id));
}

#[rstest]
fn payout_requires_paid_payment(payment: Payment) {
    let phone = ContactPhone::new("+254712345678").expect("phone");
    let err = PayoutInstruction::for_payment(&payment, &phone).expect_err("pending");
    assert_eq!(err.code(), ErrorCode::InvalidState);
}
