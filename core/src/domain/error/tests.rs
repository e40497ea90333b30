//! Tests for error codes and presentation payloads.

use super::*;
use crate::domain::validation::ViolationKind;
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;

#[rstest]
#[case(Error::Unauthenticated, ErrorCode::Unauthenticated)]
#[case(Error::SessionExpired, ErrorCode::SessionExpired)]
#[case(Error::InvalidCredentials, ErrorCode::InvalidCredentials)]
#[case(Error::Forbidden(DenyReason::NotOwner), ErrorCode::Forbidden)]
#[case(Error::InvalidAmount(-1), ErrorCode::InvalidAmount)]
#[case(Error::network("timeout"), ErrorCode::NetworkError)]
#[case(Error::not_found("job", "42"), ErrorCode::NotFound)]
fn variants_map_to_stable_codes(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn codes_serialise_as_snake_case() {
    let json = serde_json::to_value(ErrorCode::AlreadyPaid).expect("serialise code");
    assert_eq!(json, json!("already_paid"));
}

#[rstest]
fn forbidden_payload_names_the_reason() {
    let payload = Error::Forbidden(DenyReason::NotOwner).to_payload();
    assert_eq!(payload.code, ErrorCode::Forbidden);
    assert_eq!(payload.details, Some(json!({ "reason": "not_owner" })));
}

#[rstest]
fn validation_payload_lists_every_field() {
    let mut errors = ValidationErrors::new();
    errors.push("service", ViolationKind::Missing);
    errors.push("address", ViolationKind::Missing);

    let payload = Error::from(errors).to_payload();
    assert_eq!(payload.code, ErrorCode::ValidationFailed);
    assert_eq!(
        payload.details,
        Some(json!([
            { "field": "service", "kind": "missing" },
            { "field": "address", "kind": "missing" }
        ]))
    );
}

#[rstest]
fn already_paid_payload_carries_payment_id() {
    let id = PaymentId::from_uuid(Uuid::nil());
    let payload = Error::AlreadyPaid(id).to_payload();
    assert_eq!(
        payload.details,
        Some(json!({ "paymentId": "00000000-0000-0000-0000-000000000000" }))
    );
}

#[rstest]
#[case(Error::Unauthenticated, true)]
#[case(Error::SessionExpired, true)]
#[case(Error::Forbidden(DenyReason::InsufficientRole), false)]
fn session_loss_classification(#[case] error: Error, #[case] expected: bool) {
    assert_eq!(error.is_session_loss(), expected);
}

#[rstest]
fn only_network_errors_are_retryable() {
    assert!(Error::network("down").is_retryable());
    assert!(!Error::AlreadyPaid(PaymentId::random()).is_retryable());
}
