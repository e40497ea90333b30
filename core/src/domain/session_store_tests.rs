//! Tests for the session store.

use std::sync::Arc;

use chrono::Duration;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::MockGateway;
use crate::domain::{ErrorCode, RegistrationForm};
use crate::outbound::credentials::MemoryCredentialStore;
use crate::test_support::{MutableClock, fixture_time, identity};

struct Harness {
    store: SessionStore<MockGateway>,
    slot: Arc<MemoryCredentialStore>,
}

fn harness(gateway: MockGateway, slot: MemoryCredentialStore) -> Harness {
    let slot = Arc::new(slot);
    let store = SessionStore::new(
        Arc::new(gateway),
        slot.clone(),
        Arc::new(MutableClock::new(fixture_time())),
    );
    Harness { store, slot }
}

#[fixture]
fn credentials() -> LoginCredentials {
    LoginCredentials::try_from_parts("amina@example.com", "correct-horse").expect("credentials")
}

#[fixture]
fn assertion() -> SessionAssertion {
    SessionAssertion::new("tok-1", Some(fixture_time() + Duration::hours(1)))
}

#[tokio::test]
async fn sign_in_resolves_identity_from_gateway() {
    let client = identity(Role::Client, "Amina");
    let expected = client.clone();
    let issued = assertion();
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(move |_| Ok(issued));
    gateway
        .expect_fetch_identity()
        .withf(|assertion| assertion.bearer() == "tok-1")
        .times(1)
        .return_once(move |_| Ok(client));

    let h = harness(gateway, MemoryCredentialStore::new());
    let session = h.store.sign_in(credentials()).await.expect("sign in");

    assert_eq!(session.identity(), Some(&expected));
    assert_eq!(session.expires_at(), assertion().expires_at());
    assert_eq!(h.slot.load().expect("slot"), Some(assertion()));
    assert_eq!(h.store.actor().await.expect("actor").identity(), Some(&expected));
}

#[tokio::test]
async fn wrong_password_leaves_session_unauthenticated() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(|_| Err(GatewayError::unauthorized("bad password")));
    gateway.expect_fetch_identity().times(0);

    let h = harness(gateway, MemoryCredentialStore::new());
    let err = h.store.sign_in(credentials()).await.expect_err("rejected");

    assert_eq!(err, Error::InvalidCredentials);
    assert_eq!(h.store.session().await, Session::Unauthenticated);
    assert_eq!(h.slot.load().expect("slot"), None);
    assert_eq!(h.store.actor().await.expect_err("no actor"), Error::Unauthenticated);
}

#[rstest]
#[case(GatewayError::unavailable("connection refused"))]
#[case(GatewayError::timeout("30s"))]
#[tokio::test]
async fn unreachable_gateway_is_a_network_error(#[case] failure: GatewayError) {
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(move |_| Err(failure));

    let h = harness(gateway, MemoryCredentialStore::new());
    let err = h.store.sign_in(credentials()).await.expect_err("offline");

    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert!(err.is_retryable());
}

#[rstest]
#[case(GatewayError::unauthorized("expired google token"), ErrorCode::FederatedIdentityRejected)]
#[case(GatewayError::conflict("bound to craftsman"), ErrorCode::RoleConflict)]
#[tokio::test]
async fn federated_failures_are_typed(#[case] failure: GatewayError, #[case] code: ErrorCode) {
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(move |_| Err(failure));

    let h = harness(gateway, MemoryCredentialStore::new());
    let token = FederatedToken::new("google-id-token").expect("token");
    let err = h
        .store
        .sign_in_with_federated_token(token, Role::Client)
        .await
        .expect_err("rejected");

    assert_eq!(err.code(), code);
    assert_eq!(h.store.session().await, Session::Unauthenticated);
}

#[tokio::test]
async fn federated_role_is_revalidated_against_fetched_identity() {
    let craftsman = identity(Role::Craftsman, "Juma");
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(|_| Ok(assertion()));
    gateway
        .expect_fetch_identity()
        .times(1)
        .return_once(move |_| Ok(craftsman));
    gateway
        .expect_revoke_session()
        .times(1)
        .return_once(|_| Ok(()));

    let h = harness(gateway, MemoryCredentialStore::new());
    let token = FederatedToken::new("google-id-token").expect("token");
    let err = h
        .store
        .sign_in_with_federated_token(token, Role::Client)
        .await
        .expect_err("role mismatch");

    assert_eq!(
        err,
        Error::RoleConflict {
            requested: Role::Client
        }
    );
    assert!(!h.store.session().await.is_authenticated());
    assert_eq!(h.slot.load().expect("slot"), None);
}

#[tokio::test]
async fn admin_accounts_cannot_self_register() {
    let mut gateway = MockGateway::new();
    gateway.expect_register().times(0);

    let form = RegistrationForm {
        email: "root@example.com",
        password: "long-enough",
        display_name: "Root",
        phone: None,
    };
    let registration = Registration::try_new(form, Role::Admin).expect("valid form");
    let h = harness(gateway, MemoryCredentialStore::new());

    let err = h.store.sign_up(registration).await.expect_err("forbidden");
    assert_eq!(err, Error::Forbidden(DenyReason::InsufficientRole));
}

#[tokio::test]
async fn sign_up_registers_then_signs_in() {
    let craftsman = identity(Role::Craftsman, "Juma");
    let mut gateway = MockGateway::new();
    gateway
        .expect_register()
        .withf(|registration| registration.role() == Role::Craftsman)
        .times(1)
        .return_once(|_| Ok(()));
    gateway
        .expect_authenticate()
        .times(1)
        .return_once(|_| Ok(assertion()));
    gateway
        .expect_fetch_identity()
        .times(1)
        .return_once(move |_| Ok(craftsman));

    let form = RegistrationForm {
        email: "juma@example.com",
        password: "long-enough",
        display_name: "Juma",
        phone: Some("0712 345 678"),
    };
    let registration = Registration::try_new(form, Role::Craftsman).expect("valid form");
    let h = harness(gateway, MemoryCredentialStore::new());

    let session = h.store.sign_up(registration).await.expect("signed up");
    assert_eq!(session.role(), Some(Role::Craftsman));
}

#[tokio::test]
async fn duplicate_registration_flags_the_email() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_register()
        .times(1)
        .return_once(|_| Err(GatewayError::conflict("email exists")));
    gateway.expect_authenticate().times(0);

    let form = RegistrationForm {
        email: "amina@example.com",
        password: "long-enough",
        display_name: "Amina",
        phone: None,
    };
    let registration = Registration::try_new(form, Role::Client).expect("valid form");
    let h = harness(gateway, MemoryCredentialStore::new());

    match h.store.sign_up(registration).await {
        Err(Error::Validation(errors)) => assert!(errors.contains("email")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_clears_session_on_authorization_failure() {
    let client = identity(Role::Client, "Amina");
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .return_once(|_| Ok(assertion()));
    let mut calls = 0;
    gateway.expect_fetch_identity().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Ok(client.clone())
        } else {
            Err(GatewayError::unauthorized("revoked"))
        }
    });

    let h = harness(gateway, MemoryCredentialStore::new());
    h.store.sign_in(credentials()).await.expect("sign in");

    let refreshed = h.store.refresh_identity().await.expect("refresh");
    assert!(refreshed.is_none());
    assert_eq!(h.store.session().await, Session::Unauthenticated);
    assert_eq!(h.slot.load().expect("slot"), None);
}

#[tokio::test]
async fn refresh_keeps_session_when_gateway_is_unreachable() {
    let client = identity(Role::Client, "Amina");
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_identity()
        .times(1)
        .return_once(|_| Err(GatewayError::unavailable("dns failure")));

    let h = harness(gateway, MemoryCredentialStore::new());
    {
        let mut state = h.store.state.write().await;
        state.session = Session::authenticated(client, None);
        state.assertion = Some(assertion());
    }

    let err = h.store.refresh_identity().await.expect_err("offline");
    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert!(h.store.session().await.is_authenticated());
}

#[tokio::test]
async fn restore_rehydrates_from_slot() {
    let admin = identity(Role::Admin, "Wanjiru");
    let expected = admin.clone();
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_identity()
        .with(eq(assertion()))
        .times(1)
        .return_once(move |_| Ok(admin));

    let h = harness(gateway, MemoryCredentialStore::with_assertion(assertion()));
    let restored = h.store.restore().await.expect("restore");

    assert_eq!(restored, Some(expected));
    assert!(h.store.session().await.is_authenticated());
}

#[tokio::test]
async fn restore_discards_expired_assertion_without_calling_gateway() {
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_identity().times(0);
    let stale = SessionAssertion::new("old", Some(fixture_time() - Duration::minutes(1)));

    let h = harness(gateway, MemoryCredentialStore::with_assertion(stale));
    assert_eq!(h.store.restore().await.expect("restore"), None);
    assert_eq!(h.slot.load().expect("slot"), None);
}

fn password_is(request: &AuthenticationRequest, expected: &str) -> bool {
    matches!(request, AuthenticationRequest::Password(given) if given.password() == expected)
}

#[tokio::test]
async fn failed_sign_in_drops_the_replaced_session_everywhere() {
    let client = identity(Role::Client, "Amina");
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .withf(|request| password_is(request, "correct-horse"))
        .times(1)
        .return_once(|_| Ok(assertion()));
    gateway
        .expect_authenticate()
        .withf(|request| password_is(request, "wrong-horse"))
        .times(1)
        .return_once(|_| Err(GatewayError::unauthorized("bad password")));
    gateway
        .expect_fetch_identity()
        .times(1)
        .return_once(move |_| Ok(client));
    gateway
        .expect_revoke_session()
        .withf(|revoked| revoked.bearer() == "tok-1")
        .times(1)
        .return_once(|_| Ok(()));

    let h = harness(gateway, MemoryCredentialStore::new());
    h.store.sign_in(credentials()).await.expect("first sign in");
    let wrong = LoginCredentials::try_from_parts("amina@example.com", "wrong-horse")
        .expect("credentials");
    let err = h.store.sign_in(wrong).await.expect_err("rejected");

    assert_eq!(err, Error::InvalidCredentials);
    assert_eq!(h.store.session().await, Session::Unauthenticated);
    assert_eq!(h.slot.load().expect("slot"), None);

    let restarted = SessionStore::new(
        Arc::new(MockGateway::new()),
        h.slot.clone(),
        Arc::new(MutableClock::new(fixture_time())),
    );
    assert_eq!(restarted.restore().await.expect("restore"), None);
}

#[tokio::test]
async fn replacing_a_session_revokes_the_old_one_even_if_revoke_fails() {
    let first = identity(Role::Client, "Amina");
    let second = identity(Role::Craftsman, "Juma");
    let expected = second.clone();
    let mut issued = vec![SessionAssertion::new("tok-2", None), assertion()];
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .times(2)
        .returning(move |_| Ok(issued.pop().expect("issued assertion")));
    gateway
        .expect_fetch_identity()
        .withf(|assertion| assertion.bearer() == "tok-1")
        .return_once(move |_| Ok(first));
    gateway
        .expect_fetch_identity()
        .withf(|assertion| assertion.bearer() == "tok-2")
        .return_once(move |_| Ok(second));
    gateway
        .expect_revoke_session()
        .withf(|revoked| revoked.bearer() == "tok-1")
        .times(1)
        .return_once(|_| Err(GatewayError::unavailable("offline")));

    let h = harness(gateway, MemoryCredentialStore::new());
    h.store.sign_in(credentials()).await.expect("first sign in");
    let session = h.store.sign_in(credentials()).await.expect("second sign in");

    assert_eq!(session.identity(), Some(&expected));
    assert_eq!(
        h.slot.load().expect("slot"),
        Some(SessionAssertion::new("tok-2", None))
    );
}

#[tokio::test]
async fn sign_out_clears_locally_even_when_revoke_fails() {
    let client = identity(Role::Client, "Amina");
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .return_once(|_| Ok(assertion()));
    gateway
        .expect_fetch_identity()
        .return_once(move |_| Ok(client));
    gateway
        .expect_revoke_session()
        .times(1)
        .return_once(|_| Err(GatewayError::unavailable("offline")));

    let h = harness(gateway, MemoryCredentialStore::new());
    h.store.sign_in(credentials()).await.expect("sign in");
    h.store.sign_out().await;

    assert_eq!(h.store.session().await, Session::Unauthenticated);
    assert_eq!(h.slot.load().expect("slot"), None);
}

#[tokio::test]
async fn stale_rejection_does_not_clear_newer_session() {
    let client = identity(Role::Client, "Amina");
    let mut gateway = MockGateway::new();
    gateway
        .expect_authenticate()
        .return_once(|_| Ok(assertion()));
    gateway
        .expect_fetch_identity()
        .return_once(move |_| Ok(client));

    let h = harness(gateway, MemoryCredentialStore::new());
    h.store.sign_in(credentials()).await.expect("sign in");

    let superseded = SessionAssertion::new("tok-0", None);
    assert!(!h.store.invalidate_if_current(&superseded).await);
    assert!(h.store.session().await.is_authenticated());

    assert!(h.store.invalidate_if_current(&assertion()).await);
    assert_eq!(h.store.session().await, Session::Unauthenticated);
}

#[tokio::test]
async fn snapshot_reports_pending_while_store_is_busy() {
    let h = harness(MockGateway::new(), MemoryCredentialStore::new());
    let guard = h.store.state.write().await;
    assert_eq!(h.store.snapshot(), Session::Pending);
    drop(guard);
    assert_eq!(h.store.snapshot(), Session::Unauthenticated);
}
