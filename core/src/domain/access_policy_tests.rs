//! Tests for the access policy.

use chrono::{Duration, TimeZone};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::identity::{ContactPhone, DisplayName, Email, UserId};
use crate::domain::jobs::{JobDetails, JobId};
use crate::domain::payments::{Amount, PaymentId, PaymentJobRef};

fn at() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 4, 14, 9, 30, 0).single() {
        Some(time) => time,
        None => panic!("valid timestamp"),
    }
}

fn person(role: Role) -> Identity {
    Identity::new(
        UserId::random(),
        role,
        DisplayName::new("Someone").expect("name"),
        Email::new("someone@example.com").expect("email"),
        ContactPhone::new("0712345678").ok(),
    )
}

fn live(identity: &Identity) -> Session {
    Session::authenticated(identity.clone(), Some(at() + Duration::hours(1)))
}

struct World {
    client: Identity,
    craftsman: Identity,
    admin: Identity,
    stranger_client: Identity,
    stranger_craftsman: Identity,
    job: JobRequest,
    payment: Payment,
}

#[fixture]
fn world() -> World {
    let client = person(Role::Client);
    let craftsman = person(Role::Craftsman);
    let details = JobDetails {
        service: "Carpentry".to_owned(),
        scheduled_at: Some(at() + Duration::days(2)),
        address: "4 Kenyatta Road".to_owned(),
        location: "Mombasa".to_owned(),
        description: "Fix a wardrobe door".to_owned(),
        ..JobDetails::default()
    };
    let draft = details.validate(client.id(), at()).expect("valid details");
    let mut job = JobRequest::create(JobId::random(), draft, at());
    job.assign(craftsman.id()).expect("assign");
    let payment = Payment::create(
        PaymentId::random(),
        PaymentJobRef {
            job_id: job.id(),
            client_id: client.id(),
            craftsman_id: Some(craftsman.id()),
        },
        Amount::new(4_000).expect("amount"),
        at(),
    );
    World {
        client,
        craftsman,
        admin: person(Role::Admin),
        stranger_client: person(Role::Client),
        stranger_craftsman: person(Role::Craftsman),
        job,
        payment,
    }
}

#[derive(Debug, Clone, Copy)]
enum Who {
    Client,
    Craftsman,
    Admin,
    StrangerClient,
    StrangerCraftsman,
}

impl World {
    fn who(&self, who: Who) -> &Identity {
        match who {
            Who::Client => &self.client,
            Who::Craftsman => &self.craftsman,
            Who::Admin => &self.admin,
            Who::StrangerClient => &self.stranger_client,
            Who::StrangerCraftsman => &self.stranger_craftsman,
        }
    }
}

#[rstest]
#[case(Who::Client, Decision::Allow)]
#[case(Who::Craftsman, Decision::Allow)]
#[case(Who::Admin, Decision::Allow)]
#[case(Who::StrangerClient, Decision::Deny(DenyReason::NotOwner))]
#[case(Who::StrangerCraftsman, Decision::Deny(DenyReason::NotOwner))]
fn job_access_follows_ownership(world: World, #[case] who: Who, #[case] expected: Decision) {
    let session = live(world.who(who));
    assert_eq!(authorize(&session, &Action::ViewJob(&world.job), at()), expected);
    assert_eq!(authorize(&session, &Action::MutateJob(&world.job), at()), expected);
}

#[rstest]
#[case(Who::Client, Decision::Allow)]
#[case(Who::Admin, Decision::Allow)]
#[case(Who::Craftsman, Decision::Deny(DenyReason::NotOwner))]
#[case(Who::StrangerClient, Decision::Deny(DenyReason::NotOwner))]
fn payment_visibility(world: World, #[case] who: Who, #[case] expected: Decision) {
    let session = live(world.who(who));
    let decision = authorize(&session, &Action::ViewPayment(&world.payment), at());
    assert_eq!(decision, expected);
}

#[rstest]
#[case(Who::Client)]
#[case(Who::Craftsman)]
#[case(Who::StrangerClient)]
#[case(Who::StrangerCraftsman)]
fn only_admins_settle_or_administer(world: World, #[case] who: Who) {
    let session = live(world.who(who));
    let actions = [
        Action::ReleasePayment(&world.payment),
        Action::CancelPayment(&world.payment),
        Action::AssignJob(&world.job),
        Action::QuoteJob(&world.job),
    ];
    for action in &actions {
        assert_eq!(
            authorize(&session, action, at()),
            Decision::Deny(DenyReason::InsufficientRole),
            "{} allowed for {who:?}",
            action.name()
        );
    }
}

#[rstest]
fn admin_settles_and_administers(world: World) {
    let session = live(&world.admin);
    for action in [
        Action::ReleasePayment(&world.payment),
        Action::CancelPayment(&world.payment),
        Action::AssignJob(&world.job),
        Action::QuoteJob(&world.job),
    ] {
        assert!(authorize(&session, &action, at()).is_allowed());
    }
}

#[rstest]
#[case(Who::Client, Decision::Allow)]
#[case(Who::Craftsman, Decision::Deny(DenyReason::InsufficientRole))]
#[case(Who::Admin, Decision::Deny(DenyReason::InsufficientRole))]
fn only_clients_submit(world: World, #[case] who: Who, #[case] expected: Decision) {
    let session = live(world.who(who));
    assert_eq!(authorize(&session, &Action::SubmitJob, at()), expected);
}

#[rstest]
#[case(Session::Unauthenticated)]
#[case(Session::Pending)]
fn missing_identity_is_unauthenticated(world: World, #[case] session: Session) {
    let decision = authorize(&session, &Action::ViewJob(&world.job), at());
    assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
}

#[rstest]
#[case(Duration::zero())]
#[case(Duration::seconds(1))]
#[case(Duration::days(30))]
fn lapsed_sessions_are_expired_even_for_admins(world: World, #[case] past_expiry: Duration) {
    let expiry = at() + Duration::hours(1);
    let session = Session::authenticated(world.admin.clone(), Some(expiry));
    let decision = authorize(
        &session,
        &Action::ReleasePayment(&world.payment),
        expiry + past_expiry,
    );
    assert_eq!(decision, Decision::Deny(DenyReason::Expired));
}

#[rstest]
fn sessions_without_expiry_do_not_lapse(world: World) {
    let session = Session::authenticated(world.client.clone(), None);
    let later = at() + Duration::days(365);
    assert!(authorize(&session, &Action::ViewJob(&world.job), later).is_allowed());
}

#[rstest]
#[case(DenyReason::Unauthenticated, Error::Unauthenticated)]
#[case(DenyReason::Expired, Error::SessionExpired)]
#[case(DenyReason::NotOwner, Error::Forbidden(DenyReason::NotOwner))]
#[case(
    DenyReason::InsufficientRole,
    Error::Forbidden(DenyReason::InsufficientRole)
)]
fn denials_map_to_typed_errors(#[case] reason: DenyReason, #[case] expected: Error) {
    assert_eq!(Decision::Deny(reason).into_result(), Err(expected));
}

#[test]
fn deny_reasons_serialise_in_snake_case() {
    let json = serde_json::to_string(&DenyReason::InsufficientRole).expect("serialise");
    assert_eq!(json, "\"insufficient_role\"");
}
