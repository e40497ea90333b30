//! Shared fixtures for unit and behaviour tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::{ContactPhone, DisplayName, Email, Identity, JobDetails, Role, UserId};

/// Fixed instant most fixtures are anchored to.
pub fn fixture_time() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 4, 14, 9, 30, 0).single() {
        Some(time) => time,
        None => panic!("valid fixture timestamp"),
    }
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock_clock() = now;
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::new(fixture_time())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Identity with an email derived from `name`.
pub fn identity(role: Role, name: &str) -> Identity {
    let slug: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    let (Ok(display_name), Ok(email), Ok(phone)) = (
        DisplayName::new(name),
        Email::new(format!("{slug}@example.com")),
        ContactPhone::new("0712345678"),
    ) else {
        panic!("fixture identity for {name} must be valid");
    };
    Identity::new(UserId::random(), role, display_name, email, Some(phone))
}

/// Plumbing request scheduled a day after `now`.
pub fn job_details(now: DateTime<Utc>) -> JobDetails {
    JobDetails {
        service: "Plumbing".to_owned(),
        custom_service: None,
        scheduled_at: Some(now + Duration::days(1)),
        address: "12 Moi Avenue".to_owned(),
        location: "Nairobi".to_owned(),
        description: "Leaking kitchen tap".to_owned(),
        urgent: false,
    }
}
