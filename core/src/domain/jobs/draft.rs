//! Raw job submission input and its validated draft.

use chrono::{DateTime, Utc};

use crate::domain::identity::UserId;
use crate::domain::validation::{ValidationErrors, ViolationKind};

/// Service name that requires a custom description.
pub const OTHER_SERVICE: &str = "other";
/// Maximum length of the service name.
pub const SERVICE_MAX: usize = 50;
/// Maximum length of a custom service description.
pub const CUSTOM_SERVICE_MAX: usize = 255;
/// Maximum length of the street address.
pub const ADDRESS_MAX: usize = 255;
/// Maximum length of the location/area name.
pub const LOCATION_MAX: usize = 100;

/// Unvalidated job submission as entered by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetails {
    pub service: String,
    pub custom_service: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub address: String,
    pub location: String,
    pub description: String,
    pub urgent: bool,
}

/// Validated submission ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub client_id: UserId,
    pub service: String,
    pub custom_service: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub address: String,
    pub location: String,
    pub description: String,
    pub urgent: bool,
}

fn required(value: &str, max: Option<usize>) -> Result<String, ViolationKind> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ViolationKind::Missing);
    }
    match max {
        Some(max) if trimmed.chars().count() > max => Err(ViolationKind::TooLong { max }),
        _ => Ok(trimmed.to_owned()),
    }
}

impl JobDetails {
    /// Validate every field for `client_id`, reporting all violations at once.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use kaakazini_core::domain::{JobDetails, UserId};
    ///
    /// let errors = JobDetails::default()
    ///     .validate(UserId::random(), Utc::now())
    ///     .unwrap_err();
    /// for field in ["service", "schedule", "address", "location", "description"] {
    ///     assert!(errors.contains(field));
    /// }
    /// ```
    pub fn validate(
        self,
        client_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<JobDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let service = errors.collect("service", required(&self.service, Some(SERVICE_MAX)));
        let custom_service = match service.as_deref() {
            Some(name) if name.eq_ignore_ascii_case(OTHER_SERVICE) => errors.collect(
                "customService",
                required(
                    self.custom_service.as_deref().unwrap_or_default(),
                    Some(CUSTOM_SERVICE_MAX),
                ),
            ),
            _ => None,
        };
        let scheduled_at = match self.scheduled_at {
            None => {
                errors.push("schedule", ViolationKind::Missing);
                None
            }
            Some(at) if at < now => {
                errors.push("schedule", ViolationKind::InPast);
                None
            }
            Some(at) => Some(at),
        };
        let address = errors.collect("address", required(&self.address, Some(ADDRESS_MAX)));
        let location = errors.collect("location", required(&self.location, Some(LOCATION_MAX)));
        let description = errors.collect("description", required(&self.description, None));

        match (service, scheduled_at, address, location, description) {
            (Some(service), Some(scheduled_at), Some(address), Some(location), Some(description))
                if errors.is_empty() =>
            {
                Ok(JobDraft {
                    client_id,
                    service,
                    custom_service,
                    scheduled_at,
                    address,
                    location,
                    description,
                    urgent: self.urgent,
                })
            }
            _ => Err(errors),
        }
    }
}
