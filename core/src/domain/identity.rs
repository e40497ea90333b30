//! Actor identity: user ids, roles and contact details.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::validation::ViolationKind;

/// Validation errors returned by identity constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityValidationError {
    /// Identifier was empty.
    #[error("user id must not be empty")]
    EmptyId,
    /// Identifier was not a UUID.
    #[error("user id must be a valid UUID")]
    InvalidId,
    /// Role string did not name a known role.
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    /// Display name failed validation.
    #[error("display name {0}")]
    DisplayName(ViolationKind),
    /// Email failed validation.
    #[error("email {0}")]
    Email(ViolationKind),
    /// Phone number failed validation.
    #[error("phone number {0}")]
    Phone(ViolationKind),
}

/// Stable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Parse a [`UserId`] from its string form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(IdentityValidationError::EmptyId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| IdentityValidationError::InvalidId)
    }

    /// Generate a new random [`UserId`].
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Actor role on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Requester of services.
    Client,
    /// Service provider.
    Craftsman,
    /// Platform operator.
    Admin,
}

impl Role {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Craftsman => "craftsman",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "craftsman" => Ok(Self::Craftsman),
            "admin" => Ok(Self::Admin),
            other => Err(IdentityValidationError::UnknownRole(other.to_owned())),
        }
    }
}

/// Maximum length accepted for a display name.
pub const DISPLAY_NAME_MAX: usize = 100;

/// Human readable name shown for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a display name; surrounding whitespace is trimmed.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ViolationKind> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ViolationKind::Missing);
        }
        if trimmed.chars().count() > DISPLAY_NAME_MAX {
            return Err(ViolationKind::TooLong {
                max: DISPLAY_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).map_err(IdentityValidationError::DisplayName)
    }
}

/// Contact email, trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and normalise an email address.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ViolationKind> {
        let normalised = value.as_ref().trim().to_ascii_lowercase();
        if normalised.is_empty() {
            return Err(ViolationKind::Missing);
        }
        let Some((local, domain)) = normalised.split_once('@') else {
            return Err(ViolationKind::InvalidFormat);
        };
        let well_formed = !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !normalised.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(ViolationKind::InvalidFormat);
        }
        Ok(Self(normalised))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).map_err(IdentityValidationError::Email)
    }
}

const PHONE_MIN_DIGITS: usize = 9;
const PHONE_MAX_DIGITS: usize = 15;
const DEFAULT_COUNTRY_CODE: &str = "254";

/// Contact phone number.
///
/// Spaces and dashes are dropped on construction; an optional leading `+` is
/// preserved. Use [`ContactPhone::to_msisdn`] for mobile-money payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContactPhone(String);

impl ContactPhone {
    /// Validate a phone number.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ViolationKind> {
        let compact: String = value
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if compact.is_empty() {
            return Err(ViolationKind::Missing);
        }
        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ViolationKind::InvalidFormat);
        }
        if digits.len() < PHONE_MIN_DIGITS {
            return Err(ViolationKind::TooShort {
                min: PHONE_MIN_DIGITS,
            });
        }
        if digits.len() > PHONE_MAX_DIGITS {
            return Err(ViolationKind::TooLong {
                max: PHONE_MAX_DIGITS,
            });
        }
        Ok(Self(compact))
    }

    /// International MSISDN form without `+`; a local leading `0` becomes `254`.
    ///
    /// # Examples
    /// ```
    /// use kaakazini_core::domain::ContactPhone;
    ///
    /// let phone = ContactPhone::new("0712 345 678").unwrap();
    /// assert_eq!(phone.to_msisdn(), "254712345678");
    /// ```
    pub fn to_msisdn(&self) -> String {
        let digits = self.0.strip_prefix('+').unwrap_or(&self.0);
        match digits.strip_prefix('0') {
            Some(rest) => format!("{DEFAULT_COUNTRY_CODE}{rest}"),
            None => digits.to_owned(),
        }
    }
}

impl AsRef<str> for ContactPhone {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ContactPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContactPhone> for String {
    fn from(value: ContactPhone) -> Self {
        value.0
    }
}

impl TryFrom<String> for ContactPhone {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).map_err(IdentityValidationError::Phone)
    }
}

/// An authenticated actor as resolved by the gateway.
///
/// ## Invariants
/// - `role` is always the server-side role; clients never assert it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    id: UserId,
    role: Role,
    display_name: DisplayName,
    contact_email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_phone: Option<ContactPhone>,
}

impl Identity {
    /// Build an identity from validated components.
    pub fn new(
        id: UserId,
        role: Role,
        display_name: DisplayName,
        contact_email: Email,
        contact_phone: Option<ContactPhone>,
    ) -> Self {
        Self {
            id,
            role,
            display_name,
            contact_email,
            contact_phone,
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Server-side role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Display name.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Contact email.
    pub fn contact_email(&self) -> &Email {
        &self.contact_email
    }

    /// Contact phone, when known.
    pub fn contact_phone(&self) -> Option<&ContactPhone> {
        self.contact_phone.as_ref()
    }

    /// Whether this identity is the platform operator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", IdentityValidationError::EmptyId)]
    #[case("not-a-uuid", IdentityValidationError::InvalidId)]
    fn user_id_rejects_bad_input(#[case] raw: &str, #[case] expected: IdentityValidationError) {
        assert_eq!(UserId::new(raw).expect_err("invalid id"), expected);
    }

    #[rstest]
    #[case("client", Role::Client)]
    #[case(" Craftsman ", Role::Craftsman)]
    #[case("ADMIN", Role::Admin)]
    fn roles_parse_case_insensitively(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>().expect("known role"), expected);
    }

    #[rstest]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<Role>().expect_err("unknown role");
        assert_eq!(err, IdentityValidationError::UnknownRole("superuser".to_owned()));
    }

    #[rstest]
    #[case("  Ada@Example.COM ", Ok("ada@example.com"))]
    #[case("", Err(ViolationKind::Missing))]
    #[case("ada.example.com", Err(ViolationKind::InvalidFormat))]
    #[case("ada@example", Err(ViolationKind::InvalidFormat))]
    #[case("a b@example.com", Err(ViolationKind::InvalidFormat))]
    fn email_normalises_and_validates(
        #[case] raw: &str,
        #[case] expected: Result<&str, ViolationKind>,
    ) {
        match (Email::new(raw), expected) {
            (Ok(email), Ok(value)) => assert_eq!(email.as_ref(), value),
            (Err(kind), Err(expected_kind)) => assert_eq!(kind, expected_kind),
            (actual, wanted) => panic!("expected {wanted:?}, got {actual:?}"),
        }
    }

    #[rstest]
    #[case("0712345678", "254712345678")]
    #[case("+254712345678", "254712345678")]
    #[case("254 712-345-678", "254712345678")]
    fn msisdn_normalisation(#[case] raw: &str, #[case] expected: &str) {
        let phone = ContactPhone::new(raw).expect("valid phone");
        assert_eq!(phone.to_msisdn(), expected);
    }

    #[rstest]
    #[case("07123", ViolationKind::TooShort { min: 9 })]
    #[case("07123abc99", ViolationKind::InvalidFormat)]
    #[case("   ", ViolationKind::Missing)]
    fn phone_rejects_bad_input(#[case] raw: &str, #[case] expected: ViolationKind) {
        assert_eq!(ContactPhone::new(raw).expect_err("invalid phone"), expected);
    }

    #[rstest]
    fn identity_serialises_without_missing_phone() {
        let identity = Identity::new(
            UserId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id"),
            Role::Craftsman,
            DisplayName::new("Wanjiru").expect("valid name"),
            Email::new("wanjiru@example.com").expect("valid email"),
            None,
        );
        let json = serde_json::to_value(&identity).expect("serialise identity");
        assert_eq!(json["role"], "craftsman");
        assert!(json.get("contactPhone").is_none());
    }
}
