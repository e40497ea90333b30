//! Collected field validation failures.
//!
//! Constructors that validate several inputs push every violation into a
//! [`ValidationErrors`] set instead of returning on the first problem, so the
//! caller can highlight all offending fields at once.

use std::fmt;

use serde::Serialize;

/// Reason a single field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ViolationKind {
    /// Field was absent or blank once trimmed.
    Missing,
    /// Field is shorter than the accepted minimum.
    TooShort { min: usize },
    /// Field is longer than the accepted maximum.
    TooLong { max: usize },
    /// Field content does not match the expected format.
    InvalidFormat,
    /// Timestamp lies in the past.
    InPast,
    /// Value is not accepted for this field.
    NotAllowed,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("is required"),
            Self::TooShort { min } => write!(f, "must be at least {min} characters"),
            Self::TooLong { max } => write!(f, "must be at most {max} characters"),
            Self::InvalidFormat => f.write_str("has an invalid format"),
            Self::InPast => f.write_str("must not be in the past"),
            Self::NotAllowed => f.write_str("is not allowed"),
        }
    }
}

/// One field and the reason it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldViolation {
    field: &'static str,
    #[serde(flatten)]
    kind: ViolationKind,
}

impl FieldViolation {
    /// Field name as exposed to callers (camelCase).
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Violation reason.
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.kind)
    }
}

/// Ordered set of field violations.
///
/// # Examples
/// ```
/// use kaakazini_core::domain::{ValidationErrors, ViolationKind};
///
/// let mut errors = ValidationErrors::new();
/// errors.push("address", ViolationKind::Missing);
/// errors.push("description", ViolationKind::Missing);
/// assert_eq!(errors.len(), 2);
/// assert!(errors.into_result(()).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set holding a single violation.
    pub fn single(field: &'static str, kind: ViolationKind) -> Self {
        let mut errors = Self::new();
        errors.push(field, kind);
        errors
    }

    /// Record a violation for `field`.
    pub fn push(&mut self, field: &'static str, kind: ViolationKind) {
        self.0.push(FieldViolation { field, kind });
    }

    /// Record a violation when `result` is an error, returning the value otherwise.
    pub fn collect<T>(
        &mut self,
        field: &'static str,
        result: Result<T, ViolationKind>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(kind) => {
                self.push(field, kind);
                None
            }
        }
    }

    /// Whether no violation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the recorded violations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldViolation> {
        self.0.iter()
    }

    /// Whether `field` has at least one violation.
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|violation| violation.field == field)
    }

    /// Return `Ok(value)` when empty, or the collected set otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
            first = false;
        }
        Ok(())
    }
}
