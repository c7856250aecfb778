use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::FlowError;

/// Gateway-issued correlation id (`ws_CO_...`) tying a push request to its
/// later status queries and callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutRequestId(String);

impl CheckoutRequestId {
    pub fn new(id: impl Into<String>) -> Result<Self, FlowError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(FlowError::Validation(
                "CheckoutRequestId cannot be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrganisationId(Uuid);

impl OrganisationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

/// Subscriber phone number, normalized to international form without a plus
/// (`2547XXXXXXXX`). Accepts `07…`/`01…`, `+254…` and bare `254…` inputs so
/// the callback fallback lookup is not defeated by formatting differences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, FlowError> {
        let digits: String = raw
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '+' && *c != '-')
            .collect();

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowError::Validation(format!(
                "phone number contains non-digits: {}",
                raw.as_ref()
            )));
        }

        let normalized = if digits.starts_with("254") {
            digits
        } else if digits.starts_with('0') && digits.len() == 10 {
            format!("254{}", &digits[1..])
        } else {
            return Err(FlowError::Validation(format!(
                "unrecognized phone number format: {}",
                raw.as_ref()
            )));
        };

        if normalized.len() != 12 {
            return Err(FlowError::Validation(format!(
                "phone number must be 12 digits after normalization, got {}",
                normalized.len()
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
