use {
    super::error::FlowError,
    super::id::{OrganisationId, PhoneNumber},
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// Days of access granted by one confirmed payment.
pub const ACTIVATION_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Inactive,
    Active,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SubscriptionStatus {
    type Error = FlowError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            other => Err(FlowError::Validation(format!(
                "unknown subscription status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationSubscription {
    pub status: SubscriptionStatus,
    pub end_date: Option<DateTime<Utc>>,
}

impl OrganisationSubscription {
    pub fn inactive() -> Self {
        Self {
            status: SubscriptionStatus::Inactive,
            end_date: None,
        }
    }

    /// One confirmed payment grants one fixed window from the confirmation
    /// time. Deduplication of repeated confirmations for the same payment
    /// happens upstream, in the activator.
    pub fn activated_at(confirmed_at: DateTime<Utc>) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            end_date: Some(confirmed_at + Duration::days(ACTIVATION_WINDOW_DAYS)),
        }
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.end_date
            .map(|end| (end - now).num_days().max(0))
            .unwrap_or(0)
    }
}

/// The slice of an organisation this flow touches: identity, the phone
/// number registered for payments, the admin to notify, and the
/// subscription state.
#[derive(Debug, Clone, Serialize)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    pub phone_number: PhoneNumber,
    pub admin_user_id: Uuid,
    pub subscription: OrganisationSubscription,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}
