use {
    super::error::FlowError,
    super::id::{CheckoutRequestId, OrganisationId, PhoneNumber},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initiated,
    AwaitingConfirmation,
    TimedOut,
    Rejected,
    Confirmed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::TimedOut => "timed_out",
            Self::Rejected => "rejected",
            Self::Confirmed => "confirmed",
        }
    }

    /// Lifecycle rank — higher means further along. Transitions may only
    /// move to a strictly higher rank, which makes Confirmed absorbing and
    /// lets a late callback override TimedOut but never the reverse.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::AwaitingConfirmation => 1,
            Self::TimedOut => 2,
            Self::Rejected => 3,
            Self::Confirmed => 4,
        }
    }

    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Rejected | Self::Confirmed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = FlowError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "awaiting_confirmation" => Ok(Self::AwaitingConfirmation),
            "timed_out" => Ok(Self::TimedOut),
            "rejected" => Ok(Self::Rejected),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(FlowError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Result of a store-level status transition. The store applies the rank
/// guard itself so both racing confirmation channels see one consistent
/// answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Status advanced; this caller performed the transition.
    Applied,
    /// The request is already Confirmed — confirmation is sticky.
    AlreadyConfirmed,
    /// Incoming status does not outrank the current one — no state change.
    Stale,
    /// No request tracked under this checkout id.
    NotFound,
}

/// In-flight payment attempt, keyed by the gateway's checkout request id.
/// Rows are never deleted, only transitioned.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub checkout_request_id: CheckoutRequestId,
    pub organisation_id: OrganisationId,
    pub phone_number: PhoneNumber,
    pub amount: i64,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// The compare-and-set every store implementation routes through.
    /// Confirmed is absorbing; everything else only moves forward in rank.
    pub fn apply_transition(
        &mut self,
        status: PaymentStatus,
        detail: Option<String>,
    ) -> TransitionOutcome {
        if self.status == PaymentStatus::Confirmed {
            return TransitionOutcome::AlreadyConfirmed;
        }
        if !self.status.can_transition_to(&status) {
            return TransitionOutcome::Stale;
        }
        self.status = status;
        if detail.is_some() {
            self.failure_reason = detail;
        }
        TransitionOutcome::Applied
    }
}

/// For insertion when a push has just been initiated. The row starts at
/// Initiated; the push handler advances it to AwaitingConfirmation once the
/// polling loop takes over.
#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub checkout_request_id: CheckoutRequestId,
    pub organisation_id: OrganisationId,
    pub phone_number: PhoneNumber,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl NewPaymentRequest {
    pub fn into_request(self) -> PaymentRequest {
        PaymentRequest {
            checkout_request_id: self.checkout_request_id,
            organisation_id: self.organisation_id,
            phone_number: self.phone_number,
            amount: self.amount,
            status: PaymentStatus::Initiated,
            failure_reason: None,
            created_at: self.created_at,
        }
    }
}
