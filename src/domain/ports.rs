use {
    super::error::FlowError,
    super::id::{CheckoutRequestId, OrganisationId, PhoneNumber},
    super::payment::{NewPaymentRequest, PaymentRequest, PaymentStatus, TransitionOutcome},
    super::subscription::{Organisation, OrganisationSubscription, User},
    chrono::{DateTime, Utc},
    serde::Deserialize,
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parameters for one STK push initiation.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub phone_number: PhoneNumber,
    pub amount: i64,
    pub account_reference: String,
    pub description: String,
}

/// What a status query returns. `ResponseCode` reports whether the gateway
/// accepted the query; `ResultCode` reports the payment outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQueryReply {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryVerdict {
    /// `0`/`0` — payment went through.
    Confirmed,
    /// `0`/`4999` — subscriber has not acted yet, keep polling.
    Pending,
    /// `0`/anything else — terminal failure with the gateway's description.
    Rejected { code: String, description: String },
    /// The query itself was not accepted; counts as a consumed attempt.
    Inconclusive,
}

impl StatusQueryReply {
    pub fn classify(&self) -> QueryVerdict {
        if self.response_code != "0" {
            return QueryVerdict::Inconclusive;
        }
        match self.result_code.as_str() {
            "0" => QueryVerdict::Confirmed,
            "4999" => QueryVerdict::Pending,
            other => QueryVerdict::Rejected {
                code: other.to_string(),
                description: self.result_desc.clone(),
            },
        }
    }
}

/// Outbound calls to the payment gateway. Token handling is the
/// implementation's concern; callers never see bearer tokens.
pub trait PaymentGateway: Send + Sync {
    fn initiate_push(
        &self,
        request: &PushRequest,
    ) -> BoxFuture<'_, Result<CheckoutRequestId, FlowError>>;

    fn query_status(
        &self,
        id: &CheckoutRequestId,
    ) -> BoxFuture<'_, Result<StatusQueryReply, FlowError>>;
}

/// Tracks in-flight payment attempts keyed by checkout request id. The
/// store owns the rank guard: `transition` is the single compare-and-set
/// both confirmation channels go through.
pub trait PaymentRequestStore: Send + Sync {
    fn insert(&self, request: NewPaymentRequest) -> BoxFuture<'_, Result<(), FlowError>>;

    fn find(
        &self,
        id: &CheckoutRequestId,
    ) -> BoxFuture<'_, Result<Option<PaymentRequest>, FlowError>>;

    fn transition(
        &self,
        id: &CheckoutRequestId,
        status: PaymentStatus,
        detail: Option<String>,
    ) -> BoxFuture<'_, Result<TransitionOutcome, FlowError>>;
}

pub trait OrganisationRepository: Send + Sync {
    fn find_by_id(
        &self,
        id: &OrganisationId,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>>;

    fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>>;

    fn update_subscription(
        &self,
        id: &OrganisationId,
        subscription: &OrganisationSubscription,
    ) -> BoxFuture<'_, Result<(), FlowError>>;
}

pub trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<User>, FlowError>>;
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait EmailSender: Send + Sync {
    fn send(&self, message: &EmailMessage) -> BoxFuture<'_, Result<(), FlowError>>;
}

/// Time source, injectable so token expiry and activation windows are
/// testable with a fake clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
