use {
    crate::domain::{
        error::FlowError,
        id::{CheckoutRequestId, OrganisationId, PhoneNumber},
        payment::{NewPaymentRequest, PaymentRequest, PaymentStatus, TransitionOutcome},
        ports::{
            BoxFuture, EmailMessage, EmailSender, OrganisationRepository, PaymentRequestStore,
            UserRepository,
        },
        subscription::{Organisation, OrganisationSubscription, User},
    },
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
    uuid::Uuid,
};

/// Mutex-backed store for tests and local runs. The lock is held across
/// the whole transition, so the rank guard is atomic here just as the
/// advisory-lock transaction makes it atomic in Postgres.
#[derive(Default)]
pub struct InMemoryPaymentRequestStore {
    rows: Mutex<HashMap<CheckoutRequestId, PaymentRequest>>,
}

impl InMemoryPaymentRequestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, id: &CheckoutRequestId) -> Option<PaymentRequest> {
        self.rows.lock().expect("store poisoned").get(id).cloned()
    }
}

impl PaymentRequestStore for InMemoryPaymentRequestStore {
    fn insert(&self, request: NewPaymentRequest) -> BoxFuture<'_, Result<(), FlowError>> {
        Box::pin(async move {
            let mut rows = self.rows.lock().expect("store poisoned");
            let row = request.into_request();
            // First write wins; a duplicate insert never resets status.
            rows.entry(row.checkout_request_id.clone()).or_insert(row);
            Ok(())
        })
    }

    fn find(
        &self,
        id: &CheckoutRequestId,
    ) -> BoxFuture<'_, Result<Option<PaymentRequest>, FlowError>> {
        let id = id.clone();
        Box::pin(async move { Ok(self.rows.lock().expect("store poisoned").get(&id).cloned()) })
    }

    fn transition(
        &self,
        id: &CheckoutRequestId,
        status: PaymentStatus,
        detail: Option<String>,
    ) -> BoxFuture<'_, Result<TransitionOutcome, FlowError>> {
        let id = id.clone();
        Box::pin(async move {
            let mut rows = self.rows.lock().expect("store poisoned");
            Ok(match rows.get_mut(&id) {
                Some(row) => row.apply_transition(status, detail),
                None => TransitionOutcome::NotFound,
            })
        })
    }
}

#[derive(Default)]
pub struct InMemoryOrganisationRepository {
    rows: Mutex<HashMap<OrganisationId, Organisation>>,
}

impl InMemoryOrganisationRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, organisation: Organisation) {
        self.rows
            .lock()
            .expect("repo poisoned")
            .insert(organisation.id, organisation);
    }
}

impl OrganisationRepository for InMemoryOrganisationRepository {
    fn find_by_id(
        &self,
        id: &OrganisationId,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>> {
        let id = *id;
        Box::pin(async move { Ok(self.rows.lock().expect("repo poisoned").get(&id).cloned()) })
    }

    fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>> {
        let phone = phone.clone();
        Box::pin(async move {
            Ok(self
                .rows
                .lock()
                .expect("repo poisoned")
                .values()
                .find(|org| org.phone_number == phone)
                .cloned())
        })
    }

    fn update_subscription(
        &self,
        id: &OrganisationId,
        subscription: &OrganisationSubscription,
    ) -> BoxFuture<'_, Result<(), FlowError>> {
        let id = *id;
        let subscription = subscription.clone();
        Box::pin(async move {
            let mut rows = self.rows.lock().expect("repo poisoned");
            match rows.get_mut(&id) {
                Some(org) => {
                    org.subscription = subscription;
                    Ok(())
                }
                None => Err(FlowError::Validation(format!("unknown organisation: {id}"))),
            }
        })
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, user: User) {
        self.rows.lock().expect("repo poisoned").insert(user.id, user);
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<User>, FlowError>> {
        Box::pin(async move { Ok(self.rows.lock().expect("repo poisoned").get(&id).cloned()) })
    }
}

/// Sender that only logs — the default wiring until a real SMTP relay is
/// configured.
pub struct LoggingEmailSender;

impl EmailSender for LoggingEmailSender {
    fn send(&self, message: &EmailMessage) -> BoxFuture<'_, Result<(), FlowError>> {
        let message = message.clone();
        Box::pin(async move {
            tracing::info!(to = %message.to, subject = %message.subject, "confirmation email (log only)");
            Ok(())
        })
    }
}
