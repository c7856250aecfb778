use {
    crate::domain::{
        error::FlowError,
        id::{CheckoutRequestId, OrganisationId},
        payment::{PaymentStatus, TransitionOutcome},
        ports::{OrganisationRepository, PaymentRequestStore},
        subscription::OrganisationSubscription,
    },
    chrono::{DateTime, Utc},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationResult {
    /// This caller won the confirmation race and extended the subscription.
    Activated(OrganisationSubscription),
    /// Another caller already confirmed this payment; the subscription was
    /// left as that caller wrote it.
    AlreadyActivated(OrganisationSubscription),
}

impl ActivationResult {
    pub fn subscription(&self) -> &OrganisationSubscription {
        match self {
            Self::Activated(s) | Self::AlreadyActivated(s) => s,
        }
    }
}

/// The single idempotent consumer both confirmation channels feed into.
///
/// Two defenses make concurrent and duplicate invocations collapse into one
/// state transition: a per-organisation async mutex serializes the
/// read-modify-write of the subscription, and the monotonic `transition` on
/// the payment request decides exactly one winner per checkout id.
pub struct SubscriptionActivator {
    requests: Arc<dyn PaymentRequestStore>,
    organisations: Arc<dyn OrganisationRepository>,
    locks: Mutex<HashMap<OrganisationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubscriptionActivator {
    pub fn new(
        requests: Arc<dyn PaymentRequestStore>,
        organisations: Arc<dyn OrganisationRepository>,
    ) -> Self {
        Self {
            requests,
            organisations,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: OrganisationId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("activator lock map poisoned");
        locks.entry(id).or_default().clone()
    }

    /// Remove the map entry once no caller holds it; the map is bounded by
    /// concurrent activations, not by how many organisations ever paid.
    fn evict_idle(&self, id: OrganisationId) {
        let mut locks = self.locks.lock().expect("activator lock map poisoned");
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    /// Per-organisation locks currently tracked.
    pub fn lock_count(&self) -> usize {
        self.locks.lock().expect("activator lock map poisoned").len()
    }

    pub async fn activate(
        &self,
        organisation_id: OrganisationId,
        checkout_request_id: &CheckoutRequestId,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ActivationResult, FlowError> {
        let lock = self.lock_for(organisation_id);
        let result = {
            let _guard = lock.lock().await;
            self.activate_locked(organisation_id, checkout_request_id, confirmed_at)
                .await
        };
        drop(lock);
        self.evict_idle(organisation_id);
        result
    }

    async fn activate_locked(
        &self,
        organisation_id: OrganisationId,
        checkout_request_id: &CheckoutRequestId,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ActivationResult, FlowError> {
        let outcome = self
            .requests
            .transition(checkout_request_id, PaymentStatus::Confirmed, None)
            .await?;

        match outcome {
            TransitionOutcome::Applied => {
                let subscription = OrganisationSubscription::activated_at(confirmed_at);
                self.organisations
                    .update_subscription(&organisation_id, &subscription)
                    .await?;
                tracing::info!(
                    organisation_id = %organisation_id,
                    checkout_request_id = %checkout_request_id,
                    end_date = ?subscription.end_date,
                    "subscription activated"
                );
                Ok(ActivationResult::Activated(subscription))
            }
            TransitionOutcome::AlreadyConfirmed | TransitionOutcome::Stale => {
                let subscription = self
                    .organisations
                    .find_by_id(&organisation_id)
                    .await?
                    .map(|org| org.subscription)
                    .unwrap_or_else(OrganisationSubscription::inactive);
                tracing::info!(
                    organisation_id = %organisation_id,
                    checkout_request_id = %checkout_request_id,
                    "duplicate confirmation, subscription unchanged"
                );
                Ok(ActivationResult::AlreadyActivated(subscription))
            }
            TransitionOutcome::NotFound => Err(FlowError::Validation(format!(
                "no payment request tracked for {checkout_request_id}"
            ))),
        }
    }
}
