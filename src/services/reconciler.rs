use {
    crate::domain::{
        callback::{CallbackDetails, StkCallback},
        error::FlowError,
        id::{CheckoutRequestId, OrganisationId},
        payment::{NewPaymentRequest, PaymentStatus, TransitionOutcome},
        ports::{Clock, OrganisationRepository, PaymentRequestStore},
    },
    crate::services::activation::{ActivationResult, SubscriptionActivator},
    std::sync::Arc,
};

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Callback won the race; subscription extended.
    Activated {
        organisation_id: OrganisationId,
        result: ActivationResult,
    },
    /// Gateway reported failure; recorded unless the payment was already
    /// confirmed by the other channel.
    RejectionRecorded,
    /// Failure report for a payment that was already confirmed — ignored.
    RejectionIgnored,
    /// Neither the checkout id nor the phone number resolved to an
    /// organisation. Logged and acknowledged.
    Unresolved,
}

pub struct ReconcilerDeps {
    pub requests: Arc<dyn PaymentRequestStore>,
    pub organisations: Arc<dyn OrganisationRepository>,
    pub activator: Arc<SubscriptionActivator>,
    pub clock: Arc<dyn Clock>,
}

/// Fold one inbound gateway callback into the shared payment state. Runs in
/// its own request, at an arbitrary time relative to the polling loop — the
/// activator and the store's rank guard make that safe.
pub async fn reconcile_callback(
    deps: &ReconcilerDeps,
    callback: &StkCallback,
) -> Result<ReconcileOutcome, FlowError> {
    let checkout_id = CheckoutRequestId::new(&callback.checkout_request_id)?;

    if callback.result_code != 0 {
        let outcome = deps
            .requests
            .transition(
                &checkout_id,
                PaymentStatus::Rejected,
                Some(callback.result_desc.clone()),
            )
            .await?;
        return Ok(match outcome {
            TransitionOutcome::Applied => ReconcileOutcome::RejectionRecorded,
            TransitionOutcome::AlreadyConfirmed => {
                tracing::warn!(
                    checkout_request_id = %checkout_id,
                    result_code = callback.result_code,
                    "failure callback for an already-confirmed payment, ignored"
                );
                ReconcileOutcome::RejectionIgnored
            }
            TransitionOutcome::Stale => ReconcileOutcome::RejectionIgnored,
            TransitionOutcome::NotFound => {
                tracing::warn!(
                    checkout_request_id = %checkout_id,
                    "failure callback for an unknown payment"
                );
                ReconcileOutcome::Unresolved
            }
        });
    }

    let metadata = callback
        .callback_metadata
        .as_ref()
        .ok_or_else(|| FlowError::MalformedCallback("success callback without metadata".into()))?;
    let details = CallbackDetails::from_items(&metadata.item)?;

    // Prefer the correlation captured at push time; fall back to the
    // registered phone number only when no request row exists.
    let organisation_id = match deps.requests.find(&checkout_id).await? {
        Some(request) => request.organisation_id,
        None => {
            let Some(organisation) = deps
                .organisations
                .find_by_phone(&details.phone_number)
                .await?
            else {
                tracing::warn!(
                    checkout_request_id = %checkout_id,
                    phone_number = %details.phone_number,
                    "callback did not resolve to any organisation"
                );
                return Ok(ReconcileOutcome::Unresolved);
            };

            // Record the request so retried deliveries of this callback
            // dedup through the same transition as everything else.
            deps.requests
                .insert(NewPaymentRequest {
                    checkout_request_id: checkout_id.clone(),
                    organisation_id: organisation.id,
                    phone_number: details.phone_number.clone(),
                    amount: details.amount,
                    created_at: deps.clock.now(),
                })
                .await?;
            organisation.id
        }
    };

    let result = deps
        .activator
        .activate(organisation_id, &checkout_id, deps.clock.now())
        .await?;

    tracing::info!(
        checkout_request_id = %checkout_id,
        organisation_id = %organisation_id,
        receipt = %details.receipt_number,
        amount = details.amount,
        "callback reconciled"
    );

    Ok(ReconcileOutcome::Activated {
        organisation_id,
        result,
    })
}
