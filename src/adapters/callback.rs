use {
    crate::{
        AppState,
        domain::callback::CallbackEnvelope,
        services::{
            activation::ActivationResult,
            notifier::send_confirmation,
            reconciler::{ReconcileOutcome, ReconcilerDeps, reconcile_callback},
        },
    },
    axum::{Json, extract::State},
};

/// Inbound confirmation webhook from the gateway. Gateways retry
/// aggressively on non-2xx, so this handler acknowledges everything —
/// malformed payloads and internal failures are logged, never surfaced.
#[tracing::instrument(
    name = "payments_callback",
    skip_all,
    fields(
        checkout_request_id = tracing::field::Empty,
        result_code = tracing::field::Empty,
    )
)]
pub async fn callback_handler(
    State(state): State<AppState>,
    body: String,
) -> Json<serde_json::Value> {
    let ack = Json(serde_json::json!({
        "ResultCode": 0,
        "ResultDesc": "Accepted",
    }));

    let envelope: CallbackEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable callback payload, acknowledging anyway");
            return ack;
        }
    };
    let callback = envelope.body.stk_callback;

    tracing::Span::current()
        .record(
            "checkout_request_id",
            tracing::field::display(&callback.checkout_request_id),
        )
        .record("result_code", callback.result_code);

    let deps = ReconcilerDeps {
        requests: state.requests.clone(),
        organisations: state.organisations.clone(),
        activator: state.activator.clone(),
        clock: state.clock.clone(),
    };

    match reconcile_callback(&deps, &callback).await {
        Ok(ReconcileOutcome::Activated {
            organisation_id,
            result: ActivationResult::Activated(subscription),
        }) => {
            match state.organisations.find_by_id(&organisation_id).await {
                Ok(Some(organisation)) => {
                    tokio::spawn(send_confirmation(
                        state.users.clone(),
                        state.mailer.clone(),
                        organisation,
                        subscription,
                    ));
                }
                Ok(None) => {
                    tracing::warn!(%organisation_id, "activated organisation vanished before notify");
                }
                Err(e) => {
                    tracing::warn!(%organisation_id, error = %e, "organisation lookup for notify failed");
                }
            }
        }
        Ok(outcome) => {
            tracing::info!(?outcome, "callback processed without new activation");
        }
        Err(e) => {
            tracing::warn!(error = %e, "callback reconciliation failed, acknowledging anyway");
        }
    }

    ack
}
