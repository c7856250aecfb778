use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::FlowError,
            id::{CheckoutRequestId, OrganisationId, PhoneNumber},
            payment::{NewPaymentRequest, PaymentStatus, TransitionOutcome},
            subscription::Organisation,
        },
        services::{
            activation::ActivationResult,
            notifier::send_confirmation,
            poller::{PollOutcome, poll_confirmation},
        },
    },
    axum::{
        Json,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPaymentRequest {
    pub organisation_id: Uuid,
    pub phone_number: String,
    pub amount: i64,
}

/// Initiate an STK push and resolve it synchronously within this request.
/// The response blocks for up to the full poll budget; an indeterminate
/// outcome is reported as 202 pending because the callback channel may
/// still confirm the payment after we answer.
#[tracing::instrument(
    name = "payments_push",
    skip_all,
    fields(organisation_id = %body.organisation_id, amount = body.amount)
)]
pub async fn push_handler(
    State(state): State<AppState>,
    Json(body): Json<PushPaymentRequest>,
) -> Result<Response, ApiError> {
    if body.amount <= 0 {
        return Err(FlowError::Validation("amount must be positive".into()).into());
    }
    let phone_number = PhoneNumber::new(&body.phone_number)?;
    let organisation_id = OrganisationId::new(body.organisation_id);

    let organisation = state
        .organisations
        .find_by_id(&organisation_id)
        .await?
        .ok_or_else(|| {
            FlowError::Validation(format!("unknown organisation: {organisation_id}"))
        })?;

    let push = crate::domain::ports::PushRequest {
        phone_number: phone_number.clone(),
        amount: body.amount,
        account_reference: organisation_id.to_string(),
        description: format!("{} subscription", organisation.name),
    };
    let checkout_id = state.gateway.initiate_push(&push).await?;

    state
        .requests
        .insert(NewPaymentRequest {
            checkout_request_id: checkout_id.clone(),
            organisation_id,
            phone_number,
            amount: body.amount,
            created_at: state.clock.now(),
        })
        .await?;

    // The polling loop takes over from here; outcome ignored because a very
    // fast callback may already have moved the row past this rank.
    state
        .requests
        .transition(&checkout_id, PaymentStatus::AwaitingConfirmation, None)
        .await?;

    tracing::info!(checkout_request_id = %checkout_id, "push initiated, polling for confirmation");

    let outcome = poll_confirmation(
        state.gateway.as_ref(),
        &checkout_id,
        &state.poller,
        state.shutdown.clone(),
    )
    .await;

    match outcome {
        PollOutcome::Confirmed { .. } => {
            let result = state
                .activator
                .activate(organisation_id, &checkout_id, state.clock.now())
                .await?;

            // The losing channel must not mail a second confirmation; the
            // winner (here or in the callback handler) already does.
            if let ActivationResult::Activated(subscription) = &result {
                tokio::spawn(send_confirmation(
                    state.users.clone(),
                    state.mailer.clone(),
                    organisation,
                    subscription.clone(),
                ));
            }

            Ok(active_response(&state, &checkout_id, result.subscription()))
        }
        PollOutcome::Rejected { code, description } => {
            let transition = state
                .requests
                .transition(&checkout_id, PaymentStatus::Rejected, Some(description.clone()))
                .await?;
            if transition == TransitionOutcome::AlreadyConfirmed {
                // The callback channel confirmed while we were polling;
                // the rejection signal lost the race.
                return Ok(confirmed_elsewhere(&state, &organisation_id, &checkout_id).await?);
            }
            Ok((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "status": "rejected",
                    "resultCode": code,
                    "reason": description,
                })),
            )
                .into_response())
        }
        PollOutcome::TimedOut { attempts } => {
            let transition = state
                .requests
                .transition(&checkout_id, PaymentStatus::TimedOut, None)
                .await?;
            if transition == TransitionOutcome::AlreadyConfirmed {
                return Ok(confirmed_elsewhere(&state, &organisation_id, &checkout_id).await?);
            }
            tracing::info!(
                checkout_request_id = %checkout_id,
                attempts,
                "poll budget exhausted, reporting pending"
            );
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "status": "pending",
                    "checkoutRequestId": checkout_id.as_str(),
                })),
            )
                .into_response())
        }
    }
}

fn active_response(
    state: &AppState,
    checkout_id: &CheckoutRequestId,
    subscription: &crate::domain::subscription::OrganisationSubscription,
) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "active",
            "checkoutRequestId": checkout_id.as_str(),
            "daysRemaining": subscription.days_remaining(state.clock.now()),
            "endDate": subscription.end_date,
        })),
    )
        .into_response()
}

/// The poller lost to the callback path: report the subscription as the
/// winner wrote it.
async fn confirmed_elsewhere(
    state: &AppState,
    organisation_id: &OrganisationId,
    checkout_id: &CheckoutRequestId,
) -> Result<Response, FlowError> {
    let subscription = state
        .organisations
        .find_by_id(organisation_id)
        .await?
        .map(|org: Organisation| org.subscription)
        .ok_or_else(|| {
            FlowError::Validation(format!("unknown organisation: {organisation_id}"))
        })?;
    Ok(active_response(state, checkout_id, &subscription))
}
