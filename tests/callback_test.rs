mod common;

use common::*;
use pesa_sync::domain::callback::{CallbackDetails, CallbackEnvelope, CallbackItem};
use pesa_sync::domain::id::{CheckoutRequestId, PhoneNumber};
use pesa_sync::domain::payment::PaymentStatus;
use pesa_sync::domain::ports::{Clock, OrganisationRepository};
use pesa_sync::domain::subscription::SubscriptionStatus;
use pesa_sync::services::reconciler::{ReconcileOutcome, ReconcilerDeps, reconcile_callback};

fn deps(app: &TestApp) -> ReconcilerDeps {
    ReconcilerDeps {
        requests: app.requests.clone(),
        organisations: app.organisations.clone(),
        activator: app.state.activator.clone(),
        clock: app.clock.clone(),
    }
}

fn parse_callback(body: &str) -> CallbackEnvelope {
    serde_json::from_str(body).unwrap()
}

fn items(entries: &[(&str, serde_json::Value)]) -> Vec<CallbackItem> {
    // Round-trip through serde so the test uses the wire shape.
    serde_json::from_value(serde_json::json!(
        entries
            .iter()
            .map(|(name, value)| serde_json::json!({"Name": name, "Value": value}))
            .collect::<Vec<_>>()
    ))
    .unwrap()
}

// ── 14. metadata_items_out_of_order_still_parse ────────────────────────────
// The gateway does not guarantee item order; the receipt arriving before
// the amount must not matter.

#[test]
fn metadata_items_out_of_order_still_parse() {
    let details = CallbackDetails::from_items(&items(&[
        ("MpesaReceiptNumber", serde_json::json!("NLJ7RT61SV")),
        ("TransactionDate", serde_json::json!(20250601120500u64)),
        ("PhoneNumber", serde_json::json!(254712345678u64)),
        ("Amount", serde_json::json!(1000)),
    ]))
    .unwrap();

    assert_eq!(details.amount, 1000);
    assert_eq!(details.receipt_number, "NLJ7RT61SV");
    assert_eq!(details.transaction_date, "20250601120500");
    assert_eq!(
        details.phone_number,
        PhoneNumber::new("254712345678").unwrap()
    );
}

// ── 15. metadata_accepts_string_and_float_values ───────────────────────────

#[test]
fn metadata_accepts_string_and_float_values() {
    let details = CallbackDetails::from_items(&items(&[
        ("Amount", serde_json::json!(1000.0)),
        ("MpesaReceiptNumber", serde_json::json!("NLJ7RT61SV")),
        ("TransactionDate", serde_json::json!("20250601120500")),
        ("PhoneNumber", serde_json::json!("254712345678")),
    ]))
    .unwrap();

    assert_eq!(details.amount, 1000);
    assert_eq!(details.transaction_date, "20250601120500");
}

// ── 16. missing_amount_is_malformed ────────────────────────────────────────

#[test]
fn missing_amount_is_malformed() {
    let result = CallbackDetails::from_items(&items(&[
        ("MpesaReceiptNumber", serde_json::json!("NLJ7RT61SV")),
        ("PhoneNumber", serde_json::json!(254712345678u64)),
    ]));
    assert!(result.is_err());
}

// ── 17. callback_activates_tracked_request ─────────────────────────────────

#[tokio::test]
async fn callback_activates_tracked_request() {
    let app = test_app(ScriptedGateway::new("ws_CO_cb"));
    let org = seed_organisation(&app, "254712345678");
    seed_request(&app, "ws_CO_cb", &org, 1000).await;

    let envelope = parse_callback(&success_callback(
        "ws_CO_cb",
        1000,
        "254712345678",
        "NLJ7RT61SV",
    ));
    let outcome = reconcile_callback(&deps(&app), &envelope.body.stk_callback)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
    let org = app
        .organisations
        .find_by_id(&org.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org.subscription.status, SubscriptionStatus::Active);
}

// ── 18. retried_callback_does_not_stack ────────────────────────────────────

#[tokio::test]
async fn retried_callback_does_not_stack() {
    let app = test_app(ScriptedGateway::new("ws_CO_retry"));
    let org = seed_organisation(&app, "254712345678");
    seed_request(&app, "ws_CO_retry", &org, 1000).await;
    let confirmed_at = app.clock.now();

    let body = success_callback("ws_CO_retry", 1000, "254712345678", "NLJ7RT61SV");

    let first = reconcile_callback(&deps(&app), &parse_callback(&body).body.stk_callback)
        .await
        .unwrap();
    assert!(matches!(
        first,
        ReconcileOutcome::Activated {
            result: pesa_sync::services::activation::ActivationResult::Activated(_),
            ..
        }
    ));

    app.clock.advance(chrono::Duration::minutes(2));
    let second = reconcile_callback(&deps(&app), &parse_callback(&body).body.stk_callback)
        .await
        .unwrap();
    assert!(matches!(
        second,
        ReconcileOutcome::Activated {
            result: pesa_sync::services::activation::ActivationResult::AlreadyActivated(_),
            ..
        }
    ));

    let org = app
        .organisations
        .find_by_id(&org.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        org.subscription.end_date,
        Some(confirmed_at + chrono::Duration::days(30))
    );
}

// ── 19. phone_fallback_resolves_untracked_payment ──────────────────────────
// No request row exists (push from a previous deployment, say); the
// registered phone number still resolves the organisation.

#[tokio::test]
async fn phone_fallback_resolves_untracked_payment() {
    let app = test_app(ScriptedGateway::new("ws_CO_orphan"));
    let org = seed_organisation(&app, "254712345678");

    let envelope = parse_callback(&success_callback(
        "ws_CO_orphan",
        1000,
        "254712345678",
        "NLJ7RT61SV",
    ));
    let outcome = reconcile_callback(&deps(&app), &envelope.body.stk_callback)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
    let org = app
        .organisations
        .find_by_id(&org.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org.subscription.status, SubscriptionStatus::Active);

    // The fallback also backfills the request row so retries dedup.
    let row = app
        .requests
        .get(&CheckoutRequestId::new("ws_CO_orphan").unwrap())
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Confirmed);
}

// ── 20. unresolvable_callback_is_acknowledged ──────────────────────────────

#[tokio::test]
async fn unresolvable_callback_is_acknowledged() {
    let app = test_app(ScriptedGateway::new("ws_CO_who"));
    seed_organisation(&app, "254700000001");

    let envelope = parse_callback(&success_callback(
        "ws_CO_who",
        1000,
        "254799999999",
        "NLJ7RT61SV",
    ));
    let outcome = reconcile_callback(&deps(&app), &envelope.body.stk_callback)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Unresolved));
}

// ── 21. failure_callback_records_rejection ─────────────────────────────────

#[tokio::test]
async fn failure_callback_records_rejection() {
    let app = test_app(ScriptedGateway::new("ws_CO_fail"));
    let org = seed_organisation(&app, "254712345678");
    seed_request(&app, "ws_CO_fail", &org, 1000).await;

    let envelope = parse_callback(&failure_callback(
        "ws_CO_fail",
        1032,
        "Request cancelled by user",
    ));
    let outcome = reconcile_callback(&deps(&app), &envelope.body.stk_callback)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::RejectionRecorded));
    let row = app
        .requests
        .get(&CheckoutRequestId::new("ws_CO_fail").unwrap())
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Rejected);
    assert_eq!(row.failure_reason.as_deref(), Some("Request cancelled by user"));

    let org = app
        .organisations
        .find_by_id(&org.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org.subscription.status, SubscriptionStatus::Inactive);
}

// ── 22. failure_callback_never_downgrades_confirmed ────────────────────────

#[tokio::test]
async fn failure_callback_never_downgrades_confirmed() {
    let app = test_app(ScriptedGateway::new("ws_CO_guard"));
    let org = seed_organisation(&app, "254712345678");
    seed_request(&app, "ws_CO_guard", &org, 1000).await;

    app.state
        .activator
        .activate(
            org.id,
            &CheckoutRequestId::new("ws_CO_guard").unwrap(),
            app.clock.now(),
        )
        .await
        .unwrap();

    let envelope = parse_callback(&failure_callback("ws_CO_guard", 1037, "Timeout"));
    let outcome = reconcile_callback(&deps(&app), &envelope.body.stk_callback)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::RejectionIgnored));
    let row = app
        .requests
        .get(&CheckoutRequestId::new("ws_CO_guard").unwrap())
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Confirmed);
}

// ── 23. handler_acknowledges_garbage_payload ───────────────────────────────
// Gateways retry on non-2xx, so even an unparseable body gets a 200.

#[tokio::test]
async fn handler_acknowledges_garbage_payload() {
    let app = test_app(ScriptedGateway::new("ws_CO_junk"));
    let router = pesa_sync::router(app.state.clone());

    let (status, body) = post_raw(
        router,
        "/payments/callback",
        "this is not json".to_string(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["ResultCode"], 0);
}

// ── 24. handler_acknowledges_success_without_metadata ──────────────────────

#[tokio::test]
async fn handler_acknowledges_success_without_metadata() {
    let app = test_app(ScriptedGateway::new("ws_CO_nometa"));
    let router = pesa_sync::router(app.state.clone());

    // ResultCode 0 but no CallbackMetadata: malformed, logged, acknowledged.
    let body = serde_json::json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_nometa",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
            }
        }
    });
    let (status, reply) = post_json(router, "/payments/callback", body).await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(reply["ResultCode"], 0);
}
