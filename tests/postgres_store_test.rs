mod common;

use chrono::{Duration, Utc};
use common::*;
use pesa_sync::domain::id::CheckoutRequestId;
use pesa_sync::domain::payment::{NewPaymentRequest, PaymentStatus, TransitionOutcome};
use pesa_sync::domain::ports::{OrganisationRepository, PaymentRequestStore};
use pesa_sync::domain::subscription::{Organisation, OrganisationSubscription, SubscriptionStatus};
use pesa_sync::infra::postgres::organisation_repo::PgOrganisationRepository;
use pesa_sync::infra::postgres::payment_request_repo::PgPaymentRequestStore;
use std::sync::Arc;

const DB: &str = "pesa_sync_test_store";

fn checkout(id: &str) -> CheckoutRequestId {
    CheckoutRequestId::new(id).unwrap()
}

async fn insert_request(store: &PgPaymentRequestStore, org: &Organisation, id: &str) {
    store
        .insert(NewPaymentRequest {
            checkout_request_id: checkout(id),
            organisation_id: org.id,
            phone_number: org.phone_number.clone(),
            amount: 1000,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

// ── 39. insert_and_find_roundtrip ──────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_roundtrip() {
    let pool = setup_pool(DB).await;
    let org = seed_pg_organisation(&pool, "254712000039").await;
    let store = PgPaymentRequestStore::new(pool);

    insert_request(&store, &org, "ws_CO_pg_find").await;

    let row = store.find(&checkout("ws_CO_pg_find")).await.unwrap().unwrap();
    assert_eq!(row.status, PaymentStatus::Initiated);
    assert_eq!(row.organisation_id, org.id);
    assert_eq!(row.phone_number, org.phone_number);
    assert_eq!(row.amount, 1000);
    assert_eq!(row.failure_reason, None);
}

// ── 40. duplicate_insert_keeps_first_row ───────────────────────────────────
// ON CONFLICT DO NOTHING: a retried insert never resets an advanced status.

#[tokio::test]
async fn duplicate_insert_keeps_first_row() {
    let pool = setup_pool(DB).await;
    let org = seed_pg_organisation(&pool, "254712000040").await;
    let store = PgPaymentRequestStore::new(pool);

    insert_request(&store, &org, "ws_CO_pg_dup").await;
    let outcome = store
        .transition(
            &checkout("ws_CO_pg_dup"),
            PaymentStatus::AwaitingConfirmation,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Applied);

    insert_request(&store, &org, "ws_CO_pg_dup").await;

    let row = store.find(&checkout("ws_CO_pg_dup")).await.unwrap().unwrap();
    assert_eq!(row.status, PaymentStatus::AwaitingConfirmation);
}

// ── 41. concurrent_confirmations_apply_once ────────────────────────────────
// 5 tasks race to confirm one checkout id; the advisory-lock transaction
// serializes the compare-and-set so exactly one gets Applied.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirmations_apply_once() {
    let pool = setup_pool(DB).await;
    let org = seed_pg_organisation(&pool, "254712000041").await;
    let store = Arc::new(PgPaymentRequestStore::new(pool));

    insert_request(&store, &org, "ws_CO_pg_race").await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .transition(&checkout("ws_CO_pg_race"), PaymentStatus::Confirmed, None)
                .await
                .unwrap()
        }));
    }

    let mut applied = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap() {
            TransitionOutcome::Applied => applied += 1,
            TransitionOutcome::AlreadyConfirmed => already += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(applied, 1, "exactly one caller performs the transition");
    assert_eq!(already, 4, "the rest see AlreadyConfirmed");

    let row = store.find(&checkout("ws_CO_pg_race")).await.unwrap().unwrap();
    assert_eq!(row.status, PaymentStatus::Confirmed);
}

// ── 42. confirmed_is_sticky_in_postgres ────────────────────────────────────

#[tokio::test]
async fn confirmed_is_sticky_in_postgres() {
    let pool = setup_pool(DB).await;
    let org = seed_pg_organisation(&pool, "254712000042").await;
    let store = PgPaymentRequestStore::new(pool);

    insert_request(&store, &org, "ws_CO_pg_sticky").await;
    let confirmed = store
        .transition(&checkout("ws_CO_pg_sticky"), PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    assert_eq!(confirmed, TransitionOutcome::Applied);

    let rejected = store
        .transition(
            &checkout("ws_CO_pg_sticky"),
            PaymentStatus::Rejected,
            Some("late failure".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected, TransitionOutcome::AlreadyConfirmed);

    let timed_out = store
        .transition(&checkout("ws_CO_pg_sticky"), PaymentStatus::TimedOut, None)
        .await
        .unwrap();
    assert_eq!(timed_out, TransitionOutcome::AlreadyConfirmed);

    let row = store
        .find(&checkout("ws_CO_pg_sticky"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Confirmed);
    assert_eq!(row.failure_reason, None, "losing detail must not land");
}

// ── 43. transition_unknown_id_is_not_found ─────────────────────────────────

#[tokio::test]
async fn transition_unknown_id_is_not_found() {
    let pool = setup_pool(DB).await;
    let store = PgPaymentRequestStore::new(pool);

    let outcome = store
        .transition(&checkout("ws_CO_pg_missing"), PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::NotFound);
}

// ── 44. subscription_update_roundtrip ──────────────────────────────────────

#[tokio::test]
async fn subscription_update_roundtrip() {
    let pool = setup_pool(DB).await;
    let org = seed_pg_organisation(&pool, "254712000044").await;
    let repo = PgOrganisationRepository::new(pool);

    let by_phone = repo
        .find_by_phone(&org.phone_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_phone.id, org.id);
    assert_eq!(by_phone.subscription.status, SubscriptionStatus::Inactive);

    let subscription = OrganisationSubscription::activated_at(Utc::now());
    repo.update_subscription(&org.id, &subscription).await.unwrap();

    let reloaded = repo.find_by_id(&org.id).await.unwrap().unwrap();
    assert_eq!(reloaded.subscription.status, SubscriptionStatus::Active);
    let end = reloaded.subscription.end_date.unwrap();
    let expected = subscription.end_date.unwrap();
    assert!((end - expected).abs() < Duration::seconds(1));
}
