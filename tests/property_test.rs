use chrono::Utc;
use pesa_sync::domain::id::{CheckoutRequestId, OrganisationId, PhoneNumber};
use pesa_sync::domain::payment::{PaymentRequest, PaymentStatus, TransitionOutcome};
use proptest::prelude::*;
use uuid::Uuid;

fn arb_status() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Initiated),
        Just(PaymentStatus::AwaitingConfirmation),
        Just(PaymentStatus::TimedOut),
        Just(PaymentStatus::Rejected),
        Just(PaymentStatus::Confirmed),
    ]
}

fn request_with(status: PaymentStatus) -> PaymentRequest {
    PaymentRequest {
        checkout_request_id: CheckoutRequestId::new("ws_CO_prop").unwrap(),
        organisation_id: OrganisationId::new(Uuid::now_v7()),
        phone_number: PhoneNumber::new("254712345678").unwrap(),
        amount: 1000,
        status,
        failure_reason: None,
        created_at: Utc::now(),
    }
}

proptest! {
    /// Confirmed is absorbing: no sequence of transition attempts moves a
    /// confirmed request anywhere else.
    #[test]
    fn confirmed_is_absorbing(steps in prop::collection::vec(arb_status(), 1..20)) {
        let mut request = request_with(PaymentStatus::Confirmed);
        for next in steps {
            let outcome = request.apply_transition(next, None);
            prop_assert_eq!(outcome, TransitionOutcome::AlreadyConfirmed);
            prop_assert_eq!(request.status, PaymentStatus::Confirmed);
        }
    }

    /// Every applied transition strictly increases rank, so any walk makes
    /// at most 3 moves from AwaitingConfirmation before it sticks.
    #[test]
    fn rank_strictly_increases_along_any_walk(
        steps in prop::collection::vec(arb_status(), 1..20)
    ) {
        let mut request = request_with(PaymentStatus::AwaitingConfirmation);
        let mut applied = 0u32;
        let mut last_rank = request.status.rank();
        for next in steps {
            if request.apply_transition(next, None) == TransitionOutcome::Applied {
                prop_assert!(request.status.rank() > last_rank);
                last_rank = request.status.rank();
                applied += 1;
            }
        }
        prop_assert!(applied <= 3, "got {applied} applied transitions");
    }

    /// as_str → try_from roundtrip is identity for any status.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = PaymentStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// Local, international and spaced renderings of one number all
    /// normalize to the same canonical form, and normalization is
    /// idempotent.
    #[test]
    fn phone_normalization_is_canonical(suffix in 0u64..=99_999_999) {
        let local = format!("07{suffix:08}");
        let intl = format!("2547{suffix:08}");
        let plussed = format!("+2547{suffix:08}");

        let a = PhoneNumber::new(&local).unwrap();
        let b = PhoneNumber::new(&intl).unwrap();
        let c = PhoneNumber::new(&plussed).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&b, &c);

        let again = PhoneNumber::new(a.as_str()).unwrap();
        prop_assert_eq!(again, a);
    }
}
