//! Property-based tests for ledger invariants
//!
//! These tests verify the critical invariants:
//! - Access gate: disabled gate blocks every mutation, with zero state change
//! - Key determinism: same (carrier, name, time) always derives the same key
//! - Purchase order: policy lists preserve insertion order
//! - Payout arithmetic: 150% of face value, integer truncation
//! - Exactly-once payout: a paid policy never pays again

use proptest::prelude::*;
use surety_ledger::{
    payout, Config, Error, Identity, Ledger, NotificationKind, TripKey, TripStatus,
};

fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.data_dir = data_dir.to_path_buf();
    config.owner = Identity::new("owner-1");
    config
}

async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(test_config(temp_dir.path())).await.unwrap();
    (ledger, temp_dir)
}

/// Register a carrier and a trip, returning the trip key
async fn register_trip(ledger: &Ledger, carrier: &Identity) -> TripKey {
    ledger
        .register_carrier("Northwind", carrier.clone())
        .await
        .unwrap();
    ledger
        .register_trip("TS-100", carrier.clone(), 1_700_000_000_000)
        .await
        .unwrap()
}

// Deterministic behavioral properties

#[tokio::test]
async fn gate_enabled_after_initialization() {
    let (ledger, _temp) = create_test_ledger().await;
    assert!(ledger.is_enabled().unwrap());
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn disabled_gate_blocks_registration_without_mutation() {
    let (ledger, _temp) = create_test_ledger().await;
    let owner = Identity::new("owner-1");
    let carrier = Identity::new("C1");

    ledger.set_enabled(owner, false).await.unwrap();

    let err = ledger
        .register_carrier("Northwind", carrier.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotEnabled));
    assert!(matches!(
        ledger.get_carrier(&carrier).unwrap_err(),
        Error::CarrierNotFound(_)
    ));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn non_owner_cannot_flip_gate() {
    let (ledger, _temp) = create_test_ledger().await;

    let err = ledger
        .set_enabled(Identity::new("mallory"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotOwner(_)));
    assert!(ledger.is_enabled().unwrap());

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn reregistration_resets_funding() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");

    ledger
        .register_carrier("Northwind", carrier.clone())
        .await
        .unwrap();
    ledger.fund_carrier(carrier.clone()).await.unwrap();
    assert!(ledger.get_carrier(&carrier).unwrap().is_funded);

    // Upsert semantics: registering again clears the funded flag
    ledger
        .register_carrier("Northwind", carrier.clone())
        .await
        .unwrap();
    assert!(!ledger.get_carrier(&carrier).unwrap().is_funded);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn trip_registration_key_is_stable() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    ledger
        .register_carrier("Northwind", carrier.clone())
        .await
        .unwrap();

    let key1 = ledger
        .register_trip("TS-100", carrier.clone(), 1_700_000_000_000)
        .await
        .unwrap();
    let key2 = ledger
        .register_trip("TS-100", carrier.clone(), 1_700_000_000_000)
        .await
        .unwrap();

    assert_eq!(key1, key2);
    assert_eq!(key1, TripKey::derive(&carrier, "TS-100", 1_700_000_000_000));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn purchases_accumulate_in_order() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    let holder = Identity::new("H1");
    let key = register_trip(&ledger, &carrier).await;

    ledger
        .purchase_policy(holder.clone(), key, 10)
        .await
        .unwrap();
    ledger
        .purchase_policy(holder.clone(), key, 20)
        .await
        .unwrap();

    let policies = ledger.list_policies(&key).unwrap();
    assert_eq!(policies.len(), 2);
    assert_eq!(policies[0].amount, 10);
    assert_eq!(policies[1].amount, 20);
    assert!(policies.iter().all(|p| !p.is_settled()));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn credit_announces_payouts_without_paying() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    let holder = Identity::new("H1");
    let key = register_trip(&ledger, &carrier).await;

    ledger
        .purchase_policy(holder.clone(), key, 10)
        .await
        .unwrap();
    ledger
        .purchase_policy(holder.clone(), key, 20)
        .await
        .unwrap();

    let credited = ledger.credit_trip(key).await.unwrap();
    let amounts: Vec<u64> = credited
        .iter()
        .map(|n| match &n.kind {
            NotificationKind::PolicyCredited { amount, .. } => *amount,
            other => panic!("unexpected notification: {:?}", other),
        })
        .collect();
    assert_eq!(amounts, vec![15, 30]);

    assert!(ledger
        .list_policies(&key)
        .unwrap()
        .iter()
        .all(|p| p.is_settled()));
    // Crediting is an announcement, not a payment
    assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 0);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn withdrawal_pays_each_policy_at_most_once() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    let holder = Identity::new("H1");
    let key = register_trip(&ledger, &carrier).await;

    ledger
        .purchase_policy(holder.clone(), key, 10)
        .await
        .unwrap();

    let first = ledger.withdraw_for(holder.clone(), key).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 15);

    // The second call is a no-op for the already-paid policy
    let second = ledger.withdraw_for(holder.clone(), key).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 15);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn funding_unregistered_carrier_fails_cleanly() {
    let (ledger, _temp) = create_test_ledger().await;
    let ghost = Identity::new("ghost");

    let err = ledger.fund_carrier(ghost.clone()).await.unwrap_err();
    assert!(matches!(err, Error::CarrierNotRegistered(_)));
    assert!(matches!(
        ledger.get_carrier(&ghost).unwrap_err(),
        Error::CarrierNotFound(_)
    ));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn reopen_preserves_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    let carrier = Identity::new("C1");
    let holder = Identity::new("H1");
    let key;

    {
        let ledger = Ledger::open(test_config(temp_dir.path())).await.unwrap();
        key = register_trip(&ledger, &carrier).await;
        ledger
            .purchase_policy(holder.clone(), key, 10)
            .await
            .unwrap();
        ledger.withdraw_for(holder.clone(), key).await.unwrap();
        ledger.shutdown().await.unwrap();
    }

    let ledger = Ledger::open(test_config(temp_dir.path())).await.unwrap();
    assert!(ledger.is_enabled().unwrap());
    assert_eq!(ledger.owner().unwrap(), Identity::new("owner-1"));
    assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 15);
    // Exactly-once survives a restart
    assert!(ledger.withdraw_for(holder.clone(), key).await.unwrap().is_empty());
    assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 15);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn oracle_status_updates_trip() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    let key = register_trip(&ledger, &carrier).await;

    assert_eq!(ledger.get_trip(&key).unwrap().status, TripStatus::Unknown);

    ledger
        .record_trip_status(key, TripStatus::LateWeather, 1_700_000_200_000)
        .await
        .unwrap();

    let trip = ledger.get_trip(&key).unwrap();
    assert_eq!(trip.status, TripStatus::LateWeather);
    assert_eq!(trip.updated_at_ms, 1_700_000_200_000);

    let ghost = TripKey::derive(&carrier, "ghost", 0);
    assert!(matches!(
        ledger
            .record_trip_status(ghost, TripStatus::OnTime, 0)
            .await
            .unwrap_err(),
        Error::TripNotRegistered(_)
    ));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn broadcast_matches_returned_notifications() {
    let (ledger, _temp) = create_test_ledger().await;
    let carrier = Identity::new("C1");
    let holder = Identity::new("H1");
    let key = register_trip(&ledger, &carrier).await;
    ledger
        .purchase_policy(holder.clone(), key, 10)
        .await
        .unwrap();

    let mut stream = ledger.subscribe();
    let returned = ledger.credit_trip(key).await.unwrap();
    assert_eq!(returned.len(), 1);

    let observed = stream.recv().await.unwrap();
    assert_eq!(observed.id, returned[0].id);
    assert_eq!(observed.kind, returned[0].kind);

    ledger.shutdown().await.unwrap();
}

// Randomized properties

/// Strategy for face values small enough that payouts cannot overflow
fn amount_strategy() -> impl Strategy<Value = u64> {
    1u64..100_000_000
}

/// Strategy for party identities
fn identity_strategy() -> impl Strategy<Value = Identity> {
    "[A-Z]{2}[0-9]{8}".prop_map(Identity::new)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: trip keys are a pure function of their three inputs
    #[test]
    fn prop_trip_key_deterministic(
        carrier in identity_strategy(),
        name in "[A-Z]{2}-[0-9]{4}",
        scheduled_at_ms in 0i64..4_102_444_800_000,
    ) {
        let key1 = TripKey::derive(&carrier, &name, scheduled_at_ms);
        let key2 = TripKey::derive(&carrier, &name, scheduled_at_ms);
        prop_assert_eq!(key1, key2);
    }

    /// Property: payout is exactly floor(amount * 3 / 2)
    #[test]
    fn prop_payout_is_truncated_three_halves(amount in amount_strategy()) {
        let expected = (amount as u128 * 3 / 2) as u64;
        prop_assert_eq!(payout(amount).unwrap(), expected);
    }

    /// Property: after withdrawal the balance is Σ floor(amount * 3 / 2),
    /// purchase order is preserved, and a repeat withdrawal changes nothing
    #[test]
    fn prop_withdrawal_accounting(amounts in prop::collection::vec(amount_strategy(), 1..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let carrier = Identity::new("C1");
            let holder = Identity::new("H1");
            let key = register_trip(&ledger, &carrier).await;

            for &amount in &amounts {
                ledger.purchase_policy(holder.clone(), key, amount).await.unwrap();
            }

            let policies = ledger.list_policies(&key).unwrap();
            prop_assert_eq!(policies.len(), amounts.len());
            for (policy, &amount) in policies.iter().zip(&amounts) {
                prop_assert_eq!(policy.amount, amount);
            }

            let expected: u64 = amounts.iter().map(|&a| a + a / 2).sum();

            ledger.withdraw_for(holder.clone(), key).await.unwrap();
            prop_assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, expected);

            let again = ledger.withdraw_for(holder.clone(), key).await.unwrap();
            prop_assert!(again.is_empty());
            prop_assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, expected);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: crediting emits one announcement per policy, in order,
    /// without touching balances
    #[test]
    fn prop_credit_emits_per_policy(amounts in prop::collection::vec(amount_strategy(), 1..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let carrier = Identity::new("C1");
            let holder = Identity::new("H1");
            let key = register_trip(&ledger, &carrier).await;

            for &amount in &amounts {
                ledger.purchase_policy(holder.clone(), key, amount).await.unwrap();
            }

            let credited = ledger.credit_trip(key).await.unwrap();
            prop_assert_eq!(credited.len(), amounts.len());
            for (notification, &amount) in credited.iter().zip(&amounts) {
                match &notification.kind {
                    NotificationKind::PolicyCredited { amount: paid, .. } => {
                        prop_assert_eq!(*paid, amount + amount / 2);
                    }
                    other => panic!("unexpected notification: {:?}", other),
                }
            }
            prop_assert_eq!(ledger.get_policyholder(&holder).unwrap().balance, 0);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
