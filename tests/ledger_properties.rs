//! Ledger guarantees, checked against every storage backend
//!
//! Each test runs once per `StoreKind`. The SQLite runs use a database file
//! in a temporary directory so the pool's connections share one database.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use rust_ledger_engine::{
        max_amount, AnyStore, LedgerConfig, LedgerEngine, LedgerError, LedgerStore, NewUser,
        SqliteConfig, StoreKind, TransactionRequest, UnitOfWork, User,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    /// Engine plus the directory its SQLite file lives in
    struct Harness {
        engine: LedgerEngine<AnyStore>,
        _dir: TempDir,
    }

    async fn harness(kind: StoreKind) -> Harness {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        let config = LedgerConfig {
            store: kind,
            sqlite: SqliteConfig::new(url, 4, Duration::from_secs(5)),
            transaction_timeout: None,
        };
        let store = AnyStore::open(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to open {:?} store: {}", kind, e));
        assert_eq!(store.kind(), kind);

        Harness {
            engine: LedgerEngine::new(store),
            _dir: dir,
        }
    }

    async fn user(engine: &LedgerEngine<AnyStore>, name: &str) -> User {
        engine
            .create_user(NewUser::new(name, format!("{name}@example.com"), 30))
            .await
            .unwrap()
    }

    /// Sum of the signed amounts of a user's committed history in one currency
    async fn history_total(engine: &LedgerEngine<AnyStore>, user: &User, currency: &str) -> Decimal {
        engine
            .list_transactions(user.id)
            .await
            .unwrap()
            .iter()
            .filter(|tx| tx.currency == currency)
            .map(|tx| tx.signed_amount())
            .sum()
    }

    #[rstest]
    #[tokio::test]
    async fn test_first_deposit_opens_balance(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;

        let tx = h
            .engine
            .create_transaction(TransactionRequest::deposit("a-1", alice.id, "USD", dec!(1000.00)))
            .await
            .unwrap();

        assert_eq!(tx.amount, dec!(1000.00));
        let balance = h.engine.get_balance(alice.id, "USD").await.unwrap();
        assert_eq!(balance.amount, dec!(1000.00));
        assert_eq!(h.engine.get_transaction("a-1").await.unwrap(), tx);
    }

    #[rstest]
    #[tokio::test]
    async fn test_overdraft_is_rejected_and_leaves_no_trace(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        h.engine
            .create_transaction(TransactionRequest::deposit("b-1", alice.id, "USD", dec!(1000.00)))
            .await
            .unwrap();

        let result = h
            .engine
            .create_transaction(TransactionRequest::withdrawal(
                "b-2",
                alice.id,
                "USD",
                dec!(1500.00),
            ))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        let balance = h.engine.get_balance(alice.id, "USD").await.unwrap();
        assert_eq!(balance.amount, dec!(1000.00));
        assert!(matches!(
            h.engine.get_transaction("b-2").await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_repeated_id_is_applied_once(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        let request = TransactionRequest::deposit("c-1", alice.id, "EUR", dec!(100.00));

        h.engine.create_transaction(request.clone()).await.unwrap();
        let second = h.engine.create_transaction(request).await;

        assert_eq!(
            second,
            Err(LedgerError::DuplicateTransaction {
                id: "c-1".to_string()
            })
        );
        let balance = h.engine.get_balance(alice.id, "EUR").await.unwrap();
        assert_eq!(balance.amount, dec!(100.00));
        assert_eq!(h.engine.list_transactions(alice.id).await.unwrap().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_repeated_id_is_rejected_across_users_and_currencies(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        let bob = user(&h.engine, "bob").await;
        h.engine
            .create_transaction(TransactionRequest::deposit("shared", alice.id, "USD", dec!(5)))
            .await
            .unwrap();

        let result = h
            .engine
            .create_transaction(TransactionRequest::deposit("shared", bob.id, "GBP", dec!(7)))
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateTransaction { .. })
        ));
        assert!(matches!(
            h.engine.get_balance(bob.id, "GBP").await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(h.engine.list_balances(bob.id).await.unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdrawals_drain_to_exactly_zero(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        h.engine
            .create_transaction(TransactionRequest::deposit("seed", alice.id, "USD", dec!(100.00)))
            .await
            .unwrap();

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let engine = h.engine.clone();
                let user_id = alice.id;
                tokio::spawn(async move {
                    engine
                        .create_transaction(TransactionRequest::withdrawal(
                            format!("d-{i}"),
                            user_id,
                            "USD",
                            dec!(10.00),
                        ))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientFunds { .. }) => insufficient += 1,
                Err(other) => panic!("Unexpected error on {:?}: {:?}", kind, other),
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(insufficient, 40);
        let balance = h.engine.get_balance(alice.id, "USD").await.unwrap();
        assert_eq!(balance.amount, Decimal::ZERO);
        assert_eq!(h.engine.list_transactions(alice.id).await.unwrap().len(), 11);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_commit_once(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let engine = h.engine.clone();
                let request = TransactionRequest::deposit("same", alice.id, "USD", dec!(25));
                tokio::spawn(async move { engine.create_transaction(request).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::DuplicateTransaction { .. }) => {}
                Err(other) => panic!("Unexpected error on {:?}: {:?}", kind, other),
            }
        }

        assert_eq!(succeeded, 1);
        let balance = h.engine.get_balance(alice.id, "USD").await.unwrap();
        assert_eq!(balance.amount, dec!(25));
    }

    #[rstest]
    #[tokio::test]
    async fn test_balances_equal_committed_history(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        let script = [
            TransactionRequest::deposit("s-1", alice.id, "USD", dec!(40.25)),
            TransactionRequest::deposit("s-2", alice.id, "EUR", dec!(12.5)),
            TransactionRequest::withdrawal("s-3", alice.id, "USD", dec!(15.0001)),
            TransactionRequest::withdrawal("s-4", alice.id, "EUR", dec!(20)),
            TransactionRequest::withdrawal("s-5", alice.id, "JPY", dec!(1)),
            TransactionRequest::deposit("s-1", alice.id, "USD", dec!(1000)),
            TransactionRequest::deposit("s-6", alice.id, "USD", dec!(0.0001)),
            TransactionRequest::withdrawal("s-7", alice.id, "EUR", dec!(12.5)),
        ];

        let mut applied = 0;
        for request in script {
            let id = request.id.clone();
            match h.engine.create_transaction(request).await {
                Ok(_) => applied += 1,
                Err(LedgerError::InsufficientFunds { .. }) => {
                    assert!(h.engine.get_transaction(&id).await.is_err());
                }
                Err(LedgerError::DuplicateTransaction { .. }) => {}
                Err(other) => panic!("Unexpected error on {:?}: {:?}", kind, other),
            }
        }

        assert_eq!(applied, 5);
        let balances = h.engine.list_balances(alice.id).await.unwrap();
        let currencies: Vec<_> = balances.iter().map(|b| b.currency.as_str()).collect();
        assert_eq!(currencies, ["EUR", "USD"]);
        for balance in &balances {
            assert!(balance.amount >= Decimal::ZERO);
            assert_eq!(
                balance.amount,
                history_total(&h.engine, &alice, &balance.currency).await
            );
        }
        assert_eq!(balances[0].amount, Decimal::ZERO);
        assert_eq!(balances[1].amount, dec!(25.25));
    }

    #[rstest]
    #[tokio::test]
    async fn test_unknown_user_writes_nothing(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;

        let result = h
            .engine
            .create_transaction(TransactionRequest::deposit("ghost", 404, "USD", dec!(1)))
            .await;

        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
        assert!(h.engine.get_transaction("ghost").await.is_err());
        assert!(h.engine.list_balances(404).await.unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_currencies_are_independent(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        h.engine
            .create_transaction(TransactionRequest::deposit("i-1", alice.id, "USD", dec!(10)))
            .await
            .unwrap();

        let result = h
            .engine
            .create_transaction(TransactionRequest::withdrawal("i-2", alice.id, "usd", dec!(1)))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(
            h.engine.get_balance(alice.id, "USD").await.unwrap().amount,
            dec!(10)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_balance_above_max_amount_is_rejected(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;
        h.engine
            .create_transaction(TransactionRequest::deposit("o-1", alice.id, "USD", max_amount()))
            .await
            .unwrap();

        let result = h
            .engine
            .create_transaction(TransactionRequest::deposit("o-2", alice.id, "USD", dec!(1)))
            .await;

        assert!(
            matches!(result, Err(LedgerError::InvalidInput { ref field, .. }) if field == "amount"),
            "Unexpected result on {:?}: {:?}",
            kind,
            result
        );
        assert_eq!(
            h.engine.get_balance(alice.id, "USD").await.unwrap().amount,
            max_amount()
        );
        assert!(h.engine.get_transaction("o-2").await.is_err());

        // The full range stays usable after the rejection
        h.engine
            .create_transaction(TransactionRequest::withdrawal("o-3", alice.id, "USD", dec!(1)))
            .await
            .unwrap();
        h.engine
            .create_transaction(TransactionRequest::deposit("o-4", alice.id, "USD", dec!(1)))
            .await
            .unwrap();
        assert_eq!(
            h.engine.get_balance(alice.id, "USD").await.unwrap().amount,
            max_amount()
        );
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_updated_at_is_not_older_than_any_committed_transaction(
        #[values(StoreKind::Memory, StoreKind::Sqlite)] kind: StoreKind,
    ) {
        let h = harness(kind).await;
        let alice = user(&h.engine, "alice").await;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let engine = h.engine.clone();
                let request = TransactionRequest::deposit(format!("t-{i}"), alice.id, "USD", dec!(1));
                tokio::spawn(async move { engine.create_transaction(request).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let balance = h.engine.get_balance(alice.id, "USD").await.unwrap();
        let history = h.engine.list_transactions(alice.id).await.unwrap();
        assert_eq!(history.len(), 20);
        assert_eq!(balance.amount, dec!(20));
        for tx in &history {
            assert!(
                balance.updated_at >= tx.created_at,
                "updated_at {} precedes {} created at {} on {:?}",
                balance.updated_at,
                tx.id,
                tx.created_at,
                kind
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timed_out_attempt_rolls_back_and_can_be_retried() {
        let h = harness(StoreKind::Sqlite).await;
        let alice = user(&h.engine, "alice").await;
        let bob = user(&h.engine, "bob").await;

        // An open write holds the database lock until it is rolled back
        let mut blocker = h.engine.store().begin().await.unwrap();
        blocker
            .insert_transaction(&rust_ledger_engine::Transaction {
                id: "blocker".to_string(),
                user_id: bob.id,
                amount: dec!(1),
                currency: "USD".to_string(),
                tx_type: rust_ledger_engine::TransactionType::Deposit,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let request = TransactionRequest::deposit("slow", alice.id, "USD", dec!(3));
        let result = h
            .engine
            .create_transaction_within(request.clone(), Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(LedgerError::Timeout { .. })));
        assert!(matches!(
            h.engine.get_transaction("slow").await,
            Err(LedgerError::NotFound { .. })
        ));

        blocker.rollback().await.unwrap();

        let retried = h.engine.create_transaction(request).await.unwrap();
        assert_eq!(retried.id, "slow");
        assert_eq!(
            h.engine.get_balance(alice.id, "USD").await.unwrap().amount,
            dec!(3)
        );
        assert!(h.engine.get_transaction("blocker").await.is_err());
    }
}
