use crate::{
    config::MAX_BALANCE_WRITE_ATTEMPTS,
    core::{error::EngineError, storage::BalanceProvider},
};
use distrib_common::{
    account::{BalanceMutation, UserBalance, WriteOutcome},
    distribution::{Amount, UserId},
};
use log::{debug, trace};

/// Credit a reward to the balance of a user, creating the row if needed
pub async fn credit<P: BalanceProvider + ?Sized>(
    provider: &mut P,
    user: UserId,
    amount: Amount,
) -> Result<UserBalance, EngineError> {
    write_with_retries(provider, user, BalanceMutation::Credit(amount)).await
}

/// Give back a debited amount, the lifetime reward total is left untouched
pub async fn refund<P: BalanceProvider + ?Sized>(
    provider: &mut P,
    user: UserId,
    amount: Amount,
) -> Result<UserBalance, EngineError> {
    write_with_retries(provider, user, BalanceMutation::Refund(amount)).await
}

/// Debit a balance, refused with `InsufficientFunds` if it would go negative
pub async fn debit<P: BalanceProvider + ?Sized>(
    provider: &mut P,
    user: UserId,
    amount: Amount,
) -> Result<UserBalance, EngineError> {
    write_with_retries(provider, user, BalanceMutation::Debit(amount)).await
}

// Read the current version then try a conditional write,
// up to MAX_BALANCE_WRITE_ATTEMPTS times
async fn write_with_retries<P: BalanceProvider + ?Sized>(
    provider: &mut P,
    user: UserId,
    mutation: BalanceMutation,
) -> Result<UserBalance, EngineError> {
    for attempt in 1..=MAX_BALANCE_WRITE_ATTEMPTS {
        let expected_version = provider
            .get_user_balance(user)
            .await?
            .map_or(0, |balance| balance.version);

        match provider
            .write_user_balance(user, expected_version, mutation)
            .await?
        {
            WriteOutcome::Applied(balance) => {
                if log::log_enabled!(log::Level::Trace) {
                    trace!(
                        "balance of user {} is now {} at version {}",
                        user,
                        balance.balance,
                        balance.version
                    );
                }
                return Ok(balance);
            }
            WriteOutcome::Conflict { expected, found } => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!(
                        "balance write conflict for user {} (attempt {}/{}): expected version {}, found {}",
                        user, attempt, MAX_BALANCE_WRITE_ATTEMPTS, expected, found
                    );
                }
            }
        }
    }

    Err(EngineError::ConcurrencyExhausted {
        resource: format!("balance of user {}", user),
        attempts: MAX_BALANCE_WRITE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use distrib_common::account::attempt_write;
    use proptest::prelude::*;

    // In memory balance row with a number of forced concurrent writes
    struct ContendedBalance {
        row: Option<UserBalance>,
        // Each pending interference bumps the version between read and write
        interferences: usize,
        writes: usize,
    }

    impl ContendedBalance {
        fn new(row: Option<UserBalance>, interferences: usize) -> Self {
            Self {
                row,
                interferences,
                writes: 0,
            }
        }
    }

    #[async_trait]
    impl BalanceProvider for ContendedBalance {
        async fn get_user_balance(
            &self,
            _: UserId,
        ) -> Result<Option<UserBalance>, EngineError> {
            Ok(self.row.clone())
        }

        async fn write_user_balance(
            &mut self,
            user: UserId,
            expected_version: u64,
            mutation: BalanceMutation,
        ) -> Result<WriteOutcome, EngineError> {
            if self.interferences > 0 {
                self.interferences -= 1;
                let mut row = self.row.clone().unwrap_or_else(|| UserBalance::new(user));
                row.version += 1;
                self.row = Some(row);
            }

            let outcome = attempt_write(self.row.as_ref(), user, expected_version, mutation)
                .map_err(|e| EngineError::from_balance(user, e))?;
            if let WriteOutcome::Applied(balance) = &outcome {
                self.writes += 1;
                self.row = Some(balance.clone());
            }
            Ok(outcome)
        }
    }

    fn row(balance: Amount, version: u64) -> UserBalance {
        UserBalance {
            user_id: 1,
            balance,
            total_reward: balance,
            version,
        }
    }

    #[tokio::test]
    async fn test_credit_without_contention() {
        let mut provider = ContendedBalance::new(None, 0);
        let balance = credit(&mut provider, 1, 2_000).await.unwrap();
        assert_eq!(balance.balance, 2_000);
        assert_eq!(balance.total_reward, 2_000);
        assert_eq!(balance.version, 1);
    }

    #[tokio::test]
    async fn test_credit_retries_after_conflicts() {
        let mut provider = ContendedBalance::new(Some(row(100, 4)), 2);
        let balance = credit(&mut provider, 1, 50).await.unwrap();
        // Two foreign writes plus ours
        assert_eq!(balance.version, 7);
        assert_eq!(balance.balance, 150);
        assert_eq!(provider.writes, 1);
    }

    #[tokio::test]
    async fn test_concurrency_exhausted() {
        let mut provider = ContendedBalance::new(Some(row(100, 1)), MAX_BALANCE_WRITE_ATTEMPTS);
        let result = debit(&mut provider, 1, 10).await;
        assert!(matches!(
            result,
            Err(EngineError::ConcurrencyExhausted { attempts, .. }) if attempts == MAX_BALANCE_WRITE_ATTEMPTS
        ));
        assert_eq!(provider.writes, 0);
    }

    #[tokio::test]
    async fn test_debit_insufficient_funds() {
        let mut provider = ContendedBalance::new(Some(row(100, 1)), 0);
        let result = debit(&mut provider, 1, 101).await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientFunds {
                user: 1,
                needed: 101,
                available: 100
            })
        ));
        assert_eq!(provider.row.unwrap().version, 1);

        let mut provider = ContendedBalance::new(None, 0);
        assert!(matches!(
            debit(&mut provider, 1, 1).await,
            Err(EngineError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_refund_keeps_total_reward() {
        let mut provider = ContendedBalance::new(Some(row(1_000, 3)), 0);
        debit(&mut provider, 1, 400).await.unwrap();
        let balance = refund(&mut provider, 1, 400).await.unwrap();
        assert_eq!(balance.balance, 1_000);
        assert_eq!(balance.total_reward, 1_000);
        assert_eq!(balance.version, 5);
    }

    proptest! {
        #[test]
        fn test_version_counts_every_write(
            ops in prop::collection::vec(
                (any::<bool>(), 1u64..1_000, 0..MAX_BALANCE_WRITE_ATTEMPTS),
                1..40
            )
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut provider = ContendedBalance::new(None, 0);
                let mut expected_balance = 0;
                let mut expected_version = 0;

                for (is_credit, amount, interferences) in ops {
                    provider.interferences = interferences;
                    let result = if is_credit {
                        credit(&mut provider, 1, amount).await
                    } else {
                        debit(&mut provider, 1, amount).await
                    };

                    // Foreign writes that happened during this call
                    expected_version += (interferences - provider.interferences) as u64;
                    provider.interferences = 0;

                    match result {
                        Ok(balance) => {
                            expected_version += 1;
                            if is_credit {
                                expected_balance += amount;
                            } else {
                                expected_balance -= amount;
                            }
                            assert_eq!(balance.balance, expected_balance);
                            assert_eq!(balance.version, expected_version);
                        }
                        Err(EngineError::InsufficientFunds { .. }) => {
                            assert!(!is_credit);
                            assert!(amount > expected_balance);
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }

                let version = provider.row.map_or(0, |row| row.version);
                assert_eq!(version, expected_version);
            });
        }
    }
}
