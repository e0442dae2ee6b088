use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::distribution::{Amount, UserId};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
    #[error("Balance overflow")]
    Overflow,
}

/// A change applied to a user balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMutation {
    /// Reward credit, also counted in the lifetime total
    Credit(Amount),
    /// Compensating credit of a rejected withdrawal
    Refund(Amount),
    /// Withdrawal debit, refused when the balance is too low
    Debit(Amount),
}

impl BalanceMutation {
    pub fn amount(&self) -> Amount {
        match self {
            Self::Credit(amount) | Self::Refund(amount) | Self::Debit(amount) => *amount,
        }
    }
}

/// Per user accumulator guarded by a version counter.
/// The version is bumped by exactly one on every successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBalance {
    pub user_id: UserId,
    pub balance: Amount,
    pub total_reward: Amount,
    pub version: u64,
}

impl UserBalance {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            total_reward: 0,
            version: 0,
        }
    }

    // Compute the next state, version included
    pub fn apply(&self, mutation: BalanceMutation) -> Result<UserBalance, BalanceError> {
        let mut next = self.clone();
        match mutation {
            BalanceMutation::Credit(amount) => {
                next.balance = self
                    .balance
                    .checked_add(amount)
                    .ok_or(BalanceError::Overflow)?;
                next.total_reward = self
                    .total_reward
                    .checked_add(amount)
                    .ok_or(BalanceError::Overflow)?;
            }
            BalanceMutation::Refund(amount) => {
                next.balance = self
                    .balance
                    .checked_add(amount)
                    .ok_or(BalanceError::Overflow)?;
            }
            BalanceMutation::Debit(amount) => {
                next.balance =
                    self.balance
                        .checked_sub(amount)
                        .ok_or(BalanceError::InsufficientFunds {
                            needed: amount,
                            available: self.balance,
                        })?;
            }
        }
        next.version = self.version.checked_add(1).ok_or(BalanceError::Overflow)?;
        Ok(next)
    }
}

impl Serializer for UserBalance {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            user_id: reader.read_u64()?,
            balance: reader.read_u64()?,
            total_reward: reader.read_u64()?,
            version: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.user_id);
        writer.write_u64(self.balance);
        writer.write_u64(self.total_reward);
        writer.write_u64(self.version);
    }

    fn size(&self) -> usize {
        32
    }
}

/// Result of a conditional balance write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(UserBalance),
    /// The stored version moved since it was read
    Conflict { expected: u64, found: u64 },
}

/// Conditional write of a balance row.
///
/// `current` is the row as stored right now (`None` when absent, which counts as
/// version 0). The mutation is applied only if the stored version still equals
/// `expected_version`. A debit against an absent row is always refused.
pub fn attempt_write(
    current: Option<&UserBalance>,
    user_id: UserId,
    expected_version: u64,
    mutation: BalanceMutation,
) -> Result<WriteOutcome, BalanceError> {
    let found = current.map_or(0, |balance| balance.version);
    if found != expected_version {
        return Ok(WriteOutcome::Conflict {
            expected: expected_version,
            found,
        });
    }

    match current {
        Some(balance) => balance.apply(mutation).map(WriteOutcome::Applied),
        None => match mutation {
            BalanceMutation::Debit(amount) => Err(BalanceError::InsufficientFunds {
                needed: amount,
                available: 0,
            }),
            _ => UserBalance::new(user_id)
                .apply(mutation)
                .map(WriteOutcome::Applied),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_credit_creates_row() {
        let outcome = attempt_write(None, 1, 0, BalanceMutation::Credit(2_000)).unwrap();
        let WriteOutcome::Applied(balance) = outcome else {
            panic!("expected applied");
        };
        assert_eq!(balance.balance, 2_000);
        assert_eq!(balance.total_reward, 2_000);
        assert_eq!(balance.version, 1);
    }

    #[test]
    fn test_debit_on_absent_row() {
        let result = attempt_write(None, 1, 0, BalanceMutation::Debit(1));
        assert_eq!(
            result,
            Err(BalanceError::InsufficientFunds {
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_stale_version_conflicts() {
        let mut stored = UserBalance::new(1);
        stored.balance = 500;
        stored.version = 4;

        let outcome = attempt_write(Some(&stored), 1, 3, BalanceMutation::Credit(10)).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Conflict {
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn test_refund_keeps_total_reward() {
        let mut stored = UserBalance::new(1);
        stored.balance = 900;
        stored.total_reward = 1_000;
        stored.version = 2;

        let next = stored.apply(BalanceMutation::Refund(100)).unwrap();
        assert_eq!(next.balance, 1_000);
        assert_eq!(next.total_reward, 1_000);
        assert_eq!(next.version, 3);
    }

    #[test]
    fn test_debit_insufficient() {
        let mut stored = UserBalance::new(1);
        stored.balance = 99;
        assert_eq!(
            stored.apply(BalanceMutation::Debit(100)),
            Err(BalanceError::InsufficientFunds {
                needed: 100,
                available: 99
            })
        );
    }

    #[test]
    fn test_serialization() {
        let balance = UserBalance {
            user_id: 3,
            balance: 100,
            total_reward: 200,
            version: 9,
        };
        let bytes = balance.to_bytes();
        assert_eq!(bytes.len(), balance.size());
        assert_eq!(UserBalance::from_bytes(&bytes).unwrap(), balance);
    }

    fn mutation_strategy() -> impl Strategy<Value = BalanceMutation> {
        prop_oneof![
            (0u64..100_000).prop_map(BalanceMutation::Credit),
            (0u64..100_000).prop_map(BalanceMutation::Refund),
            (0u64..200_000).prop_map(BalanceMutation::Debit),
        ]
    }

    proptest! {
        // Balance never goes below zero and the version counts successful writes
        #[test]
        fn test_balance_sequence_invariants(
            mutations in prop::collection::vec(mutation_strategy(), 0..64),
        ) {
            let mut stored: Option<UserBalance> = None;
            let mut applied = 0u64;

            for mutation in mutations {
                let expected = stored.as_ref().map_or(0, |b| b.version);
                match attempt_write(stored.as_ref(), 1, expected, mutation) {
                    Ok(WriteOutcome::Applied(next)) => {
                        applied += 1;
                        stored = Some(next);
                    }
                    Ok(WriteOutcome::Conflict { .. }) => prop_assert!(false, "no concurrent writer"),
                    Err(BalanceError::InsufficientFunds { needed, available }) => {
                        prop_assert!(needed > available);
                    }
                    Err(BalanceError::Overflow) => prop_assert!(false, "amounts are bounded"),
                }
            }

            let version = stored.as_ref().map_or(0, |b| b.version);
            prop_assert_eq!(version, applied);
        }

        #[test]
        fn test_stale_writes_never_apply(
            version in 1u64..1_000,
            stale in 0u64..1_000,
            amount in 0u64..1_000,
        ) {
            prop_assume!(version != stale);
            let mut stored = UserBalance::new(1);
            stored.version = version;
            let outcome = attempt_write(Some(&stored), 1, stale, BalanceMutation::Credit(amount));
            let is_conflict = matches!(outcome, Ok(WriteOutcome::Conflict { .. }));
            prop_assert!(is_conflict);
        }
    }
}
