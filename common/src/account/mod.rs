mod balance;

pub use balance::{attempt_write, BalanceError, BalanceMutation, UserBalance, WriteOutcome};
