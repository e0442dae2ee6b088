pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod hierarchy;
pub mod ledger;
pub mod payout;
pub mod settlement;
pub mod storage;
pub mod withdrawal;
