// Distribution domain error types

use thiserror::Error;

use super::{DistributorId, RateBps};

/// Errors raised while validating distribution records and configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistributionError {
    /// Requested level exceeds maximum allowed
    #[error("Requested {requested} levels exceeds maximum {max}")]
    TooManyLevels { max: u8, requested: usize },

    /// A single rate is above 100%
    #[error("Reward rate {rate} at level {level} exceeds 10000 (100%)")]
    RateTooHigh { level: u8, rate: RateBps },

    /// Total reward rate exceeds 100%
    #[error("Total reward rate {total} exceeds 10000 (100%)")]
    RatesTooHigh { total: u32 },

    /// Distributor level outside of 1..=MAX_DISTRIBUTION_LEVEL
    #[error("Invalid distributor level {0}")]
    InvalidLevel(u8),

    /// Campaign configured with a maximum distribution level out of range
    #[error("Invalid maximum distribution level {0}")]
    InvalidMaxLevel(u8),

    /// Attempted to set self as parent
    #[error("Distributor {0} cannot be its own parent")]
    SelfParent(DistributorId),

    /// Cumulative earnings would overflow
    #[error("Earnings overflow for distributor {0}")]
    EarningsOverflow(DistributorId),
}

/// Result type for distribution operations
pub type DistributionResult<T> = Result<T, DistributionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DistributionError::TooManyLevels {
            max: 3,
            requested: 5,
        };
        assert_eq!(err.to_string(), "Requested 5 levels exceeds maximum 3");

        let err = DistributionError::RatesTooHigh { total: 12000 };
        assert_eq!(
            err.to_string(),
            "Total reward rate 12000 exceeds 10000 (100%)"
        );
    }
}
