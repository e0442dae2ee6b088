use strum::{AsRefStr, Display, EnumIter};

const PREFIX_ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    // All distributors
    // {distributor_id} => {distributor}
    Distributors,
    // Unique index per user and brand
    // {user_id}{brand_id} => {distributor_id}
    DistributorsByUser,
    // Direct subordinates of a distributor
    // {parent_id}{child_id} => {}
    DistributorChildren,

    // Reward ledger, one entry per order and distributor
    // {order_id}{distributor_id} => {reward}
    Rewards,
    // Reverse index of the reward ledger
    // {distributor_id}{order_id} => {}
    RewardsByDistributor,
    // Orders already settled
    // {order_id} => {settlement marker}
    SettledOrders,

    // Versioned user balances
    // {user_id} => {balance}
    Balances,

    // Withdrawal requests
    // {withdrawal_id} => {request}
    Withdrawals,
    // {user_id}{withdrawal_id} => {}
    WithdrawalsByUser,

    // Level reward tables
    // {brand_id} => {table}
    BrandRewards,
    // Campaign distribution settings
    // {campaign_id} => {settings}
    Campaigns,

    // Misc data with no specific rules
    Common,
}

impl Column {
    pub fn prefix(&self) -> Option<usize> {
        use Column::*;

        match self {
            DistributorChildren | Rewards | RewardsByDistributor | WithdrawalsByUser => {
                Some(PREFIX_ID_LEN)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_column_names() {
        assert_eq!(Column::DistributorsByUser.to_string(), "distributors_by_user");
        assert_eq!(Column::SettledOrders.as_ref(), "settled_orders");
        assert_eq!(Column::iter().count(), 12);
    }
}
