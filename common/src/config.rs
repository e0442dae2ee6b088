pub const VERSION: &str = env!("BUILD_VERSION");

// Payout schedule applied when a brand has none configured: 5% / 2% / 1%
pub const DEFAULT_LEVEL_RATES: [u16; 3] = [500, 200, 100];
