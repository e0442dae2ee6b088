mod balance;
mod campaign;
mod distributor;
mod reward;
mod sequence;
mod snapshot;
mod withdrawal;

pub use balance::*;
pub use campaign::*;
pub use distributor::*;
pub use reward::*;
pub use sequence::*;
pub use snapshot::*;
pub use withdrawal::*;
