mod balance;
mod campaign;
mod distributor;
mod reward;
mod sequence;
mod snapshot;
mod withdrawal;
