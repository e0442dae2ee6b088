use super::Column;
use crate::core::storage::snapshot::Snapshot as GenericSnapshot;

pub type Snapshot = GenericSnapshot<Column>;
