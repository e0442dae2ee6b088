mod column;
mod providers;
mod snapshot;

use std::{collections::BTreeMap, sync::Arc};

use crate::core::{
    config::RocksDBConfig,
    error::{DiskContext, EngineError},
};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use distrib_common::serializer::{Reader, Serializer};
use log::{debug, info, trace};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompactionStyle, DBCompressionType,
    DBWithThreadMode, Direction, Env, IteratorMode, MultiThreaded, Options, ReadOptions,
    SliceTransform, WaitForCompactOptions,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

pub use column::*;
pub use snapshot::Snapshot;

use super::Storage;

macro_rules! cf_handle {
    ($db: expr, $column: expr) => {
        $db.cf_handle($column.as_ref())
            .with_context(|| format!("Column {:?} not found", $column))?
    };
}

pub(crate) use cf_handle;

type InnerDB = DBWithThreadMode<MultiThreaded>;

#[derive(Debug, Copy, Clone, Default, clap::ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    None,
    #[default]
    Snappy,
    Zlib,
    Bz2,
    Lz4,
    Lz4hc,
    Zstd,
}

#[derive(Debug, Copy, Clone, Default, clap::ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    None,
    #[default]
    Lru,
    HyperClock,
}

impl CompressionMode {
    pub fn convert(self) -> DBCompressionType {
        match self {
            Self::None => DBCompressionType::None,
            Self::Snappy => DBCompressionType::Snappy,
            Self::Zlib => DBCompressionType::Zlib,
            Self::Bz2 => DBCompressionType::Bz2,
            Self::Lz4 => DBCompressionType::Lz4,
            Self::Lz4hc => DBCompressionType::Lz4hc,
            Self::Zstd => DBCompressionType::Zstd,
        }
    }
}

/// RocksDB backed storage.
///
/// A `RocksStorage` is a session over a shared database: sessions created with
/// `Storage::new_session` share the DB and the commit lock, but each one has
/// its own snapshot.
pub struct RocksStorage {
    db: Arc<InnerDB>,
    // Serializes commit validation and batch writes between sessions
    commit_lock: Arc<Mutex<()>>,
    snapshot: Option<Snapshot>,
}

impl RocksStorage {
    pub fn new(dir: &str, config: &RocksDBConfig) -> Result<Self, EngineError> {
        let cfs = Column::iter().map(|column| {
            let name = column.to_string();
            let prefix = column.prefix();
            let mut opts = Options::default();
            if let Some(len) = prefix {
                opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(len));
            }

            ColumnFamilyDescriptor::new(name, opts)
        });

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compaction_style(DBCompactionStyle::Universal);

        opts.increase_parallelism(config.parallelism as _);
        opts.set_max_background_jobs(config.max_background_jobs as _);
        opts.set_max_subcompactions(config.max_subcompaction_jobs as _);

        opts.set_max_open_files(config.max_open_files);
        opts.set_keep_log_file_num(config.keep_max_log_files);

        let mut env = Env::new().context("Error while creating RocksDB env")?;
        env.set_low_priority_background_threads(config.low_priority_background_threads as _);
        opts.set_env(&env);
        opts.set_compression_type(config.compression_mode.convert());

        let mut block_opts = BlockBasedOptions::default();
        match config.cache_mode {
            CacheMode::None => {
                block_opts.disable_cache();
            }
            CacheMode::Lru => {
                let cache = Cache::new_lru_cache(config.cache_size);
                block_opts.set_block_cache(&cache);
            }
            CacheMode::HyperClock => {
                let cache = Cache::new_hyper_clock_cache(config.cache_size, 1024);
                block_opts.set_block_cache(&cache);
            }
        };

        opts.set_block_based_table_factory(&block_opts);
        if config.write_buffer_shared {
            opts.set_db_write_buffer_size(config.write_buffer_size);
        } else {
            opts.set_write_buffer_size(config.write_buffer_size);
        }

        info!("Opening RocksDB at {}", dir);
        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, dir, cfs)
            .with_context(|| format!("Failed to open RocksDB at {}", dir))?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            snapshot: None,
        })
    }

    // Key made of two big-endian ids, so that the first one can be used as prefix
    pub(super) fn get_pair_key(prefix: u64, suffix: u64) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[0..8].copy_from_slice(&prefix.to_be_bytes());
        key[8..16].copy_from_slice(&suffix.to_be_bytes());
        key
    }

    // Second id of a pair key
    pub(super) fn get_suffix_id(key: &[u8]) -> Result<u64, EngineError> {
        let mut reader = Reader::new(key);
        reader.read_bytes_ref(8)?;
        Ok(reader.read_u64()?)
    }

    pub(super) fn insert_into_disk<K: AsRef<[u8]>, V: Serializer>(
        &mut self,
        column: Column,
        key: K,
        value: &V,
    ) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("insert into disk {:?}", column);
        }

        match self.snapshot.as_mut() {
            Some(snapshot) => {
                snapshot.put(column, key.as_ref().to_vec(), value.to_bytes());
            }
            None => {
                let cf = cf_handle!(self.db, column);
                self.db
                    .put_cf(&cf, key.as_ref(), value.to_bytes())
                    .with_context(|| {
                        format!("Error while inserting into disk column {:?}", column)
                    })?;
            }
        };

        Ok(())
    }

    pub fn contains_data<K: AsRef<[u8]> + ?Sized>(
        &self,
        column: Column,
        key: &K,
    ) -> Result<bool, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("contains data {:?}", column);
        }

        let key_bytes = key.as_ref();
        if let Some(snapshot) = self.snapshot.as_ref() {
            if snapshot.get(&column, key_bytes).is_some() {
                return Ok(true);
            }
        }

        let cf = cf_handle!(self.db, column);
        let value = self.db.get_pinned_cf(&cf, key_bytes).with_context(|| {
            format!("Error while checking if key exists in column {:?}", column)
        })?;

        Ok(value.is_some())
    }

    pub fn load_optional_from_disk<K: AsRef<[u8]> + ?Sized, V: Serializer>(
        &self,
        column: Column,
        key: &K,
    ) -> Result<Option<V>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("load optional {:?} from disk", column);
        }

        if let Some(snapshot) = self.snapshot.as_ref() {
            if let Some(v) = snapshot.get(&column, key.as_ref()) {
                return Ok(Some(V::from_bytes(v)?));
            }
        }

        match Self::read_raw(&self.db, column, key.as_ref())? {
            Some(bytes) => Ok(Some(V::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_from_disk<K: AsRef<[u8]> + ?Sized, V: Serializer>(
        &self,
        column: Column,
        key: &K,
    ) -> Result<V, EngineError> {
        self.load_optional_from_disk(column, key)?
            .ok_or(EngineError::NotFoundOnDisk(DiskContext::LoadData))
    }

    /// Load a value that a conditional write depends on.
    ///
    /// When the key is not already written by our snapshot, the value found on
    /// disk is recorded in the read set and checked again at commit time.
    pub fn load_tracked<K: AsRef<[u8]> + ?Sized, V: Serializer>(
        &mut self,
        column: Column,
        key: &K,
    ) -> Result<Option<V>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("load tracked {:?} from disk", column);
        }

        let snapshot = self
            .snapshot
            .as_mut()
            .ok_or(EngineError::SnapshotNotStarted)?;

        if let Some(v) = snapshot.get(&column, key.as_ref()) {
            return Ok(Some(V::from_bytes(v)?));
        }

        let raw = Self::read_raw(&self.db, column, key.as_ref())?;
        snapshot.record_read(column, key.as_ref().to_vec(), raw.clone());

        match raw {
            Some(bytes) => Ok(Some(V::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_raw(db: &InnerDB, column: Column, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        let cf = cf_handle!(db, column);
        let value = db
            .get_pinned_cf(&cf, key)
            .with_context(|| format!("Internal error while reading column {:?}", column))?;

        Ok(value.map(|v| Bytes::copy_from_slice(&v)))
    }

    /// Entries of a column whose key starts with the prefix, in key order.
    /// Pending writes of our snapshot are merged over the disk content.
    pub fn scan_prefix<V: Serializer>(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Bytes, V)>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("scan prefix {} in {:?}", hex::encode(prefix), column);
        }

        let cf = cf_handle!(self.db, column);
        let mut opts = ReadOptions::default();
        opts.set_prefix_same_as_start(true);

        let mut entries = BTreeMap::new();
        let iterator =
            self.db
                .iterator_cf_opt(&cf, opts, IteratorMode::From(prefix, Direction::Forward));
        for res in iterator {
            let (key, value) = res.context("Internal read error in prefix scan")?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.insert(Bytes::from(key.into_vec()), Bytes::from(value.into_vec()));
        }

        if let Some(snapshot) = self.snapshot.as_ref() {
            snapshot.merge_prefix(&column, prefix, &mut entries);
        }

        entries
            .into_iter()
            .map(|(key, value)| Ok((key, V::from_bytes(&value)?)))
            .collect()
    }

    // Check that every tracked read still matches the committed value
    fn validate_reads(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        for ((column, key), expected) in snapshot.reads.iter() {
            let current = Self::read_raw(&self.db, *column, key)?;
            if current != *expected {
                if log::log_enabled!(log::Level::Debug) {
                    debug!(
                        "read of key {} in {:?} is stale, aborting commit",
                        hex::encode(key),
                        column
                    );
                }
                return Err(EngineError::CommitConflict(column.to_string()));
            }
        }

        Ok(())
    }

    // Validate the read set and write every change in one atomic batch
    pub(super) async fn commit_snapshot(&self, snapshot: Snapshot) -> Result<(), EngineError> {
        let _guard = self.commit_lock.lock().await;
        self.validate_reads(&snapshot)?;

        if !snapshot.has_changes() {
            trace!("nothing to commit");
            return Ok(());
        }

        let mut batch = rocksdb::WriteBatch::default();
        for (column, changes) in snapshot.trees {
            let cf = cf_handle!(self.db, column);
            for (key, value) in changes {
                batch.put_cf(&cf, &key, &value);
            }
        }

        if log::log_enabled!(log::Level::Trace) {
            trace!("writing batch of {} operations", batch.len());
        }

        self.db
            .write(batch)
            .context("Error while writing snapshot batch")?;

        Ok(())
    }
}

#[async_trait]
impl Storage for RocksStorage {
    fn new_session(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            commit_lock: Arc::clone(&self.commit_lock),
            snapshot: None,
        }
    }

    // Get the size of the DB on disk in bytes
    async fn get_size_on_disk(&self) -> Result<u64, EngineError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut size = 0;
            for column in Column::iter() {
                let cf = cf_handle!(db, column);
                let metadata = db.get_column_family_metadata_cf(&cf);
                size += metadata.size;
            }

            Ok::<_, EngineError>(size)
        })
        .await
        .context("Getting size on disk")?
    }

    async fn flush(&mut self) -> Result<(), EngineError> {
        trace!("flush DB");

        let db = Arc::clone(&self.db);
        // To prevent starving the current async worker,
        // We execute the following on a blocking thread
        // and simply await its result
        tokio::task::spawn_blocking(move || {
            for column in Column::iter() {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("compacting {:?}", column);
                }
                let cf = cf_handle!(db, column);
                db.compact_range_cf::<&[u8], &[u8]>(&cf, None, None);
            }

            debug!("wait for compact");
            let options = WaitForCompactOptions::default();
            db.wait_for_compact(&options)
                .context("Error while waiting on compact")?;

            info!("flushing DB");
            db.flush().context("Error while flushing DB")?;

            Ok::<_, EngineError>(())
        })
        .await
        .context("Flushing DB")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::SnapshotProvider;
    use tempdir::TempDir;

    fn test_storage(dir: &TempDir) -> RocksStorage {
        let config = RocksDBConfig {
            parallelism: 1,
            max_background_jobs: 1,
            max_subcompaction_jobs: 1,
            low_priority_background_threads: 1,
            max_open_files: 64,
            keep_max_log_files: 1,
            compression_mode: CompressionMode::None,
            cache_mode: CacheMode::None,
            cache_size: 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            write_buffer_shared: false,
        };
        RocksStorage::new(dir.path().to_str().unwrap(), &config).unwrap()
    }

    #[test]
    fn test_pair_key_ordering() {
        let a = RocksStorage::get_pair_key(1, u64::MAX);
        let b = RocksStorage::get_pair_key(2, 0);
        assert!(a < b);
        assert_eq!(&a[..8], &1u64.to_be_bytes());
        assert_eq!(RocksStorage::get_suffix_id(&a).unwrap(), u64::MAX);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_until_commit() {
        let dir = TempDir::new("rocks-snapshot").unwrap();
        let storage = test_storage(&dir);

        let mut session = storage.new_session();
        session.start_snapshot().await.unwrap();
        session
            .insert_into_disk(Column::Common, b"key", &7u64)
            .unwrap();

        // Not visible from another session before commit
        let other = storage.new_session();
        assert_eq!(
            other
                .load_optional_from_disk::<_, u64>(Column::Common, b"key")
                .unwrap(),
            None
        );

        session.end_snapshot(true).await.unwrap();
        assert_eq!(
            other
                .load_optional_from_disk::<_, u64>(Column::Common, b"key")
                .unwrap(),
            Some(7)
        );
    }

    #[tokio::test]
    async fn test_stale_tracked_read_conflicts() {
        let dir = TempDir::new("rocks-conflict").unwrap();
        let storage = test_storage(&dir);

        let mut first = storage.new_session();
        let mut second = storage.new_session();
        first.start_snapshot().await.unwrap();
        second.start_snapshot().await.unwrap();

        let seen: Option<u64> = first.load_tracked(Column::Common, b"counter").unwrap();
        assert_eq!(seen, None);
        let seen: Option<u64> = second.load_tracked(Column::Common, b"counter").unwrap();
        assert_eq!(seen, None);

        first
            .insert_into_disk(Column::Common, b"counter", &1u64)
            .unwrap();
        second
            .insert_into_disk(Column::Common, b"counter", &1u64)
            .unwrap();

        first.end_snapshot(true).await.unwrap();
        let result = second.end_snapshot(true).await;
        assert!(matches!(result, Err(EngineError::CommitConflict(_))));
    }

    #[tokio::test]
    async fn test_scan_prefix_merges_snapshot() {
        let dir = TempDir::new("rocks-prefix").unwrap();
        let mut storage = test_storage(&dir);

        storage
            .insert_into_disk(
                Column::DistributorChildren,
                RocksStorage::get_pair_key(1, 10),
                &(),
            )
            .unwrap();
        storage
            .insert_into_disk(
                Column::DistributorChildren,
                RocksStorage::get_pair_key(2, 20),
                &(),
            )
            .unwrap();

        storage.start_snapshot().await.unwrap();
        storage
            .insert_into_disk(
                Column::DistributorChildren,
                RocksStorage::get_pair_key(1, 11),
                &(),
            )
            .unwrap();

        let entries: Vec<(Bytes, ())> = storage
            .scan_prefix(Column::DistributorChildren, &1u64.to_be_bytes())
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(&entries[1].0[..], &RocksStorage::get_pair_key(1, 11)[..]);
        storage.end_snapshot(false).await.unwrap();
    }
}
