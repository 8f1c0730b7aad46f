//! Key-value engine used by the crawl pipeline to build lookup tables.
//!
//! [`RocksKvStore`] keeps its data in a RocksDB directory. Keys iterate in
//! byte order.

use std::fmt;
use std::path::{Path, PathBuf};

use rocksdb::{IteratorMode, Options, WriteBatch, DB};

pub type KvResult<T> = std::result::Result<T, KvError>;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key not found: {0:?}")]
    NotFound(Vec<u8>),
    #[error("Store {0} is not open")]
    Closed(String),
    #[error("Batch size must be positive")]
    InvalidBatchSize,
    #[error("RocksDB error: {0}")]
    Engine(#[from] rocksdb::Error),
}

pub trait KvStore {
    fn open(&mut self) -> KvResult<()>;

    fn close(&mut self) -> KvResult<()>;

    /// Close the store and delete its content.
    fn destroy(&mut self) -> KvResult<()>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    fn get(&self, key: &[u8]) -> KvResult<Vec<u8>>;

    /// Write `pairs`, committing every `batch_size` pairs.
    fn batch_write<I>(&mut self, pairs: I, batch_size: usize) -> KvResult<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>;

    /// Batch write with `CDF_KV_BATCH_SIZE`.
    fn batch_write_default<I>(&mut self, pairs: I) -> KvResult<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        self.batch_write(pairs, cdf_config::CONFIG.kv_batch_size)
    }

    /// All pairs in key order.
    fn iter(&self) -> KvResult<Box<dyn Iterator<Item = KvResult<(Vec<u8>, Vec<u8>)>> + '_>>;
}

/// A [`KvStore`] backed by a RocksDB directory.
pub struct RocksKvStore {
    path: PathBuf,
    db: Option<DB>,
}

impl fmt::Debug for RocksKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksKvStore")
            .field("path", &self.path)
            .field("open", &self.db.is_some())
            .finish()
    }
}

impl RocksKvStore {
    /// Bind a store to `path`. Nothing is created until [`KvStore::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            db: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn db(&self) -> KvResult<&DB> {
        self.db
            .as_ref()
            .ok_or_else(|| KvError::Closed(self.path.display().to_string()))
    }
}

impl KvStore for RocksKvStore {
    fn open(&mut self) -> KvResult<()> {
        if self.db.is_none() {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            self.db = Some(DB::open(&opts, &self.path)?);
            tracing::debug!("Opened key-value store at {}", self.path.display());
        }
        Ok(())
    }

    fn close(&mut self) -> KvResult<()> {
        self.db()?;
        self.db = None;
        Ok(())
    }

    fn destroy(&mut self) -> KvResult<()> {
        self.db = None;
        DB::destroy(&Options::default(), &self.path)?;
        Ok(())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.db()?.put(key, value)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        self.db()?
            .get(key)?
            .ok_or_else(|| KvError::NotFound(key.to_vec()))
    }

    fn batch_write<I>(&mut self, pairs: I, batch_size: usize) -> KvResult<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        if batch_size == 0 {
            return Err(KvError::InvalidBatchSize);
        }
        let db = self.db()?;

        let mut batch = WriteBatch::default();
        let mut count = 0usize;
        for (key, value) in pairs {
            batch.put(key, value);
            count += 1;
            if batch.len() == batch_size {
                db.write(std::mem::take(&mut batch))?;
                tracing::debug!("Put {} records in store {}", count, self.path.display());
            }
        }
        if !batch.is_empty() {
            db.write(batch)?;
        }
        Ok(())
    }

    fn iter(&self) -> KvResult<Box<dyn Iterator<Item = KvResult<(Vec<u8>, Vec<u8>)>> + '_>> {
        Ok(Box::new(self.db()?.iterator(IteratorMode::Start).map(
            |item| {
                item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                    .map_err(KvError::from)
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_temp_store() -> (RocksKvStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut store = RocksKvStore::new(dir.path().join("kv"));
        store.open().unwrap();
        (store, dir)
    }

    fn keys(store: &RocksKvStore) -> Vec<Vec<u8>> {
        store
            .iter()
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect()
    }

    #[test]
    fn put_and_get() {
        let (mut store, _dir) = open_temp_store();
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
        assert!(matches!(store.get(b"b"), Err(KvError::NotFound(_))));
    }

    #[test]
    fn batch_write_then_ordered_iteration() {
        let (mut store, _dir) = open_temp_store();
        let pairs = (0..25u32)
            .rev()
            .map(|i| (format!("{i:03}").into_bytes(), i.to_string().into_bytes()));
        store.batch_write(pairs, 10).unwrap();

        let keys = keys(&store);
        assert_eq!(keys.len(), 25);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.get(b"007").unwrap(), b"7");
    }

    #[test]
    fn batch_write_with_configured_size() {
        let (mut store, _dir) = open_temp_store();
        let pairs = (0..3u8).map(|i| (vec![i], vec![i * 2]));
        store.batch_write_default(pairs).unwrap();
        assert_eq!(keys(&store), vec![vec![0], vec![1], vec![2]]);
        assert_eq!(store.get(&[2]).unwrap(), vec![4]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let (mut store, _dir) = open_temp_store();
        assert!(matches!(
            store.batch_write(vec![], 0),
            Err(KvError::InvalidBatchSize)
        ));
    }

    #[test]
    fn data_survives_reopen() {
        let (mut store, _dir) = open_temp_store();
        store.put(b"a", b"1").unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.get(b"a"), Err(KvError::Closed(_))));
        assert!(matches!(store.put(b"a", b"2"), Err(KvError::Closed(_))));
        assert!(store.close().is_err());

        store.open().unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
    }

    #[test]
    fn destroy_removes_content() {
        let (mut store, _dir) = open_temp_store();
        store.put(b"a", b"1").unwrap();
        store.destroy().unwrap();
        assert!(store.iter().is_err());

        store.open().unwrap();
        assert!(matches!(store.get(b"a"), Err(KvError::NotFound(_))));
    }
}
