//! Partitioned persistence of stream rows.
//!
//! Rows are cut into partitions in the order they arrive: partition 0 takes
//! `first_part_size` rows, every following partition takes up to `part_size`
//! rows. Partition `n` is written as `{file_prefix}.txt.{n}.gz`. Loading reads
//! the partitions back in ascending id order.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;

use crate::{
    blob::{open_blob_store, BlobStore},
    codec::{encode_partition, PartitionReader},
    error::StreamError,
    location::Location,
    schema::StreamDef,
    stream::RowStream,
    value::Row,
    StreamResult,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOptions {
    pub first_part_size: Option<usize>,
    pub part_size: Option<usize>,
    /// Write every row into this single partition instead of cutting by size.
    pub part_id: Option<u32>,
}

impl PersistOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition sizes from `CDF_FIRST_PART_SIZE` and `CDF_PART_SIZE`.
    pub fn from_config() -> Self {
        Self {
            first_part_size: cdf_config::CONFIG.first_part_size,
            part_size: cdf_config::CONFIG.part_size,
            part_id: None,
        }
    }

    pub fn with_first_part_size(mut self, size: usize) -> Self {
        self.first_part_size = Some(size);
        self
    }

    pub fn with_part_size(mut self, size: usize) -> Self {
        self.part_size = Some(size);
        self
    }

    pub fn with_part_id(mut self, part_id: u32) -> Self {
        self.part_id = Some(part_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Load only this partition.
    pub part_id: Option<u32>,
    /// Cache directory for remote partitions. Defaults to `CDF_TMP_DIR`.
    pub tmp_dir: Option<PathBuf>,
    /// Download remote partitions even when a cached copy exists.
    pub force_fetch: bool,
    /// Only keep these fields, in schema order.
    pub fields: Option<Vec<String>>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part_id(mut self, part_id: u32) -> Self {
        self.part_id = Some(part_id);
        self
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(tmp_dir.into());
        self
    }

    pub fn with_force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// How many rows each partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionLayout {
    /// Everything in partition 0.
    Single,
    Sized {
        first_part_size: usize,
        part_size: usize,
    },
}

impl PartitionLayout {
    /// A missing size takes the value of the other one; with neither, all
    /// rows go to a single partition.
    pub fn from_sizes(first_part_size: Option<usize>, part_size: Option<usize>) -> StreamResult<Self> {
        let (first_part_size, part_size) = match (first_part_size, part_size) {
            (None, None) => return Ok(PartitionLayout::Single),
            (Some(first), None) => (first, first),
            (None, Some(part)) => (part, part),
            (Some(first), Some(part)) => (first, part),
        };
        for size in [first_part_size, part_size] {
            if size == 0 {
                return Err(StreamError::InvalidPartitionSize(size));
            }
        }
        Ok(PartitionLayout::Sized {
            first_part_size,
            part_size,
        })
    }

    /// Maximum number of rows in partition `part_id`, `None` when unbounded.
    pub fn capacity(&self, part_id: u32) -> Option<usize> {
        match self {
            PartitionLayout::Single => None,
            PartitionLayout::Sized {
                first_part_size, ..
            } if part_id == 0 => Some(*first_part_size),
            PartitionLayout::Sized { part_size, .. } => Some(*part_size),
        }
    }

    /// Partition holding the row at position `row_idx` of the sorted input.
    pub fn part_id_of(&self, row_idx: usize) -> u32 {
        match self {
            PartitionLayout::Single => 0,
            PartitionLayout::Sized {
                first_part_size,
                part_size,
            } => {
                if row_idx < *first_part_size {
                    0
                } else {
                    (1 + (row_idx - first_part_size) / part_size) as u32
                }
            }
        }
    }

    /// Number of partitions `rows` rows are cut into.
    pub fn partition_count(&self, rows: usize) -> usize {
        if rows == 0 {
            return 0;
        }
        self.part_id_of(rows - 1) as usize + 1
    }
}

/// Reads and writes the partitions of one stream definition.
#[derive(Debug, Clone)]
pub struct PartitionedStore {
    def: Arc<StreamDef>,
}

impl PartitionedStore {
    pub fn new(def: Arc<StreamDef>) -> Self {
        Self { def }
    }

    pub fn stream_def(&self) -> &Arc<StreamDef> {
        &self.def
    }

    /// Write `rows` to `destination`. Rows are expected in their final order;
    /// nothing is sorted here.
    ///
    /// Returns the written locations in ascending partition id order. An
    /// empty input writes nothing, unless a partition id is given, in which
    /// case an empty partition file is written.
    pub fn persist<I>(&self, rows: I, destination: &Location, options: &PersistOptions) -> StreamResult<Vec<String>>
    where
        I: IntoIterator<Item = Row>,
    {
        let store = open_blob_store(destination)?;
        self.persist_to(rows, store.as_ref(), options)
    }

    pub fn persist_to<I>(&self, rows: I, store: &dyn BlobStore, options: &PersistOptions) -> StreamResult<Vec<String>>
    where
        I: IntoIterator<Item = Row>,
    {
        if let Some(part_id) = options.part_id {
            let rows = rows
                .into_iter()
                .map(|row| self.def.check_arity(row.len()).map(|_| row))
                .collect::<StreamResult<Vec<_>>>()?;
            return Ok(vec![self.write_partition(store, part_id, &rows)?]);
        }

        let layout = PartitionLayout::from_sizes(options.first_part_size, options.part_size)?;
        let mut written = vec![];
        let mut part_id = 0u32;
        let mut buffer: Vec<Row> = vec![];
        let mut total = 0usize;

        for row in rows {
            self.def.check_arity(row.len())?;
            buffer.push(row);
            total += 1;
            if layout.capacity(part_id) == Some(buffer.len()) {
                written.push(self.write_partition(store, part_id, &buffer)?);
                buffer.clear();
                part_id += 1;
            }
        }
        if !buffer.is_empty() {
            written.push(self.write_partition(store, part_id, &buffer)?);
        }

        tracing::info!(
            "Persisted {} rows of {} into {} partitions at {}",
            total,
            self.def.file_prefix(),
            written.len(),
            store.address()
        );
        Ok(written)
    }

    fn write_partition(&self, store: &dyn BlobStore, part_id: u32, rows: &[Row]) -> StreamResult<String> {
        let name = self.def.partition_file_name(part_id);
        let bytes = encode_partition(rows)?;
        let location = store.put(&name, Bytes::from(bytes))?;
        tracing::debug!("Wrote {} rows to {}", rows.len(), location);
        Ok(location)
    }

    /// Lazily read the partitions stored at `source`.
    pub fn load(&self, source: &Location, options: &LoadOptions) -> StreamResult<RowStream> {
        let store = open_blob_store(source)?;
        self.load_from(store.as_ref(), options)
    }

    /// Lazily read the partitions of `store`. Remote partitions are first
    /// copied to the cache directory; a cached copy is reused unless
    /// `force_fetch` is set.
    pub fn load_from(&self, store: &dyn BlobStore, options: &LoadOptions) -> StreamResult<RowStream> {
        let projection = options
            .fields
            .as_deref()
            .map(|fields| self.def.natural_indices(fields))
            .transpose()?;
        let names = self.select_partitions(store, options.part_id)?;

        let files = match store.local_dir() {
            Some(dir) => names.iter().map(|name| dir.join(name)).collect(),
            None => {
                let tmp_dir = options
                    .tmp_dir
                    .clone()
                    .unwrap_or_else(|| cdf_config::TMP_DIR_PATH.clone());
                std::fs::create_dir_all(&tmp_dir)?;
                names
                    .iter()
                    .map(|name| fetch_cached(store, name, &tmp_dir, options.force_fetch))
                    .collect::<StreamResult<Vec<_>>>()?
            }
        };

        let layout = projection
            .clone()
            .unwrap_or_else(|| (0..self.def.len()).collect());
        let reader = PartitionReader::new(self.def.clone(), files, projection);
        Ok(RowStream::with_layout(self.def.clone(), layout, Box::new(reader)))
    }

    /// Partition file names of `store`, in ascending numeric id order.
    fn select_partitions(&self, store: &dyn BlobStore, part_id: Option<u32>) -> StreamResult<Vec<String>> {
        let mut partitions = BTreeMap::new();
        for name in store.list()? {
            if let Some(id) = self.def.parse_partition_file_name(&name)? {
                partitions.insert(id, name);
            }
        }

        match part_id {
            Some(part_id) => partitions
                .remove(&part_id)
                .map(|name| vec![name])
                .ok_or_else(|| StreamError::PartitionNotFound {
                    part_id,
                    location: store.address(),
                }),
            None => Ok(partitions.into_values().collect()),
        }
    }
}

fn fetch_cached(store: &dyn BlobStore, name: &str, tmp_dir: &Path, force_fetch: bool) -> StreamResult<PathBuf> {
    let cached = tmp_dir.join(name);
    if !force_fetch && cached.is_file() {
        tracing::debug!("Using cached partition {}", cached.display());
        return Ok(cached);
    }
    store.fetch(name, tmp_dir)
}
