//! Storage backends partition files are written to and read from.
//!
//! [`open_blob_store`] is the only place that looks at the kind of a
//! [`Location`]; everything above it talks to a [`BlobStore`].

use std::{
    collections::BTreeSet,
    fmt::Debug,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, path::Path as ObjectPath, ObjectStore, PutPayload};
use tempfile::NamedTempFile;

use crate::{
    error::StreamError,
    location::{Location, RemoteLocation},
    StreamResult,
};

/// Blocking object access scoped to one location.
pub trait BlobStore: Debug + Send + Sync {
    /// Names of the objects stored directly under this location.
    fn list(&self) -> StreamResult<BTreeSet<String>>;

    /// Copy object `name` into `destination_dir` and return the local path.
    fn fetch(&self, name: &str, destination_dir: &Path) -> StreamResult<PathBuf>;

    /// Store `bytes` as object `name`. Returns the address of the new object.
    fn put(&self, name: &str, bytes: Bytes) -> StreamResult<String>;

    /// Human readable address of this location, for errors and logs.
    fn address(&self) -> String;

    /// Directory holding the objects, when they can be read in place.
    fn local_dir(&self) -> Option<&Path> {
        None
    }
}

pub fn open_blob_store(location: &Location) -> StreamResult<Box<dyn BlobStore>> {
    match location {
        Location::Local(dir) => Ok(Box::new(LocalBlobStore::new(dir.clone()))),
        Location::Remote(remote) if remote.scheme == "s3" => {
            Ok(Box::new(ObjectBlobStore::s3(remote.clone())?))
        }
        Location::Remote(remote) => Err(StreamError::InvalidLocation {
            location: remote.to_string(),
            reason: format!("no object store for scheme {}", remote.scheme),
        }),
    }
}

/// Write `bytes` to `dir/name` through a temporary file in `dir`, so the
/// final name only ever points at complete content.
fn write_atomically(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(name);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(target)
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for LocalBlobStore {
    fn list(&self) -> StreamResult<BTreeSet<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn fetch(&self, name: &str, destination_dir: &Path) -> StreamResult<PathBuf> {
        let bytes = std::fs::read(self.root.join(name))?;
        Ok(write_atomically(destination_dir, name, &bytes)?)
    }

    fn put(&self, name: &str, bytes: Bytes) -> StreamResult<String> {
        let path = write_atomically(&self.root, name, &bytes)?;
        Ok(path.display().to_string())
    }

    fn address(&self) -> String {
        self.root.display().to_string()
    }

    fn local_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// [`BlobStore`] over any `object_store` backend.
///
/// Calls block on a runtime owned by the store, so they must not be made
/// from inside another async runtime.
#[derive(Debug)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    location: RemoteLocation,
    runtime: tokio::runtime::Runtime,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, location: RemoteLocation) -> StreamResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StreamError::Runtime)?;
        Ok(Self {
            store,
            location,
            runtime,
        })
    }

    /// S3 (or S3 compatible) store for `location`. Credentials come from the
    /// usual AWS environment variables.
    pub fn s3(location: RemoteLocation) -> StreamResult<Self> {
        let config = &cdf_config::CONFIG;
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&location.bucket)
            .with_allow_http(config.s3_allow_http);
        if let Some(endpoint) = &config.s3_endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(region) = &config.s3_region {
            builder = builder.with_region(region);
        }

        tracing::info!("Using S3 object store for bucket {}", location.bucket);
        Self::new(Arc::new(builder.build()?), location)
    }

    fn object_path(&self, name: &str) -> ObjectPath {
        ObjectPath::from(self.location.key(name))
    }
}

impl BlobStore for ObjectBlobStore {
    fn list(&self) -> StreamResult<BTreeSet<String>> {
        let prefix = self.location.prefix.as_deref().map(ObjectPath::from);
        let listing = self
            .runtime
            .block_on(self.store.list_with_delimiter(prefix.as_ref()))?;

        Ok(listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename())
            .map(str::to_string)
            .collect())
    }

    fn fetch(&self, name: &str, destination_dir: &Path) -> StreamResult<PathBuf> {
        let path = self.object_path(name);
        let bytes = self.runtime.block_on(async {
            let object = self.store.get(&path).await?;
            object.bytes().await
        })?;
        tracing::debug!(
            "Fetched {} ({} bytes) into {}",
            self.location.uri_of(name),
            bytes.len(),
            destination_dir.display()
        );
        Ok(write_atomically(destination_dir, name, &bytes)?)
    }

    fn put(&self, name: &str, bytes: Bytes) -> StreamResult<String> {
        let path = self.object_path(name);
        self.runtime
            .block_on(self.store.put(&path, PutPayload::from(bytes)))?;
        Ok(self.location.uri_of(name))
    }

    fn address(&self) -> String {
        self.location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;

    #[test]
    fn local_put_list_fetch() {
        let root = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(root.path().join("nested"));

        assert!(store.list().unwrap().is_empty());
        let written = store.put("a.txt.0.gz", Bytes::from_static(b"abc")).unwrap();
        assert!(written.ends_with("a.txt.0.gz"));
        assert_eq!(
            store.list().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["a.txt.0.gz".to_string()]
        );

        let fetched = store.fetch("a.txt.0.gz", cache.path()).unwrap();
        assert_eq!(std::fs::read(fetched).unwrap(), b"abc");
        assert!(store.fetch("missing", cache.path()).unwrap_err().is_storage());
    }

    #[test]
    fn object_store_scopes_keys_under_prefix() {
        let memory: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let store = ObjectBlobStore::new(
            memory.clone(),
            RemoteLocation::new("s3", "bucket", Some("crawl/1")),
        )
        .unwrap();
        let other = ObjectBlobStore::new(
            memory,
            RemoteLocation::new("s3", "bucket", Some("crawl/2")),
        )
        .unwrap();

        let uri = store.put("x.txt.0.gz", Bytes::from_static(b"123")).unwrap();
        assert_eq!(uri, "s3://bucket/crawl/1/x.txt.0.gz");
        other.put("x.txt.9.gz", Bytes::from_static(b"9")).unwrap();

        assert_eq!(
            store.list().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["x.txt.0.gz".to_string()]
        );

        let cache = tempfile::tempdir().unwrap();
        let fetched = store.fetch("x.txt.0.gz", cache.path()).unwrap();
        assert_eq!(fetched, cache.path().join("x.txt.0.gz"));
        assert_eq!(std::fs::read(fetched).unwrap(), b"123");
    }

    #[test]
    fn missing_object_is_a_storage_error() {
        let store = ObjectBlobStore::new(
            Arc::new(InMemory::new()),
            RemoteLocation::new("s3", "bucket", None),
        )
        .unwrap();
        let cache = tempfile::tempdir().unwrap();
        let err = store.fetch("nope", cache.path()).unwrap_err();
        assert!(matches!(err, StreamError::ObjectStore(_)));
    }

    #[test]
    fn unsupported_remote_scheme() {
        let location = Location::Remote(RemoteLocation::new("gs", "bucket", None));
        assert!(matches!(
            open_blob_store(&location),
            Err(StreamError::InvalidLocation { .. })
        ));
    }
}
