//! Partitioned dataset storage of the crawl pipeline.
//!
//! A [`StreamDef`] describes the typed columns of one dataset kind. Rows are
//! staged in a [`TemporaryDataset`], sorted, and cut into gzip compressed,
//! tab separated partition files by the [`PartitionedStore`], either in a
//! local directory or in object storage. Loading gives back a lazy,
//! filterable [`RowStream`].
//!
//! Partition file layout
//!
//! {location}/
//!     ├── {file_prefix}.txt.0.gz   (first_part_size rows)
//!     ├── {file_prefix}.txt.1.gz   (part_size rows)
//!     ├── ...
//!     └── {file_prefix}.txt.N.gz   (remaining rows)

pub mod blob;
pub mod codec;
pub mod dataset;
pub mod error;
pub mod follow;
pub mod location;
pub mod registry;
pub mod schema;
pub mod store;
pub mod stream;
pub mod value;

pub use blob::{open_blob_store, BlobStore, LocalBlobStore, ObjectBlobStore};
pub use dataset::TemporaryDataset;
pub use error::StreamError;
pub use follow::{follow_mask, FollowFlags};
pub use location::{Location, RemoteLocation};
pub use schema::{FieldDef, StreamDef};
pub use store::{LoadOptions, PartitionLayout, PartitionedStore, PersistOptions};
pub use stream::RowStream;
pub use value::{ColumnKind, Row, Value};

pub type StreamResult<T> = std::result::Result<T, error::StreamError>;
