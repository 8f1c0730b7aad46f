#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Unknown field {field} in stream definition {file_prefix}")]
    SchemaField { field: String, file_prefix: String },
    #[error("Field {field} is declared twice in stream definition {file_prefix}")]
    DuplicateField { field: String, file_prefix: String },
    #[error("Unknown stream definition: {0}")]
    UnknownStream(String),
    #[error("Row has {actual} values, stream definition {file_prefix} expects {expected}")]
    RowShape {
        expected: usize,
        actual: usize,
        file_prefix: String,
    },
    #[error("Failed to decode field {field} from {value:?}: {reason}")]
    Decode {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Partition {part_id} not found in {location}")]
    PartitionNotFound { part_id: u32, location: String },
    #[error("Invalid partition file name {name}: {reason}")]
    InvalidPartitionName { name: String, reason: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Partition sizes must be positive, got {0}")]
    InvalidPartitionSize(usize),
    #[error("Invalid location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Failed to build blocking runtime: {0}")]
    Runtime(std::io::Error),
}

impl StreamError {
    /// True for failures raised by the local filesystem or the object store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ObjectStore(_))
    }
}
