use std::sync::Arc;

use crate::{
    blob::{open_blob_store, BlobStore},
    error::StreamError,
    location::Location,
    schema::StreamDef,
    store::{PartitionedStore, PersistOptions},
    value::Row,
    StreamResult,
};

/// Staging buffer for rows produced out of order.
///
/// Rows are sorted on the numeric value of their first field when the
/// dataset is persisted. A dataset can be persisted once; afterwards every
/// call fails with [`StreamError::InvalidState`].
#[derive(Debug)]
pub struct TemporaryDataset {
    def: Arc<StreamDef>,
    rows: Vec<Row>,
    persisted: bool,
}

impl TemporaryDataset {
    pub fn new(def: Arc<StreamDef>) -> Self {
        Self {
            def,
            rows: vec![],
            persisted: false,
        }
    }

    pub fn stream_def(&self) -> &Arc<StreamDef> {
        &self.def
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, values: Row) -> StreamResult<()> {
        self.ensure_not_persisted()?;
        self.def.check_arity(values.len())?;
        self.rows.push(values);
        Ok(())
    }

    pub fn persist(&mut self, destination: &Location, options: &PersistOptions) -> StreamResult<Vec<String>> {
        self.ensure_not_persisted()?;
        let store = open_blob_store(destination)?;
        self.persist_to(store.as_ref(), options)
    }

    /// Sort the buffered rows and write them to `store`. The dataset is spent
    /// afterwards, whether the write succeeded or not.
    pub fn persist_to(&mut self, store: &dyn BlobStore, options: &PersistOptions) -> StreamResult<Vec<String>> {
        self.ensure_not_persisted()?;
        self.persisted = true;

        let rows = sort_by_first_field(&self.def, std::mem::take(&mut self.rows))?;
        PartitionedStore::new(self.def.clone()).persist_to(rows, store, options)
    }

    fn ensure_not_persisted(&self) -> StreamResult<()> {
        if self.persisted {
            return Err(StreamError::InvalidState(format!(
                "temporary dataset of {} was already persisted",
                self.def.file_prefix()
            )));
        }
        Ok(())
    }
}

/// Stable sort on the numeric value of the first field.
fn sort_by_first_field(def: &StreamDef, rows: Vec<Row>) -> StreamResult<Vec<Row>> {
    let field = def.fields().first().map(|f| f.name.as_str()).unwrap_or_default();
    let mut keyed = rows
        .into_iter()
        .map(|row| {
            let key = row.first().and_then(|value| value.as_i64());
            match key {
                Some(key) => Ok((key, row)),
                None => Err(StreamError::Decode {
                    field: field.to_string(),
                    value: row.first().map(|v| v.to_string()).unwrap_or_default(),
                    reason: "sort key is not a number".to_string(),
                }),
            }
        })
        .collect::<StreamResult<Vec<_>>>()?;

    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}
