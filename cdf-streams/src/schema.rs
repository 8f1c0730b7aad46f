use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;

use crate::{
    dataset::TemporaryDataset,
    error::StreamError,
    stream::RowStream,
    value::{ColumnKind, Row, Value},
    StreamResult,
};

/// One column of a stream definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: ColumnKind,
}

/// Typed column catalog of one dataset kind, plus the prefix its partition
/// files are named with.
///
/// Partition `n` of a dataset lives in `{file_prefix}.txt.{n}.gz`.
#[derive(Debug, Clone)]
pub struct StreamDef {
    file_prefix: String,
    fields: Vec<FieldDef>,
    positions: HashMap<String, usize>,
}

impl StreamDef {
    pub fn new<I, S>(file_prefix: impl Into<String>, fields: I) -> StreamResult<Self>
    where
        I: IntoIterator<Item = (S, ColumnKind)>,
        S: Into<String>,
    {
        let file_prefix = file_prefix.into();
        let fields: Vec<FieldDef> = fields
            .into_iter()
            .map(|(name, kind)| FieldDef {
                name: name.into(),
                kind,
            })
            .collect();

        let mut positions = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if positions.insert(field.name.clone(), idx).is_some() {
                return Err(StreamError::DuplicateField {
                    field: field.name.clone(),
                    file_prefix,
                });
            }
        }

        Ok(Self {
            file_prefix,
            fields,
            positions,
        })
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_index(&self, name: &str) -> StreamResult<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| StreamError::SchemaField {
                field: name.to_string(),
                file_prefix: self.file_prefix.clone(),
            })
    }

    /// Positions of `names`, in the order they were asked for.
    pub fn field_indices<S: AsRef<str>>(&self, names: &[S]) -> StreamResult<Vec<usize>> {
        names
            .iter()
            .map(|name| self.field_index(name.as_ref()))
            .collect()
    }

    /// Positions of `names` in schema order, without duplicates.
    pub fn natural_indices<S: AsRef<str>>(&self, names: &[S]) -> StreamResult<Vec<usize>> {
        let mut indices = self.field_indices(names)?;
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    pub fn check_arity(&self, actual: usize) -> StreamResult<()> {
        if actual != self.fields.len() {
            return Err(StreamError::RowShape {
                expected: self.fields.len(),
                actual,
                file_prefix: self.file_prefix.clone(),
            });
        }
        Ok(())
    }

    /// Decode the cell at schema position `idx`.
    pub fn decode_field(&self, idx: usize, raw: &str) -> StreamResult<Value> {
        let field = &self.fields[idx];
        field.kind.decode(raw).map_err(|reason| StreamError::Decode {
            field: field.name.clone(),
            value: raw.to_string(),
            reason,
        })
    }

    pub fn decode_row<S: AsRef<str>>(&self, raw: &[S]) -> StreamResult<Row> {
        self.check_arity(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(idx, cell)| self.decode_field(idx, cell.as_ref()))
            .collect()
    }

    /// Restrict a full row to `names`, keeping schema order.
    pub fn project<S: AsRef<str>>(&self, row: &[Value], names: &[S]) -> StreamResult<Row> {
        self.check_arity(row.len())?;
        Ok(self
            .natural_indices(names)?
            .into_iter()
            .map(|idx| row[idx].clone())
            .collect())
    }

    pub fn to_mapping<'a>(&'a self, row: &'a [Value]) -> StreamResult<IndexMap<&'a str, &'a Value>> {
        self.check_arity(row.len())?;
        Ok(self.field_names().zip(row.iter()).collect())
    }

    pub fn partition_file_name(&self, part_id: u32) -> String {
        format!("{}.txt.{}.gz", self.file_prefix, part_id)
    }

    /// Partition id encoded in `name`, if `name` is a partition file of this
    /// definition. A partition name whose id is not written in canonical
    /// form, or does not fit a `u32`, is an error.
    pub fn parse_partition_file_name(&self, name: &str) -> StreamResult<Option<u32>> {
        let Some(id) = name
            .strip_prefix(self.file_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(".txt."))
            .and_then(|rest| rest.strip_suffix(".gz"))
        else {
            return Ok(None);
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        let invalid = |reason: String| StreamError::InvalidPartitionName {
            name: name.to_string(),
            reason,
        };
        if id.len() > 1 && id.starts_with('0') {
            return Err(invalid("partition id has leading zeros".to_string()));
        }
        id.parse()
            .map(Some)
            .map_err(|e| invalid(format!("partition id {id}: {e}")))
    }

    /// Wrap already decoded rows into a stream. With `fields`, every row is
    /// projected on the way in.
    pub fn load_iterator<I, S>(self: &Arc<Self>, rows: I, fields: Option<&[S]>) -> StreamResult<RowStream>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
        S: AsRef<str>,
    {
        RowStream::from_rows(self.clone(), rows, fields)
    }

    pub fn create_temporary_dataset(self: &Arc<Self>) -> TemporaryDataset {
        TemporaryDataset::new(self.clone())
    }
}
