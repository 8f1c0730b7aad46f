use std::{fmt, sync::Arc};

use crate::{
    error::StreamError,
    schema::StreamDef,
    value::{Row, Value},
    StreamResult,
};

type RowSource = Box<dyn Iterator<Item = StreamResult<Row>> + Send>;
type Predicate = Box<dyn Fn(&[&Value]) -> bool + Send>;

struct Filter {
    /// Positions inside the stream's rows, in the order the predicate expects.
    positions: Vec<usize>,
    predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Draining,
    Done,
}

/// Lazy, single-pass sequence of rows of one stream definition.
///
/// Filters are registered first, then the stream is drained. Once the first
/// row has been pulled, `add_filter` fails. The first error ends the stream.
pub struct RowStream {
    def: Arc<StreamDef>,
    /// Schema position of each value in the rows this stream yields.
    layout: Vec<usize>,
    source: RowSource,
    filters: Vec<Filter>,
    phase: Phase,
}

impl RowStream {
    /// Stream over rows that already match `layout`.
    pub(crate) fn with_layout(def: Arc<StreamDef>, layout: Vec<usize>, source: RowSource) -> Self {
        Self {
            def,
            layout,
            source,
            filters: vec![],
            phase: Phase::Building,
        }
    }

    /// Stream over full rows of `def`. Rows of another length end the stream
    /// with `RowShape`.
    pub fn new<I>(def: Arc<StreamDef>, rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
    {
        let layout = (0..def.len()).collect();
        let source = checked_rows(&def, rows);
        Self::with_layout(def, layout, Box::new(source))
    }

    /// Stream over full rows of `def`, projected to `fields` (schema order)
    /// as they are pulled.
    pub fn from_rows<I, S>(def: Arc<StreamDef>, rows: I, fields: Option<&[S]>) -> StreamResult<Self>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
        S: AsRef<str>,
    {
        let Some(fields) = fields else {
            return Ok(Self::new(def, rows));
        };

        let layout = def.natural_indices(fields)?;
        let projection = layout.clone();
        let source = checked_rows(&def, rows)
            .map(move |row| row.map(|row| projection.iter().map(|&idx| row[idx].clone()).collect::<Row>()));
        Ok(Self::with_layout(def, layout, Box::new(source)))
    }

    pub fn stream_def(&self) -> &Arc<StreamDef> {
        &self.def
    }

    /// Names of the values carried by each row, in row order.
    pub fn columns(&self) -> Vec<&str> {
        self.layout
            .iter()
            .map(|&idx| self.def.fields()[idx].name.as_str())
            .collect()
    }

    /// Keep only rows for which `predicate` holds over the values of `fields`,
    /// passed in the order given.
    pub fn add_filter<S, F>(&mut self, fields: &[S], predicate: F) -> StreamResult<&mut Self>
    where
        S: AsRef<str>,
        F: Fn(&[&Value]) -> bool + Send + 'static,
    {
        if self.phase != Phase::Building {
            return Err(StreamError::InvalidState(
                "filters cannot be added once the stream is being consumed".to_string(),
            ));
        }

        let positions = fields
            .iter()
            .map(|name| {
                let schema_idx = self.def.field_index(name.as_ref())?;
                self.layout
                    .iter()
                    .position(|&idx| idx == schema_idx)
                    .ok_or_else(|| StreamError::SchemaField {
                        field: name.as_ref().to_string(),
                        file_prefix: self.def.file_prefix().to_string(),
                    })
            })
            .collect::<StreamResult<Vec<_>>>()?;

        self.filters.push(Filter {
            positions,
            predicate: Box::new(predicate),
        });
        Ok(self)
    }

    fn accepts(&self, row: &[Value]) -> bool {
        let mut args = Vec::new();
        self.filters.iter().all(|filter| {
            args.clear();
            args.extend(filter.positions.iter().map(|&pos| &row[pos]));
            (filter.predicate)(&args)
        })
    }
}

fn checked_rows<I>(def: &StreamDef, rows: I) -> impl Iterator<Item = StreamResult<Row>> + Send + 'static
where
    I: IntoIterator<Item = Row>,
    I::IntoIter: Send + 'static,
{
    let expected = def.len();
    let file_prefix = def.file_prefix().to_string();
    rows.into_iter().map(move |row| {
        if row.len() != expected {
            return Err(StreamError::RowShape {
                expected,
                actual: row.len(),
                file_prefix: file_prefix.clone(),
            });
        }
        Ok(row)
    })
}

impl Iterator for RowStream {
    type Item = StreamResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Done {
            return None;
        }
        self.phase = Phase::Draining;

        loop {
            match self.source.next() {
                Some(Ok(row)) => {
                    if self.accepts(&row) {
                        return Some(Ok(row));
                    }
                }
                Some(Err(e)) => {
                    self.phase = Phase::Done;
                    return Some(Err(e));
                }
                None => {
                    self.phase = Phase::Done;
                    return None;
                }
            }
        }
    }
}

impl fmt::Debug for RowStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("file_prefix", &self.def.file_prefix())
            .field("columns", &self.columns())
            .field("filters", &self.filters.len())
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{row, value::ColumnKind};

    fn custom() -> Arc<StreamDef> {
        Arc::new(
            StreamDef::new("test", [("id", ColumnKind::Int), ("url", ColumnKind::Str)]).unwrap(),
        )
    }

    fn data() -> Vec<Row> {
        vec![
            row![1, "http://www.site.com/"],
            row![2, "http://www.site.com/2"],
            row![3, "http://www.bad.com/3"],
        ]
    }

    fn url_contains(needle: &'static str) -> impl Fn(&[&Value]) -> bool + Send + 'static {
        move |values: &[&Value]| values[0].as_str().is_some_and(|url| url.contains(needle))
    }

    #[test]
    fn basics() {
        let stream = RowStream::new(custom(), data());
        let result: Vec<Row> = stream.collect::<StreamResult<_>>().unwrap();
        assert_eq!(result, data());
    }

    #[test]
    fn simple_filters() {
        let mut stream = RowStream::new(custom(), data());
        stream
            .add_filter(&["url"], url_contains("site.com"))
            .unwrap()
            .add_filter(&["url"], url_contains("/2"))
            .unwrap();
        let result: Vec<Row> = stream.collect::<StreamResult<_>>().unwrap();
        assert_eq!(result, vec![data()[1].clone()]);
    }

    #[test]
    fn filter_order_does_not_change_result() {
        let mut forward = RowStream::new(custom(), data());
        forward
            .add_filter(&["url"], url_contains("site.com"))
            .unwrap()
            .add_filter(&["id"], |v| v[0].as_i64().is_some_and(|id| id > 1))
            .unwrap();
        let mut backward = RowStream::new(custom(), data());
        backward
            .add_filter(&["id"], |v| v[0].as_i64().is_some_and(|id| id > 1))
            .unwrap()
            .add_filter(&["url"], url_contains("site.com"))
            .unwrap();

        let forward: Vec<Row> = forward.collect::<StreamResult<_>>().unwrap();
        let backward: Vec<Row> = backward.collect::<StreamResult<_>>().unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec![data()[1].clone()]);
    }

    #[test]
    fn multi_field_filters() {
        let mut stream = RowStream::new(custom(), data());
        stream
            .add_filter(&["id", "url"], |v| {
                v[0].as_i64().is_some_and(|id| id > 1)
                    && v[1].as_str().is_some_and(|url| url.contains("/2"))
            })
            .unwrap();
        let result: Vec<Row> = stream.collect::<StreamResult<_>>().unwrap();
        assert_eq!(result, vec![data()[1].clone()]);
    }

    #[test]
    fn filter_arguments_follow_requested_order() {
        let mut stream = RowStream::new(custom(), data());
        stream
            .add_filter(&["url", "id"], |v| {
                v[0].as_str().is_some_and(|url| url.ends_with('3')) && v[1] == &Value::Int(3)
            })
            .unwrap();
        let result: Vec<Row> = stream.collect::<StreamResult<_>>().unwrap();
        assert_eq!(result, vec![data()[2].clone()]);
    }

    #[test]
    fn unknown_filter_field() {
        let mut stream = RowStream::new(custom(), data());
        assert!(matches!(
            stream.add_filter(&["nope"], |_| true),
            Err(StreamError::SchemaField { .. })
        ));
    }

    #[test]
    fn add_filter_after_drain_started_fails() {
        let mut stream = RowStream::new(custom(), data());
        assert!(stream.next().is_some());
        assert!(matches!(
            stream.add_filter(&["id"], |_| true),
            Err(StreamError::InvalidState(_))
        ));
    }

    #[test]
    fn iterator() {
        let mut stream = custom().load_iterator::<_, &str>(data(), None).unwrap();
        assert_eq!(stream.next().unwrap().unwrap(), row![1, "http://www.site.com/"]);
        assert_eq!(stream.next().unwrap().unwrap(), row![2, "http://www.site.com/2"]);
        assert_eq!(stream.next().unwrap().unwrap(), row![3, "http://www.bad.com/3"]);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn iterator_with_fields_to_use() {
        let mut stream = custom().load_iterator(data(), Some(&["id"][..])).unwrap();
        assert_eq!(stream.columns(), vec!["id"]);
        assert_eq!(stream.next().unwrap().unwrap(), row![1]);
        assert_eq!(stream.next().unwrap().unwrap(), row![2]);
    }

    #[test]
    fn projected_stream_filters_on_projected_fields() {
        let mut stream = custom().load_iterator(data(), Some(&["url"][..])).unwrap();
        assert!(matches!(
            stream.add_filter(&["id"], |_| true),
            Err(StreamError::SchemaField { .. })
        ));
        stream.add_filter(&["url"], url_contains("bad")).unwrap();
        let result: Vec<Row> = stream.collect::<StreamResult<_>>().unwrap();
        assert_eq!(result, vec![row!["http://www.bad.com/3"]]);
    }

    #[test]
    fn short_row_with_filter_fails_with_row_shape() {
        let mut stream = custom().load_iterator::<_, &str>(vec![row![1], row![2, "b"]], None).unwrap();
        stream.add_filter(&["url"], |_| true).unwrap();
        assert!(matches!(
            stream.next(),
            Some(Err(StreamError::RowShape { expected: 2, actual: 1, .. }))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn error_ends_the_stream() {
        let source: RowSource = Box::new(
            vec![
                Ok(row![1, "a"]),
                Err(StreamError::InvalidState("boom".to_string())),
                Ok(row![2, "b"]),
            ]
            .into_iter(),
        );
        let mut stream = RowStream::with_layout(custom(), vec![0, 1], source);
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }
}
