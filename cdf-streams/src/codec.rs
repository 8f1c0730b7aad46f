//! Line codec of partition files: one row per line, values separated by a tab,
//! the whole file gzip compressed.
//!
//! Values are written verbatim. A string value containing a tab or a newline
//! does not survive a round trip.

use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader, Split, Write},
    path::PathBuf,
    sync::Arc,
};

use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};

use crate::{
    error::StreamError,
    schema::StreamDef,
    value::{Row, Value},
    StreamResult,
};

pub const DELIMITER: char = '\t';

pub fn encode_line(row: &[Value]) -> String {
    let mut line = String::new();
    for (idx, value) in row.iter().enumerate() {
        if idx > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&value.to_string());
    }
    line
}

/// Decode one line of a partition file. The line must hold every column of
/// `def`; with a projection, only the listed schema positions are decoded.
pub fn decode_line(line: &str, def: &StreamDef, projection: Option<&[usize]>) -> StreamResult<Row> {
    let cells: Vec<&str> = line.split(DELIMITER).collect();
    match projection {
        Some(projection) => {
            def.check_arity(cells.len())?;
            projection
                .iter()
                .map(|&idx| def.decode_field(idx, cells[idx]))
                .collect()
        }
        None => def.decode_row(&cells),
    }
}

/// Gzip the encoded lines of a whole partition.
pub fn encode_partition<'a, I>(rows: I) -> StreamResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for row in rows {
        encoder.write_all(encode_line(row).as_bytes())?;
        encoder.write_all(b"\n")?;
    }
    Ok(encoder.finish()?)
}

type GzLines = Split<BufReader<MultiGzDecoder<File>>>;

/// Text of one raw line, without its line terminator.
fn line_text(mut bytes: Vec<u8>) -> StreamResult<String> {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| StreamError::Decode {
        field: "line".to_string(),
        value: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        reason: e.utf8_error().to_string(),
    })
}

/// Lazily decodes a sequence of partition files, one after the other.
///
/// A file is only opened once the previous one is exhausted.
pub struct PartitionReader {
    def: Arc<StreamDef>,
    projection: Option<Vec<usize>>,
    pending: VecDeque<PathBuf>,
    current: Option<GzLines>,
}

impl PartitionReader {
    pub fn new(def: Arc<StreamDef>, files: Vec<PathBuf>, projection: Option<Vec<usize>>) -> Self {
        Self {
            def,
            projection,
            pending: files.into(),
            current: None,
        }
    }

    fn abort(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}

impl Iterator for PartitionReader {
    type Item = StreamResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lines) = self.current.as_mut() {
                match lines.next() {
                    Some(Ok(bytes)) => {
                        let row = line_text(bytes).and_then(|line| {
                            decode_line(&line, &self.def, self.projection.as_deref())
                        });
                        if row.is_err() {
                            self.abort();
                        }
                        return Some(row);
                    }
                    Some(Err(e)) => {
                        self.abort();
                        return Some(Err(e.into()));
                    }
                    None => self.current = None,
                }
            }

            let path = self.pending.pop_front()?;
            tracing::debug!("Reading partition file {}", path.display());
            match File::open(&path) {
                Ok(file) => self.current = Some(BufReader::new(MultiGzDecoder::new(file)).split(b'\n')),
                Err(e) => {
                    self.abort();
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
