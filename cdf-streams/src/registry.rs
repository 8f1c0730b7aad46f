//! Static catalog of the crawl datasets.
//!
//! Built once on first access and read-only afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::{error::StreamError, schema::StreamDef, value::ColumnKind, StreamResult};

use ColumnKind::{FollowMask, Int, Str};

/// Dataset name -> file prefix.
const STREAMS_FILES: [(&str, &str); 6] = [
    ("urlids", "patterns"),
    ("urlinfos", "infos"),
    ("urlcontents", "contents"),
    ("urllinks", "outlinks"),
    ("urlinlinks", "inlinks"),
    ("url_properties", "properties"),
];

/// File prefix -> ordered columns.
const STREAMS_HEADERS: [(&str, &[(&str, ColumnKind)]); 6] = [
    (
        "patterns",
        &[
            ("id", Int),
            ("protocol", Str),
            ("host", Str),
            ("path", Str),
            ("query_string", Str),
        ],
    ),
    (
        "infos",
        &[
            ("id", Int),
            ("infos_mask", Int),
            ("content_type", Str),
            ("depth", Int),
            ("date_crawled", Int),
            ("http_code", Int),
            ("byte_size", Int),
            ("delay1", Int),
            ("delay2", Int),
        ],
    ),
    (
        "contents",
        &[
            ("id", Int),
            ("content_type", Int),
            ("hash", Str),
            ("txt", Str),
        ],
    ),
    (
        "outlinks",
        &[
            ("id", Int),
            ("link_type", Str),
            ("follow", FollowMask),
            ("dst_url_id", Int),
            ("external_url", Str),
        ],
    ),
    (
        "inlinks",
        &[
            ("id", Int),
            ("link_type", Str),
            ("follow", FollowMask),
            ("src_url_id", Int),
        ],
    ),
    ("properties", &[("id", Int), ("resource_type", Str)]),
];

const CONTENT_TYPE_INDEX: [(u32, &str); 4] = [(1, "title"), (2, "h1"), (3, "h2"), (4, "description")];

pub const MANDATORY_CONTENT_TYPES: [&str; 3] = ["title", "h1", "description"];

lazy_static! {
    static ref STREAM_DEFS: IndexMap<&'static str, Arc<StreamDef>> = STREAMS_HEADERS
        .iter()
        .map(|(prefix, columns)| {
            let def = StreamDef::new(*prefix, columns.iter().copied())
                .unwrap_or_else(|e| panic!("invalid static catalog entry {prefix}: {e}"));
            (*prefix, Arc::new(def))
        })
        .collect();
}

/// Stream definition of a dataset, e.g. `urllinks`.
pub fn stream_def(dataset: &str) -> StreamResult<Arc<StreamDef>> {
    STREAMS_FILES
        .iter()
        .find(|(name, _)| *name == dataset)
        .and_then(|(_, prefix)| STREAM_DEFS.get(prefix).cloned())
        .ok_or_else(|| StreamError::UnknownStream(dataset.to_string()))
}

/// Stream definition owning partition files named `{prefix}.txt.*.gz`.
pub fn stream_def_by_prefix(prefix: &str) -> StreamResult<Arc<StreamDef>> {
    STREAM_DEFS
        .get(prefix)
        .cloned()
        .ok_or_else(|| StreamError::UnknownStream(prefix.to_string()))
}

pub fn dataset_names() -> impl Iterator<Item = &'static str> {
    STREAMS_FILES.iter().map(|(name, _)| *name)
}

pub fn content_type_name(id: u32) -> Option<&'static str> {
    CONTENT_TYPE_INDEX
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, name)| *name)
}

pub fn content_type_id(name: &str) -> Option<u32> {
    CONTENT_TYPE_INDEX
        .iter()
        .find(|(_, value)| *value == name)
        .map(|(id, _)| *id)
}

pub fn is_mandatory_content_type(name: &str) -> bool {
    MANDATORY_CONTENT_TYPES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dataset_resolves() {
        for name in dataset_names() {
            let def = stream_def(name).unwrap();
            assert_eq!(def.field_index("id").unwrap(), 0, "{name}");
        }
        assert_eq!(stream_def("urllinks").unwrap().file_prefix(), "outlinks");
    }

    #[test]
    fn unknown_dataset() {
        assert!(matches!(
            stream_def("urlnothing"),
            Err(StreamError::UnknownStream(_))
        ));
    }

    #[test]
    fn link_catalogs_decode_follow_masks() {
        let def = stream_def_by_prefix("inlinks").unwrap();
        let row = def.decode_row(&["5", "a", "3", "9"]).unwrap();
        assert_eq!(row[2].as_str(), Some("follow"));
        assert_eq!(row[2].as_i64(), Some(3));
    }

    #[test]
    fn shared_definitions() {
        let a = stream_def("urlinfos").unwrap();
        let b = stream_def_by_prefix("infos").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_name(2), Some("h1"));
        assert_eq!(content_type_name(9), None);
        assert_eq!(content_type_id("description"), Some(4));
        assert!(is_mandatory_content_type("title"));
        assert!(!is_mandatory_content_type("h2"));
    }
}
