use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use url::Url;

use crate::{error::StreamError, StreamResult};

/// Where the partitions of a dataset live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A bucket (and optional key prefix) in object storage.
    Remote(RemoteLocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub scheme: String,
    pub bucket: String,
    pub prefix: Option<String>,
}

impl RemoteLocation {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, prefix: Option<&str>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    /// Object key of `name` inside this location.
    pub fn key(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }

    /// Full URI of `name` inside this location.
    pub fn uri_of(&self, name: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, self.key(name))
    }
}

impl Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.bucket)?;
        if let Some(prefix) = &self.prefix {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}

impl Location {
    /// A bare path is local, `file://` is local, `s3://bucket/prefix` is remote.
    pub fn parse(input: &str) -> StreamResult<Self> {
        if !input.contains("://") {
            return Ok(Location::Local(PathBuf::from(input)));
        }

        let invalid = |reason: String| StreamError::InvalidLocation {
            location: input.to_string(),
            reason,
        };
        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| invalid("not a local file path".to_string())),
            "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| invalid("missing bucket name".to_string()))?;
                Ok(Location::Remote(RemoteLocation::new(
                    "s3",
                    bucket,
                    Some(url.path()),
                )))
            }
            other => Err(invalid(format!("unsupported scheme {other}"))),
        }
    }
}

impl FromStr for Location {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Local(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Local(path.to_path_buf())
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(remote) => write!(f, "{remote}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_are_local() {
        assert_eq!(
            Location::parse("/tmp/crawl").unwrap(),
            Location::Local(PathBuf::from("/tmp/crawl"))
        );
        assert_eq!(
            Location::parse("relative/dir").unwrap(),
            Location::Local(PathBuf::from("relative/dir"))
        );
    }

    #[test]
    fn file_uri_is_local() {
        assert_eq!(
            Location::parse("file:///tmp/crawl").unwrap(),
            Location::Local(PathBuf::from("/tmp/crawl"))
        );
    }

    #[test]
    fn s3_uri_with_and_without_prefix() {
        let Location::Remote(remote) = Location::parse("s3://test_bucket").unwrap() else {
            panic!("expected remote location");
        };
        assert_eq!(remote.bucket, "test_bucket");
        assert_eq!(remote.prefix, None);
        assert_eq!(remote.uri_of("test.txt.0.gz"), "s3://test_bucket/test.txt.0.gz");

        let Location::Remote(remote) = Location::parse("s3://bucket/crawl/42/").unwrap() else {
            panic!("expected remote location");
        };
        assert_eq!(remote.prefix.as_deref(), Some("crawl/42"));
        assert_eq!(remote.key("test.txt.3.gz"), "crawl/42/test.txt.3.gz");
        assert_eq!(remote.to_string(), "s3://bucket/crawl/42");
    }

    #[test]
    fn unsupported_scheme() {
        assert!(matches!(
            Location::parse("ftp://host/dir"),
            Err(StreamError::InvalidLocation { .. })
        ));
    }
}
