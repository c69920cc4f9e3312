//! Shard location addressing and byte-stream opening.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use crate::constants::transport::{GZIP_SUFFIX, PIPE_PREFIX};
use crate::errors::SharError;
use crate::utils::has_suffix;

/// Filesystem transport (paths, directory listing, newline counting).
pub mod fs;
/// Shell pipeline transport (`pipe:` locations).
pub mod pipe;

/// Boxed byte stream returned when a location is opened.
pub type ShardReader = Box<dyn Read + Send>;

/// Addressable source for one field's data in one shard.
///
/// Locations are inert until [`ShardLocation::open`] is called, which only
/// happens when iteration reaches the owning shard.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardLocation {
    /// Local file.
    Path(PathBuf),
    /// Shell command whose stdout is the stream (written as `pipe:<command>`).
    Pipe(String),
}

impl ShardLocation {
    /// Parse a textual location; a `pipe:` prefix selects a shell command.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(PIPE_PREFIX) {
            Some(command) => Self::Pipe(command.trim().to_string()),
            None => Self::Path(PathBuf::from(raw)),
        }
    }

    /// Last path-like component used for suffix detection.
    ///
    /// For pipes this is whatever follows the final `/` of the command, which
    /// is the remote object name for typical `curl`/`aws s3 cp` invocations.
    pub fn file_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Pipe(command) => command
                .rsplit('/')
                .next()
                .unwrap_or(command)
                .trim()
                .to_string(),
        }
    }

    /// True if any dotted suffix of the file name equals `suffix`.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        has_suffix(&self.file_name(), suffix)
    }

    /// Open the location as a byte stream, transparently decompressing gzip.
    pub fn open(&self) -> Result<ShardReader, SharError> {
        let raw: ShardReader = match self {
            Self::Path(path) => Box::new(fs::open_file(path)?),
            Self::Pipe(command) => Box::new(pipe::PipeReader::spawn(command)?),
        };
        if self.has_suffix(GZIP_SUFFIX) {
            return Ok(Box::new(MultiGzDecoder::new(raw)));
        }
        Ok(raw)
    }

    /// Local path, if this is a filesystem location.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Pipe(_) => None,
        }
    }
}

impl fmt::Display for ShardLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Pipe(command) => write!(f, "{PIPE_PREFIX}{command}"),
        }
    }
}

impl From<&str> for ShardLocation {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for ShardLocation {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<PathBuf> for ShardLocation {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for ShardLocation {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}
