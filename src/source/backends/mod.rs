//! Per-field stream implementations.
//!
//! Every non-primary field of a shard is read through [`FieldStream`], which
//! yields `(value-or-placeholder, item-name)` pairs in stream order. Binary
//! archives and line-oriented field manifests implement it identically, so the
//! shard merge never needs to know which kind of storage backs a field.

use crate::constants::shar::ARCHIVE_SUFFIX;
use crate::data::FieldValue;
use crate::errors::SharError;
use crate::transport::ShardLocation;
use crate::types::ItemName;
use crate::utils::item_stem;

/// Line-oriented manifest readers (primary cuts and adapted field manifests).
pub mod jsonl;
/// Binary tar archive reader.
pub mod tar_archive;

pub use jsonl::{CutManifestReader, JsonlFieldStream};
pub use tar_archive::TarFieldStream;

/// One step of a field stream.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldItem {
    /// Value for the cut at this position, or `None` for a placeholder.
    pub value: Option<FieldValue>,
    /// Item name whose stem is the owning cut id.
    pub name: ItemName,
}

impl FieldItem {
    /// Cut id this item belongs to.
    pub fn cut_id(&self) -> &str {
        item_stem(&self.name)
    }
}

/// Ordered pair sequence shared by archive and manifest field storage.
pub trait FieldStream: Iterator<Item = Result<FieldItem, SharError>> + Send {
    /// Location this stream reads from.
    fn location(&self) -> &ShardLocation;
}

/// Open `location` for `field`, choosing the archive reader for `.tar` shards
/// and the manifest adaptor otherwise.
pub fn open_field_stream(
    field: &str,
    location: &ShardLocation,
) -> Result<Box<dyn FieldStream>, SharError> {
    if location.has_suffix(ARCHIVE_SUFFIX) {
        Ok(Box::new(TarFieldStream::open(location)?))
    } else {
        Ok(Box::new(JsonlFieldStream::open(field, location)?))
    }
}
