use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::ShardLocation;

pub use crate::types::{Attributes, CutId, FieldName, ItemName};

/// Payload read from one archive item: its metadata manifest plus raw bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveItem {
    /// Name of the data member inside the archive (e.g. `cut-1.flac`).
    pub name: ItemName,
    /// Metadata manifest stored next to the data member.
    pub manifest: Value,
    /// Raw bytes of the data member.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

/// Value attached to a cut for one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldValue {
    /// Structured value carried by a line-oriented field manifest.
    Manifest {
        /// Value stored under the field's key.
        value: Value,
    },
    /// Item read from a binary archive.
    Archive(ArchiveItem),
}

impl FieldValue {
    /// Structured metadata for this value (the manifest entry in either case).
    pub fn manifest(&self) -> &Value {
        match self {
            Self::Manifest { value } => value,
            Self::Archive(item) => &item.manifest,
        }
    }

    /// Raw archive bytes, when the value came from an archive.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Manifest { .. } => None,
            Self::Archive(item) => Some(&item.data),
        }
    }
}

/// Logical record yielded by shard iteration.
///
/// The primary manifest line supplies `id` and `attributes`; shard merging
/// attaches per-field values and stamps `shard_origin`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    /// Unique cut identifier; item name stems must match it.
    pub id: CutId,
    /// Remaining manifest attributes (duration, supervisions, custom keys, ...).
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Attached field values in stream order.
    #[serde(skip)]
    pub fields: IndexMap<FieldName, FieldValue>,
    /// Primary-field location of the shard this cut was read from.
    #[serde(skip)]
    pub shard_origin: Option<ShardLocation>,
}

impl Cut {
    /// Create a cut with no attributes or fields.
    pub fn new(id: impl Into<CutId>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            fields: IndexMap::new(),
            shard_origin: None,
        }
    }

    /// Attach (or replace) the value for `field`.
    pub fn attach(&mut self, field: impl Into<FieldName>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Attached value for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// True if a value is attached for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Manifest attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set a manifest attribute, returning the previous value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(key.into(), value)
    }

    /// Builder-style variant of [`Cut::set_attribute`].
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set_attribute(key, value);
        self
    }
}
