use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::constants::shar::{MANIFEST_SUFFIX, PRIMARY_FIELD};
use crate::errors::SharError;
use crate::transport::ShardLocation;
use crate::transport::fs::list_files;
use crate::types::FieldName;
use crate::utils::{has_suffix, leading_component};

/// Locations of every field for one shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardDescriptor {
    /// Position of this shard before any shuffling.
    pub index: usize,
    /// Field name to location; the primary field comes first.
    pub locations: IndexMap<FieldName, ShardLocation>,
}

impl ShardDescriptor {
    /// Location of the primary cut manifest.
    pub fn primary(&self) -> &ShardLocation {
        &self.locations[PRIMARY_FIELD]
    }

    /// Non-primary fields and their locations, in stream order.
    pub fn field_locations(&self) -> impl Iterator<Item = (&FieldName, &ShardLocation)> {
        self.locations
            .iter()
            .filter(|(field, _)| field.as_str() != PRIMARY_FIELD)
    }
}

/// Validated field→shard-location table.
#[derive(Clone, Debug)]
pub struct ShardResolver {
    streams: IndexMap<FieldName, Vec<ShardLocation>>,
}

impl ShardResolver {
    /// Resolve from exactly one of an explicit mapping or a directory.
    pub fn resolve(
        fields: Option<IndexMap<FieldName, Vec<ShardLocation>>>,
        in_dir: Option<&Path>,
    ) -> Result<Self, SharError> {
        match (fields, in_dir) {
            (Some(fields), None) => Self::from_fields(fields),
            (None, Some(in_dir)) => Self::from_dir(in_dir),
            _ => Err(SharError::Configuration(
                "provide exactly one of 'fields' or 'in_dir' to read sharded cuts".to_string(),
            )),
        }
    }

    /// Use an explicit mapping; the primary field must be present.
    pub fn from_fields(
        mut fields: IndexMap<FieldName, Vec<ShardLocation>>,
    ) -> Result<Self, SharError> {
        let Some(primary) = fields.shift_remove(PRIMARY_FIELD) else {
            return Err(SharError::Configuration(format!(
                "field mapping must contain the '{PRIMARY_FIELD}' field"
            )));
        };
        let mut streams = IndexMap::with_capacity(fields.len() + 1);
        streams.insert(PRIMARY_FIELD.to_string(), primary);
        streams.extend(fields);
        Self::validated(streams)
    }

    /// Scan `in_dir` for `<field>.<shard>.<ext>` files.
    ///
    /// Files are grouped by the name component before the first `.`; only
    /// `.jsonl` files count for the primary field. Each group is sorted
    /// lexicographically, so shard indices must be zero-padded.
    pub fn from_dir(in_dir: &Path) -> Result<Self, SharError> {
        let mut groups: IndexMap<FieldName, Vec<PathBuf>> = IndexMap::new();
        for path in list_files(in_dir)? {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let field = leading_component(name);
            if field.is_empty() {
                continue;
            }
            if field == PRIMARY_FIELD && !has_suffix(name, MANIFEST_SUFFIX) {
                debug!(path = %path.display(), "ignoring non-manifest file for primary field");
                continue;
            }
            let field = field.to_string();
            groups.entry(field).or_default().push(path);
        }
        if !groups.contains_key(PRIMARY_FIELD) {
            return Err(SharError::Configuration(format!(
                "no '{PRIMARY_FIELD}.*.{MANIFEST_SUFFIX}' shards found in {}",
                in_dir.display()
            )));
        }
        groups.sort_by(|left, _, right, _| {
            (left != PRIMARY_FIELD)
                .cmp(&(right != PRIMARY_FIELD))
                .then_with(|| left.cmp(right))
        });
        let streams = groups
            .into_iter()
            .map(|(field, mut paths)| {
                paths.sort();
                (field, paths.into_iter().map(ShardLocation::Path).collect())
            })
            .collect();
        Self::validated(streams)
    }

    fn validated(streams: IndexMap<FieldName, Vec<ShardLocation>>) -> Result<Self, SharError> {
        let expected = streams[PRIMARY_FIELD].len();
        for (field, locations) in &streams {
            if locations.len() != expected {
                return Err(SharError::ShardCountMismatch {
                    field: field.clone(),
                    expected,
                    found: locations.len(),
                });
            }
        }
        Ok(Self { streams })
    }

    /// Number of shards (the primary field's location count).
    pub fn num_shards(&self) -> usize {
        self.streams[PRIMARY_FIELD].len()
    }

    /// Non-primary field names in stream order.
    pub fn fields(&self) -> Vec<FieldName> {
        self.streams
            .keys()
            .filter(|field| field.as_str() != PRIMARY_FIELD)
            .cloned()
            .collect()
    }

    /// Per-field location lists, primary first.
    pub fn streams(&self) -> &IndexMap<FieldName, Vec<ShardLocation>> {
        &self.streams
    }

    /// Primary manifest locations in shard order.
    pub fn primary_locations(&self) -> &[ShardLocation] {
        &self.streams[PRIMARY_FIELD]
    }

    /// Zip the per-field lists positionally into shard descriptors.
    pub fn descriptors(&self) -> Vec<ShardDescriptor> {
        (0..self.num_shards())
            .map(|index| ShardDescriptor {
                index,
                locations: self
                    .streams
                    .iter()
                    .map(|(field, locations)| (field.clone(), locations[index].clone()))
                    .collect(),
            })
            .collect()
    }
}
