use std::io::{BufRead, BufReader};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::shar::{ADAPTED_ITEM_SUFFIX, FIELD_MANIFEST_CUT_ID_KEY};
use crate::data::{Cut, FieldValue};
use crate::errors::SharError;
use crate::source::backends::{FieldItem, FieldStream};
use crate::transport::{ShardLocation, ShardReader};
use crate::types::{Attributes, CutId, FieldName};

/// Sequential JSONL decoder over an opened shard location.
///
/// Blank lines are skipped; every other line must hold one JSON value.
struct JsonLines {
    location: ShardLocation,
    reader: BufReader<ShardReader>,
    line: String,
    line_no: usize,
}

impl JsonLines {
    fn open(location: &ShardLocation) -> Result<Self, SharError> {
        Ok(Self {
            location: location.clone(),
            reader: BufReader::new(location.open()?),
            line: String::new(),
            line_no: 0,
        })
    }

    fn next_record<T: DeserializeOwned>(&mut self) -> Option<Result<T, SharError>> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
            self.line_no += 1;
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(trimmed).map_err(|err| self.error(err.to_string())),
            );
        }
    }

    fn error(&self, details: String) -> SharError {
        SharError::Manifest {
            location: self.location.to_string(),
            line: self.line_no,
            details,
        }
    }
}

/// Primary-field reader yielding cuts in file order.
pub struct CutManifestReader {
    lines: JsonLines,
}

impl CutManifestReader {
    /// Open the cut manifest at `location`.
    pub fn open(location: &ShardLocation) -> Result<Self, SharError> {
        Ok(Self {
            lines: JsonLines::open(location)?,
        })
    }
}

impl Iterator for CutManifestReader {
    type Item = Result<Cut, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next_record()
    }
}

#[derive(Deserialize)]
struct FieldLine {
    cut_id: CutId,
    #[serde(flatten)]
    rest: Attributes,
}

/// Field manifest adapted to the archive pair shape.
///
/// Each line names its cut through `cut_id`; the field's value lives under the
/// field's own key. A missing key (or `null`) is a placeholder.
pub struct JsonlFieldStream {
    field: FieldName,
    lines: JsonLines,
}

impl JsonlFieldStream {
    /// Open the manifest for `field` at `location`.
    pub fn open(field: impl Into<FieldName>, location: &ShardLocation) -> Result<Self, SharError> {
        Ok(Self {
            field: field.into(),
            lines: JsonLines::open(location)?,
        })
    }

    fn adapt(&self, mut line: FieldLine) -> FieldItem {
        let value = match line.rest.remove(&self.field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(FieldValue::Manifest { value }),
        };
        FieldItem {
            value,
            name: format!("{}.{ADAPTED_ITEM_SUFFIX}", line.cut_id),
        }
    }
}

impl Iterator for JsonlFieldStream {
    type Item = Result<FieldItem, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next_record::<Value>()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        let parsed = serde_json::from_value::<FieldLine>(line).map_err(|err| {
            self.lines.error(format!(
                "field manifest line needs a '{FIELD_MANIFEST_CUT_ID_KEY}' string: {err}"
            ))
        });
        Some(parsed.map(|line| self.adapt(line)))
    }
}

impl FieldStream for JsonlFieldStream {
    fn location(&self) -> &ShardLocation {
        &self.lines.location
    }
}
