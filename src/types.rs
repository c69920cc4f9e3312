/// Unique cut identifier (stable across shards and fields).
/// Example: `rec-0001-seg-03`
pub type CutId = String;
/// Name of a data channel attached to cuts.
/// Examples: `cuts`, `recording`, `features`, `custom_label`
pub type FieldName = String;
/// Name of an item inside a field stream; its stem is the owning cut id.
/// Examples: `rec-0001-seg-03.flac`, `rec-0001-seg-03.llc`
pub type ItemName = String;
/// Free-form JSON attributes carried by a cut manifest line.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
