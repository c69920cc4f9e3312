//! Name helpers shared by resolvers and stream implementations.

use std::path::Path;

/// Dotted suffixes of a file name, without the dots.
///
/// Leading dots are part of the name (`.hidden.tar` has the single suffix
/// `tar`), and a trailing dot yields no suffixes.
pub fn suffixes(file_name: &str) -> Vec<&str> {
    let trimmed = file_name.trim_start_matches('.');
    if trimmed.ends_with('.') {
        return Vec::new();
    }
    trimmed.split('.').skip(1).collect()
}

/// True if any dotted suffix of `file_name` equals `suffix` (given without a dot).
pub fn has_suffix(file_name: &str, suffix: &str) -> bool {
    suffixes(file_name).contains(&suffix)
}

/// Leading name component before the first `.`, used to group shard files by field.
pub fn leading_component(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Stem of an item name: the final path component minus its last extension.
///
/// `dir/rec-01.seg.flac` has stem `rec-01.seg`, which must equal the owning cut id.
pub fn item_stem(item_name: &str) -> &str {
    Path::new(item_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(item_name)
}
