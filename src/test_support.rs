//! Fixture writers shared by unit tests.

use std::fs::{self, File};
use std::path::Path;

use serde_json::Value;

use crate::constants::shar::{ARCHIVE_META_SUFFIX, ARCHIVE_NODATA_SUFFIX, ARCHIVE_NOMETA_SUFFIX};
use crate::transport::ShardLocation;

/// One data/metadata member pair to write into a test archive.
pub struct ArchiveEntry {
    pub cut_id: String,
    pub payload: Option<(String, Vec<u8>, Value)>,
}

impl ArchiveEntry {
    pub fn item(cut_id: &str, extension: &str, data: &[u8], manifest: Value) -> Self {
        Self {
            cut_id: cut_id.to_string(),
            payload: Some((extension.to_string(), data.to_vec(), manifest)),
        }
    }

    pub fn placeholder(cut_id: &str) -> Self {
        Self {
            cut_id: cut_id.to_string(),
            payload: None,
        }
    }
}

pub fn append_member(builder: &mut tar::Builder<File>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data).unwrap();
}

pub fn write_archive(dir: &Path, name: &str, entries: &[ArchiveEntry]) -> ShardLocation {
    let path = dir.join(name);
    let mut builder = tar::Builder::new(File::create(&path).unwrap());
    for entry in entries {
        match &entry.payload {
            Some((extension, data, manifest)) => {
                append_member(&mut builder, &format!("{}.{extension}", entry.cut_id), data);
                append_member(
                    &mut builder,
                    &format!("{}.{ARCHIVE_META_SUFFIX}", entry.cut_id),
                    manifest.to_string().as_bytes(),
                );
            }
            None => {
                append_member(
                    &mut builder,
                    &format!("{}.{ARCHIVE_NODATA_SUFFIX}", entry.cut_id),
                    b"",
                );
                append_member(
                    &mut builder,
                    &format!("{}.{ARCHIVE_NOMETA_SUFFIX}", entry.cut_id),
                    b"",
                );
            }
        }
    }
    builder.into_inner().unwrap();
    ShardLocation::from(path)
}

pub fn write_cuts(dir: &Path, name: &str, ids: &[&str]) -> ShardLocation {
    let path = dir.join(name);
    let body: String = ids
        .iter()
        .map(|id| format!("{{\"id\":\"{id}\",\"duration\":1.0}}\n"))
        .collect();
    fs::write(&path, body).unwrap();
    ShardLocation::from(path)
}

pub fn write_lines(dir: &Path, name: &str, lines: &[Value]) -> ShardLocation {
    let path = dir.join(name);
    let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
    fs::write(&path, body).unwrap();
    ShardLocation::from(path)
}
