#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};

/// Write a tar archive with one data/metadata member pair per cut id.
///
/// `None` ids produce a placeholder pair under `placeholder-<n>`.
pub fn write_archive(path: &Path, items: &[Option<&str>], extension: &str) {
    let mut builder = tar::Builder::new(File::create(path).unwrap());
    for (pos, item) in items.iter().enumerate() {
        match item {
            Some(id) => {
                append(&mut builder, &format!("{id}.{extension}"), id.as_bytes());
                let meta = json!({"id": id, "bytes": id.len()}).to_string();
                append(&mut builder, &format!("{id}.json"), meta.as_bytes());
            }
            None => {
                append(&mut builder, &format!("placeholder-{pos}.nodata"), b"");
                append(&mut builder, &format!("placeholder-{pos}.nometa"), b"");
            }
        }
    }
    builder.into_inner().unwrap().flush().unwrap();
}

fn append(builder: &mut tar::Builder<File>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data).unwrap();
}

fn cut_lines(ids: &[&str], shard: usize) -> String {
    ids.iter()
        .map(|id| format!("{}\n", json!({"id": id, "duration": 1.0, "shard": shard})))
        .collect()
}

/// Write a plain cut manifest.
pub fn write_cuts(path: &Path, ids: &[&str], shard: usize) {
    fs::write(path, cut_lines(ids, shard)).unwrap();
}

/// Write a gzip-compressed cut manifest.
pub fn write_cuts_gz(path: &Path, ids: &[&str], shard: usize) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(cut_lines(ids, shard).as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// Write a JSONL field manifest from raw line values.
pub fn write_field_lines(path: &Path, lines: &[Value]) {
    let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
    fs::write(path, body).unwrap();
}

/// Dataset of `shards` shards in `dir`, each holding `cuts_per_shard` cuts
/// named `s<shard>-c<cut>` with a `recording` archive and a `label` manifest.
pub fn write_dataset(dir: &Path, shards: usize, cuts_per_shard: usize) -> Vec<Vec<String>> {
    let mut all = Vec::with_capacity(shards);
    for shard in 0..shards {
        let ids: Vec<String> = (0..cuts_per_shard)
            .map(|cut| format!("s{shard}-c{cut}"))
            .collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        write_cuts(&shard_path(dir, "cuts", shard, "jsonl"), &refs, shard);
        let items: Vec<Option<&str>> = refs.iter().copied().map(Some).collect();
        write_archive(&shard_path(dir, "recording", shard, "tar"), &items, "flac");
        let labels: Vec<Value> = refs
            .iter()
            .map(|id| json!({"cut_id": id, "label": format!("label-{id}")}))
            .collect();
        write_field_lines(&shard_path(dir, "label", shard, "jsonl"), &labels);
        all.push(ids);
    }
    all
}

pub fn shard_path(dir: &Path, field: &str, shard: usize, extension: &str) -> PathBuf {
    dir.join(format!("{field}.{shard:06}.{extension}"))
}
