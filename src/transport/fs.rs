use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::transport::COUNT_BUFFER_BYTES;
use crate::errors::SharError;
use crate::transport::ShardLocation;

/// Open a local shard file for reading.
pub fn open_file(path: &Path) -> Result<File, SharError> {
    File::open(path).map_err(|err| {
        SharError::Io(std::io::Error::new(
            err.kind(),
            format!("failed opening shard {}: {err}", path.display()),
        ))
    })
}

/// List regular files directly inside `dir`, sorted lexicographically by path.
///
/// Subdirectories are not descended into; symlinks to files are followed.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, SharError> {
    if !fs::metadata(dir)?.is_dir() {
        return Err(SharError::Configuration(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|err| {
            SharError::Io(
                err.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Count `\n` bytes in the (decompressed) stream behind `location`.
///
/// This is the fast record count for line-oriented manifests: lines are never
/// decoded, and a trailing line without a newline is not counted.
pub fn count_newlines(location: &ShardLocation) -> Result<usize, SharError> {
    let mut reader = location.open()?;
    let mut buffer = vec![0u8; COUNT_BUFFER_BYTES];
    let mut count = 0usize;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        count += buffer[..read].iter().filter(|byte| **byte == b'\n').count();
    }
    Ok(count)
}
