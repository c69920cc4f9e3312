use std::io::{self, Read};
use std::path::Path;

use tar::{Header, PaxExtensions};

use crate::constants::shar::{ARCHIVE_META_SUFFIX, ARCHIVE_NODATA_SUFFIX, ARCHIVE_NOMETA_SUFFIX};
use crate::data::{ArchiveItem, FieldValue};
use crate::errors::SharError;
use crate::source::backends::{FieldItem, FieldStream};
use crate::transport::{ShardLocation, ShardReader};
use crate::types::ItemName;
use crate::utils::item_stem;

const BLOCK_SIZE: u64 = 512;
const PAX_PATH_KEY: &str = "path";
const PAX_SIZE_KEY: &str = "size";

struct Member {
    name: ItemName,
    data: Vec<u8>,
}

/// Sequential reader over a field archive.
///
/// Members come in pairs: a data member `<cut_id>.<ext>` followed by its
/// metadata member `<cut_id>.json`. A `.nodata`/`.nometa` pair is a
/// placeholder for a cut that has no value in this field. Headers are decoded
/// straight off the stream, so only one pair is held in memory at a time and
/// the reader never seeks.
pub struct TarFieldStream {
    location: ShardLocation,
    reader: ShardReader,
    done: bool,
}

impl TarFieldStream {
    /// Open the archive at `location`.
    pub fn open(location: &ShardLocation) -> Result<Self, SharError> {
        Ok(Self {
            location: location.clone(),
            reader: location.open()?,
            done: false,
        })
    }

    fn next_member(&mut self) -> Option<Result<Member, SharError>> {
        if self.done {
            return None;
        }
        match self.read_member() {
            Ok(Some(member)) => Some(Ok(member)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(self.malformed(err.to_string())))
            }
        }
    }

    /// Read headers until the next regular file, resolving GNU long names and
    /// pax `path`/`size` overrides. `None` at the end-of-archive marker or clean EOF.
    fn read_member(&mut self) -> io::Result<Option<Member>> {
        let mut long_name: Option<String> = None;
        let mut pax_size: Option<u64> = None;
        loop {
            let mut header = Header::new_old();
            if !read_block(&mut self.reader, header.as_mut_bytes())? {
                return Ok(None);
            }
            if header.as_bytes().iter().all(|byte| *byte == 0) {
                return Ok(None);
            }
            let kind = header.entry_type();
            if kind.is_gnu_longname() {
                let data = read_body(&mut self.reader, header.entry_size()?)?;
                let name = String::from_utf8_lossy(&data);
                long_name = Some(name.trim_end_matches('\0').to_string());
                continue;
            }
            if kind.is_pax_local_extensions() {
                let data = read_body(&mut self.reader, header.entry_size()?)?;
                apply_pax(&data, &mut long_name, &mut pax_size)?;
                continue;
            }
            let size = match pax_size.take() {
                Some(size) => size,
                None => header.entry_size()?,
            };
            let data = read_body(&mut self.reader, size)?;
            if !kind.is_file() {
                long_name = None;
                continue;
            }
            let name = match long_name.take() {
                Some(name) => name,
                None => header.path()?.to_string_lossy().into_owned(),
            };
            return Ok(Some(Member { name, data }));
        }
    }

    fn pair(&self, data: Member, meta: Member) -> Result<FieldItem, SharError> {
        if item_stem(&data.name) != item_stem(&meta.name) {
            return Err(self.malformed(format!(
                "data member '{}' is followed by metadata member '{}'",
                data.name, meta.name
            )));
        }
        if extension_is(&data.name, ARCHIVE_NODATA_SUFFIX)
            || extension_is(&meta.name, ARCHIVE_NOMETA_SUFFIX)
        {
            return Ok(FieldItem {
                value: None,
                name: data.name,
            });
        }
        if !extension_is(&meta.name, ARCHIVE_META_SUFFIX) {
            return Err(self.malformed(format!(
                "expected metadata member '{}.{ARCHIVE_META_SUFFIX}' but found '{}'",
                item_stem(&data.name),
                meta.name
            )));
        }
        let manifest = serde_json::from_slice(&meta.data).map_err(|err| {
            self.malformed(format!("invalid metadata in '{}': {err}", meta.name))
        })?;
        Ok(FieldItem {
            value: Some(FieldValue::Archive(ArchiveItem {
                name: data.name.clone(),
                manifest,
                data: data.data,
            })),
            name: data.name,
        })
    }

    fn malformed(&self, details: String) -> SharError {
        SharError::Archive {
            location: self.location.to_string(),
            details,
        }
    }
}

impl Iterator for TarFieldStream {
    type Item = Result<FieldItem, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = match self.next_member()? {
            Ok(member) => member,
            Err(err) => return Some(Err(err)),
        };
        let meta = match self.next_member() {
            Some(Ok(member)) => member,
            Some(Err(err)) => return Some(Err(err)),
            None => {
                return Some(Err(self.malformed(format!(
                    "data member '{}' has no metadata member",
                    data.name
                ))));
            }
        };
        Some(self.pair(data, meta))
    }
}

impl FieldStream for TarFieldStream {
    fn location(&self) -> &ShardLocation {
        &self.location
    }
}

fn extension_is(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == extension)
}

/// Fill `block`; `false` on EOF before the first byte.
fn read_block(reader: &mut ShardReader, block: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "archive ends inside a header block",
                ));
            }
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

/// Read a member body of `size` bytes and skip its block padding.
fn read_body(reader: &mut ShardReader, size: u64) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(size.min(1 << 20) as usize);
    reader.by_ref().take(size).read_to_end(&mut data)?;
    let padding = (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE;
    let skipped = io::copy(&mut reader.by_ref().take(padding), &mut io::sink())?;
    if data.len() as u64 != size || skipped != padding {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("archive member truncated after {} of {size} bytes", data.len()),
        ));
    }
    Ok(data)
}

/// Apply the `path` and `size` records of a pax extended header to the next member.
fn apply_pax(data: &[u8], name: &mut Option<String>, size: &mut Option<u64>) -> io::Result<()> {
    for extension in PaxExtensions::new(data) {
        let extension = extension?;
        match extension.key() {
            Ok(PAX_PATH_KEY) => {
                *name = Some(String::from_utf8_lossy(extension.value_bytes()).into_owned());
            }
            Ok(PAX_SIZE_KEY) => {
                let value = extension
                    .value()
                    .ok()
                    .and_then(|value| value.trim().parse().ok())
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid pax size record")
                    })?;
                *size = Some(value);
            }
            _ => {}
        }
    }
    Ok(())
}
