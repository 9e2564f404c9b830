//! Open Packaging Convention (OPC) container handling.
//!
//! Both container formats this pipeline fills (WordprocessingML and
//! SpreadsheetML) are ZIP archives of named parts. [`OpcPackage`] inflates
//! the whole archive into memory (part name → bytes), preserving every part
//! it does not understand byte-for-byte, and repacks the ZIP on save. Saves
//! go through an atomic temp-file rename so a failed write never leaves a
//! half-rewritten archive at the output path.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Maximum allowed inflated size for a single part. Guardrail against ZIP
/// bombs and forged size metadata when materializing a package in memory.
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum allowed inflated size across all parts of one package.
pub const MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

#[derive(Debug, Error)]
pub enum OpcError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error("package part is too large to load safely: {part} is {size} bytes (max {max})")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// An OPC package inflated into memory.
///
/// Part order is preserved from the source archive so repacking is
/// deterministic and diffs cleanly against the template.
#[derive(Debug, Clone, Default)]
pub struct OpcPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl OpcPackage {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OpcError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpcError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let declared = file.size();
            if declared > MAX_PART_BYTES {
                return Err(OpcError::PartTooLarge {
                    part: name,
                    size: declared,
                    max: MAX_PART_BYTES,
                });
            }

            // Don't trust ZIP metadata alone: cap the read and error if more
            // bytes show up than the declared size allows.
            let mut buf = Vec::new();
            let mut reader = (&mut file).take(MAX_PART_BYTES + 1);
            reader.read_to_end(&mut buf)?;
            let observed = buf.len() as u64;
            if observed > MAX_PART_BYTES {
                return Err(OpcError::PartTooLarge {
                    part: name,
                    size: observed,
                    max: MAX_PART_BYTES,
                });
            }
            total = total.saturating_add(observed);
            if total > MAX_TOTAL_BYTES {
                return Err(OpcError::PackageTooLarge {
                    total,
                    max: MAX_TOTAL_BYTES,
                });
            }
            parts.push((name, buf));
        }

        Ok(Self { parts })
    }

    /// Look up a part by name, tolerating common producer mistakes (leading
    /// `/`, `\` separators, ASCII case differences). Exact matches win.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        if let Some((_, bytes)) = self.parts.iter().find(|(n, _)| n == name) {
            return Some(bytes);
        }
        self.parts
            .iter()
            .find(|(n, _)| part_names_equivalent(n, name))
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn required_part(&self, name: &str) -> Result<&[u8], OpcError> {
        self.part(name)
            .ok_or_else(|| OpcError::MissingPart(name.to_string()))
    }

    /// Replace an existing part in place (keeping archive order) or append
    /// a new one.
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        if let Some(slot) = self
            .parts
            .iter_mut()
            .find(|(n, _)| n == &name || part_names_equivalent(n, &name))
        {
            slot.1 = bytes;
        } else {
            self.parts.push((name, bytes));
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(n, b)| (n.as_str(), b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Repack the package into ZIP bytes, deflate-compressed, in part
    /// order.
    pub fn write_to_vec(&self) -> Result<Vec<u8>, OpcError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Repack and atomically replace `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OpcError> {
        let bytes = self.write_to_vec()?;
        gabarit_fs::atomic_write_bytes(path, &bytes)?;
        Ok(())
    }
}

/// Case-, separator- and leading-slash-insensitive part name comparison.
fn part_names_equivalent(a: &str, b: &str) -> bool {
    fn normalized(s: &str) -> impl Iterator<Item = u8> + '_ {
        s.bytes()
            .skip_while(|b| matches!(b, b'/' | b'\\'))
            .map(|b| if b == b'\\' { b'/' } else { b.to_ascii_lowercase() })
    }
    normalized(a).eq(normalized(b))
}
