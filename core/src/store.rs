//! Immutable store files: a shared byte arena with a validated prelude.

use crate::codec::Reader;
use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const MAGIC: &[u8; 4] = b"DAIX";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    Postings,
    TermVectors,
}

impl StoreKind {
    /// Width of one fixed-size directory slot.
    pub fn directory_entry_width(self) -> usize {
        match self {
            StoreKind::Postings => 8,
            StoreKind::TermVectors => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub kind: StoreKind,
    pub doc_count: u32,
    pub total_length: u64,
    pub entry_count: u32,
    pub directory_offset: u64,
}

/// A whole store file held in memory. Cloning shares the arena.
#[derive(Debug, Clone)]
pub struct StoreFile {
    bytes: Arc<[u8]>,
    header: StoreHeader,
}

impl StoreFile {
    pub fn open(path: &Path, kind: StoreKind) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            IndexError::DatabaseOpen(format!("{}: {e}", path.display()))
        })?;
        Self::from_bytes(bytes, kind)
            .map_err(|e| IndexError::DatabaseOpen(format!("{}: {e}", path.display())))
    }

    pub fn from_bytes(bytes: Vec<u8>, kind: StoreKind) -> Result<Self> {
        let mut r = Reader::new(&bytes);
        if r.read_bytes(4)? != MAGIC {
            return Err(IndexError::corrupt("bad magic"));
        }
        let version = r.read_u32_le()?;
        if version != FORMAT_VERSION {
            return Err(IndexError::corrupt(format!(
                "format version {version}, expected {FORMAT_VERSION}"
            )));
        }
        let header_len = r.read_u32_le()? as usize;
        let header: StoreHeader = bincode::deserialize(r.read_bytes(header_len)?)?;
        if header.kind != kind {
            return Err(IndexError::corrupt(format!(
                "store kind {:?}, expected {kind:?}",
                header.kind
            )));
        }
        let dir_start = usize::try_from(header.directory_offset)
            .map_err(|_| IndexError::corrupt("directory offset overflow"))?;
        let dir_len = header.entry_count as usize * kind.directory_entry_width();
        if dir_start < r.position() || dir_start.checked_add(dir_len) != Some(bytes.len()) {
            return Err(IndexError::corrupt(format!(
                "directory at {dir_start} with {} entries does not end at file size {}",
                header.entry_count,
                bytes.len()
            )));
        }
        Ok(Self { bytes: bytes.into(), header })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn entry_count(&self) -> usize {
        self.header.entry_count as usize
    }

    /// Reader positioned on directory slot `idx`.
    pub fn directory_slot(&self, idx: usize) -> Reader<'_> {
        let width = self.header.kind.directory_entry_width();
        Reader::at(&self.bytes, self.header.directory_offset as usize + idx * width)
    }

    /// Bounds-checked record offset taken from the directory.
    pub fn record_offset(&self, raw: u64) -> Result<usize> {
        let off = raw as usize;
        if raw >= self.header.directory_offset {
            return Err(IndexError::corrupt(format!("record offset {raw} past records")));
        }
        Ok(off)
    }

    /// Records live between the prelude and the directory.
    pub fn records(&self) -> &[u8] {
        &self.bytes[..self.header.directory_offset as usize]
    }
}

/// Assemble a store file. `directory` receives the absolute offset of the
/// first record so it can emit absolute record offsets.
pub fn encode_store(
    kind: StoreKind,
    doc_count: u32,
    total_length: u64,
    entry_count: u32,
    records: &[u8],
    directory: impl FnOnce(u64) -> Vec<u8>,
) -> Result<Vec<u8>> {
    let mut header = StoreHeader { kind, doc_count, total_length, entry_count, directory_offset: 0 };
    // bincode's fixint encoding keeps the header size independent of its values.
    let header_len = bincode::serialized_size(&header)? as usize;
    let prelude_len = MAGIC.len() + 4 + 4 + header_len;
    header.directory_offset = (prelude_len + records.len()) as u64;
    let dir = directory(prelude_len as u64);

    let mut out = Vec::with_capacity(prelude_len + records.len() + dir.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(header_len as u32).to_le_bytes());
    out.extend_from_slice(&bincode::serialize(&header)?);
    out.extend_from_slice(records);
    out.extend_from_slice(&dir);
    Ok(out)
}
