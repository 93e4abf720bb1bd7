use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crc::{CRC_64_ECMA_182, Crc};
use thiserror::Error;
use tracing::debug;

use crate::model::dataset::Dataset;

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"KSCFSNAP";
pub const SNAPSHOT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 64;
pub const FLAG_GZIP: u32 = 1;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot already exists: {}", .0.display())]
    Exists(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file too small for a snapshot header")]
    Truncated,
    #[error("invalid magic")]
    InvalidMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("payload length mismatch: header says {expected}, file has {found}")]
    LengthMismatch { expected: u64, found: u64 },
    #[error("payload checksum mismatch")]
    ChecksumMismatch,
    #[error("gzip snapshot without gz feature")]
    GzipNotEnabled,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub flags: u32,
    pub payload_len: u64,
    pub crc64: u64,
    pub n_cells: u64,
    pub n_genes: u64,
}

impl SnapshotHeader {
    pub fn is_gzip(&self) -> bool {
        self.flags & FLAG_GZIP != 0
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(SNAPSHOT_MAGIC);
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        out[24..32].copy_from_slice(&self.crc64.to_le_bytes());
        out[32..40].copy_from_slice(&self.n_cells.to_le_bytes());
        out[40..48].copy_from_slice(&self.n_genes.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < HEADER_SIZE {
            return Err(SnapshotError::Truncated);
        }
        if &bytes[0..8] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        let version = read_u32(bytes, 8);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            flags: read_u32(bytes, 12),
            payload_len: read_u64(bytes, 16),
            crc64: read_u64(bytes, 24),
            n_cells: read_u64(bytes, 32),
            n_genes: read_u64(bytes, 40),
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

pub fn wants_gzip(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

/// Serializes the dataset into a snapshot at `path`.
///
/// The bytes go to a temporary sibling first. Without `overwrite` the temporary is
/// hard-linked into place, which fails if the target appeared meanwhile, so an
/// existing file is never touched.
pub fn write_snapshot(path: &Path, ds: &Dataset, overwrite: bool) -> Result<SnapshotHeader, SnapshotError> {
    if !overwrite && path.exists() {
        return Err(SnapshotError::Exists(path.to_path_buf()));
    }

    let json = serde_json::to_vec(ds)?;
    let gzip = wants_gzip(path);
    let payload = if gzip { compress(&json)? } else { json };

    let header = SnapshotHeader {
        version: SNAPSHOT_VERSION,
        flags: if gzip { FLAG_GZIP } else { 0 },
        payload_len: payload.len() as u64,
        crc64: CRC64.checksum(&payload),
        n_cells: ds.n_cells() as u64,
        n_genes: ds.n_genes() as u64,
    };

    let tmp = temp_sibling(path);
    let written = (|| -> Result<(), SnapshotError> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&header.encode())?;
        file.write_all(&payload)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    let placed = if overwrite {
        fs::rename(&tmp, path)
    } else {
        let placed = place_new(&tmp, path);
        let _ = fs::remove_file(&tmp);
        placed
    };
    match placed {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(SnapshotError::Exists(path.to_path_buf()));
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
    }

    debug!(
        path = %path.display(),
        payload_bytes = header.payload_len,
        gzip,
        "snapshot written"
    );
    Ok(header)
}

pub fn read_header(path: &Path) -> Result<SnapshotHeader, SnapshotError> {
    let mut file = fs::File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(SnapshotError::Truncated);
        }
        filled += n;
    }
    SnapshotHeader::decode(&buf)
}

/// Loads and verifies a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<(SnapshotHeader, Dataset), SnapshotError> {
    let bytes = fs::read(path)?;
    let header = SnapshotHeader::decode(&bytes)?;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(SnapshotError::LengthMismatch {
            expected: header.payload_len,
            found: payload.len() as u64,
        });
    }
    if CRC64.checksum(payload) != header.crc64 {
        return Err(SnapshotError::ChecksumMismatch);
    }
    let ds = if header.is_gzip() {
        serde_json::from_slice(&decompress(payload)?)?
    } else {
        serde_json::from_slice(payload)?
    };
    Ok((header, ds))
}

/// Puts `tmp` at `path` only if nothing is there yet. Filesystems without hard
/// links get an exclusive create plus copy instead.
fn place_new(tmp: &Path, path: &Path) -> std::io::Result<()> {
    match fs::hard_link(tmp, path) {
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::Unsupported | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            debug!(error = %e, "hard link unavailable, copying snapshot into place");
            copy_new(tmp, path)
        }
        other => other,
    }
}

fn copy_new(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut out = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)?;
    let copied = std::io::copy(&mut fs::File::open(src)?, &mut out).and_then(|_| out.sync_all());
    if copied.is_err() {
        // the target was created above, so removing it cannot clobber anything
        let _ = fs::remove_file(dst);
    }
    copied
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

#[cfg(feature = "gz")]
fn compress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

#[cfg(not(feature = "gz"))]
fn compress(_data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    Err(SnapshotError::GzipNotEnabled)
}

#[cfg(feature = "gz")]
fn decompress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(not(feature = "gz"))]
fn decompress(_data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    Err(SnapshotError::GzipNotEnabled)
}

#[cfg(test)]
#[path = "../../tests/src_inline/store/snapshot.rs"]
mod tests;
