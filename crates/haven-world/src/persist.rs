//! Save/restore envelope for resumable placement state.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"HVNS"` |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | N | `postcard` encoding of the object |
//!
//! Only an object's own fields are stored. Collaborators (height source,
//! chunk loader) and derived caches are skipped and must be restored with
//! the object's `attach` method after [`Persistent::from_bytes`].

use std::path::Path;

use haven_math::{AabbList, SquareSpiral, TerrainHeightLinReg};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Magic bytes identifying a haven state blob.
const MAGIC: [u8; 4] = *b"HVNS";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

/// Errors that can occur while saving or restoring state.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    /// The data is shorter than the header.
    #[error("data truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// The body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
    /// I/O error reading or writing a state file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Objects that can be written to and read back from the haven state format.
pub trait Persistent: Serialize + DeserializeOwned {
    /// Encode `self` with header.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Codec`] if the object cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let body = postcard::to_allocvec(self).map_err(|e| PersistError::Codec(e.to_string()))?;
        let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode an object written by [`to_bytes`](Self::to_bytes).
    ///
    /// The result is detached: collaborator references are empty until the
    /// type's `attach` method is called.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on a bad header or an undecodable body.
    fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() < HEADER_LEN {
            return Err(PersistError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(PersistError::InvalidMagic);
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }
        postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| PersistError::Codec(e.to_string()))
    }

    /// Write [`to_bytes`](Self::to_bytes) output to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on encode or I/O failure.
    fn save_to(&self, path: &Path) -> Result<(), PersistError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read an object saved with [`save_to`](Self::save_to).
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on I/O or decode failure.
    fn load_from(path: &Path) -> Result<Self, PersistError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl Persistent for AabbList {}
impl Persistent for SquareSpiral {}
impl Persistent for TerrainHeightLinReg {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use haven_math::Vec3i;

    #[test]
    fn test_region_set_survives_round_trip() {
        let points = (0..4).flat_map(|x| (0..3).map(move |z| Vec3i::new(x, 0, z)));
        let list = AabbList::new(points);
        let bytes = list.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"HVNS");
        let back = AabbList::from_bytes(&bytes).unwrap();
        assert_eq!(back, list);
        assert!(back.contains(Vec3i::new(3, 0, 2)));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = SquareSpiral::at(12).to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            SquareSpiral::from_bytes(&bytes),
            Err(PersistError::InvalidMagic)
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = SquareSpiral::at(12).to_bytes().unwrap();
        bytes[4] = FORMAT_VERSION + 1;
        assert!(matches!(
            SquareSpiral::from_bytes(&bytes),
            Err(PersistError::UnsupportedVersion(v)) if v == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            SquareSpiral::from_bytes(b"HVN"),
            Err(PersistError::Truncated { expected: 5, actual: 3 })
        ));
    }

    #[test]
    fn test_truncated_body_is_codec_error() {
        let mut reg = TerrainHeightLinReg::new();
        reg.add(1, 2, 3);
        let bytes = reg.to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            TerrainHeightLinReg::from_bytes(cut),
            Err(PersistError::Codec(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("spiral.bin");
        SquareSpiral::at(40).save_to(&path).unwrap();
        assert_eq!(SquareSpiral::load_from(&path).unwrap(), SquareSpiral::at(40));
    }
}
