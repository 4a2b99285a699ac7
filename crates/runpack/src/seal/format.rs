//! Seal trailer format
//!
//! Defines the fixed-size trailer that marks a sealed executable.
//!
//! ```text
//! ┌─────────────────────────┐
//! │  executable (unchanged) │  ← base bytes
//! ├─────────────────────────┤
//! │  Payload                │  ← tar.gz of the sealed directory
//! ├─────────────────────────┤
//! │  Magic                  │  ← b"RUNPACKSEALv1\n"
//! │  Payload length         │  ← u64, little-endian
//! └─────────────────────────┘
//! ```
//!
//! Readers locate the trailer by reading exactly `TRAILER_SIZE` bytes from the
//! end of the file.

use std::io::{self, Write};

use super::SealError;

/// Magic bytes identifying a seal trailer.
pub const SEAL_MAGIC: [u8; 14] = *b"RUNPACKSEALv1\n";

/// Size of the seal trailer in bytes.
pub const TRAILER_SIZE: usize = SEAL_MAGIC.len() + 8;

/// Fixed-size trailer at the very end of a sealed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealTrailer {
    /// Length of the payload that immediately precedes the trailer.
    pub payload_len: u64,
}

/// Location of a payload inside a sealed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealInfo {
    /// Byte offset of the payload from the start of the file.
    ///
    /// This equals the size of the unsealed base executable.
    pub payload_offset: u64,

    /// Size of the payload in bytes.
    pub payload_len: u64,
}

impl SealTrailer {
    pub fn new(payload_len: u64) -> Self {
        Self { payload_len }
    }

    /// Read a trailer from raw bytes (must be exactly `TRAILER_SIZE` bytes).
    ///
    /// Returns `None` when the magic does not match; that is the normal
    /// answer for an unsealed file.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TRAILER_SIZE || bytes[..SEAL_MAGIC.len()] != SEAL_MAGIC {
            return None;
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[SEAL_MAGIC.len()..]);
        Some(Self {
            payload_len: u64::from_le_bytes(len),
        })
    }

    /// Encode the trailer.
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut bytes = [0u8; TRAILER_SIZE];
        bytes[..SEAL_MAGIC.len()].copy_from_slice(&SEAL_MAGIC);
        bytes[SEAL_MAGIC.len()..].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    /// Write the trailer to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Validate the trailer against the size of the file it was read from.
    pub fn locate(&self, file_size: u64) -> Result<SealInfo, SealError> {
        let available = file_size.saturating_sub(TRAILER_SIZE as u64);
        if self.payload_len == 0 {
            return Err(SealError::CorruptTrailer(
                "payload length is zero".to_string(),
            ));
        }
        if self.payload_len > available {
            return Err(SealError::CorruptTrailer(format!(
                "payload length {} exceeds available {} bytes (file size {})",
                self.payload_len, available, file_size
            )));
        }
        Ok(SealInfo {
            payload_offset: available - self.payload_len,
            payload_len: self.payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_size() {
        assert_eq!(TRAILER_SIZE, 22);
    }

    #[test]
    fn test_trailer_layout_is_little_endian() {
        let bytes = SealTrailer::new(0x0102).to_bytes();
        assert_eq!(&bytes[..14], b"RUNPACKSEALv1\n");
        assert_eq!(&bytes[14..], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(SealTrailer::from_bytes(&bytes), Some(SealTrailer::new(0x0102)));
    }

    #[test]
    fn test_trailer_invalid_magic() {
        let mut bytes = SealTrailer::new(10).to_bytes();
        bytes[0] = b'X';
        assert!(SealTrailer::from_bytes(&bytes).is_none());
        assert!(SealTrailer::from_bytes(&[0u8; TRAILER_SIZE]).is_none());
        assert!(SealTrailer::from_bytes(b"short").is_none());
    }

    #[test]
    fn test_locate_payload() {
        let info = SealTrailer::new(100).locate(1000).unwrap();
        assert_eq!(info.payload_offset, 1000 - 22 - 100);
        assert_eq!(info.payload_len, 100);
    }

    #[test]
    fn test_locate_payload_filling_whole_file() {
        let info = SealTrailer::new(78).locate(100).unwrap();
        assert_eq!(info.payload_offset, 0);
    }

    #[test]
    fn test_locate_rejects_zero_length() {
        assert!(matches!(
            SealTrailer::new(0).locate(1000),
            Err(SealError::CorruptTrailer(_))
        ));
    }

    #[test]
    fn test_locate_rejects_oversized_payload() {
        assert!(matches!(
            SealTrailer::new(79).locate(100),
            Err(SealError::CorruptTrailer(_))
        ));
    }
}
