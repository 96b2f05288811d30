use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Canonical PCM WAV header length.
pub const HEADER_LEN: usize = 44;

/// Only 16-bit PCM is produced.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Maximum PCM data bytes per file (~3.63 GB, safely below u32::MAX).
/// The recorder stops cleanly before the data size field can overflow.
pub const MAX_DATA_BYTES: u64 = 3_900_000_000;

/// Write the 44-byte canonical header with provisional size fields.
///
/// Must run before any data bytes, exactly once per session. The size fields
/// (offsets 4 and 40) carry the zero-data values until [`finalize`] patches
/// them.
///
/// Header layout (44 bytes, little-endian):
///   0  "RIFF"
///   4  u32 chunk_size (data_bytes + 36; provisional 36)
///   8  "WAVE"
///  12  "fmt "
///  16  u32 16
///  20  u16 1 (PCM), u16 channels
///  24  u32 sample_rate, u32 byte_rate
///  32  u16 block_align, u16 16 (bits_per_sample)
///  36  "data"
///  40  u32 data_size (provisional 0)
///  44  ... PCM data ...
pub fn write_header<W: Write>(w: &mut W, channels: u16, sample_rate: u32) -> io::Result<()> {
    let byte_rate = sample_rate * channels as u32 * 2; // i16 = 2 bytes
    let block_align = channels * 2;

    w.write_all(b"RIFF")?;
    w.write_all(&36u32.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&0u32.to_le_bytes())?;
    Ok(())
}

/// Patch the two header size fields in place once the total data length is
/// known. Idempotent for a given `data_size`; a zero `data_size` rewrites the
/// provisional values the header was created with.
pub fn finalize(path: &Path, data_size: u32) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).open(path)?;
    f.seek(SeekFrom::Start(4))?;
    f.write_all(&data_size.saturating_add(36).to_le_bytes())?;
    f.seek(SeekFrom::Start(40))?;
    f.write_all(&data_size.to_le_bytes())?;
    Ok(())
}

/// Format and size information read back from a produced file's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub channels: u16,
    pub sample_rate: u32,
    /// Value of the data chunk size field (0 = never finalized)
    pub data_len: u32,
}

/// Read the canonical header of a produced file, e.g. when auditing a session
/// that was interrupted before finalize.
pub fn read_header(path: &Path) -> io::Result<HeaderInfo> {
    let mut f = File::open(path)?;
    let mut header = [0u8; HEADER_LEN];
    f.read_exact(&mut header)?;

    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a RIFF/WAVE file",
        ));
    }

    let channels = u16::from_le_bytes([header[22], header[23]]);
    let sample_rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
    let data_len = u32::from_le_bytes([header[40], header[41], header[42], header[43]]);
    Ok(HeaderInfo {
        channels,
        sample_rate,
        data_len,
    })
}

/// True when the file's data size field holds a non-zero (finalized) value.
/// A provisional header means the session was interrupted before finalize.
pub fn is_finalized(path: &Path) -> bool {
    match read_header(path) {
        Ok(info) => info.data_len != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn header_bytes(channels: u16, sample_rate: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_header(&mut buf, channels, sample_rate).unwrap();
        buf
    }

    // ── Header layout ──

    #[test]
    fn header_is_44_bytes_with_provisional_sizes() {
        let h = header_bytes(2, 44_100);
        assert_eq!(h.len(), HEADER_LEN);

        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([h[4], h[5], h[6], h[7]]), 36);
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes([h[16], h[17], h[18], h[19]]), 16);
        assert_eq!(u16::from_le_bytes([h[20], h[21]]), 1); // PCM
        assert_eq!(u16::from_le_bytes([h[22], h[23]]), 2);
        assert_eq!(u32::from_le_bytes([h[24], h[25], h[26], h[27]]), 44_100);
        // byte_rate = rate * channels * 2
        assert_eq!(u32::from_le_bytes([h[28], h[29], h[30], h[31]]), 176_400);
        // block_align = channels * 2
        assert_eq!(u16::from_le_bytes([h[32], h[33]]), 4);
        assert_eq!(u16::from_le_bytes([h[34], h[35]]), 16);
        assert_eq!(&h[36..40], b"data");
        assert_eq!(u32::from_le_bytes([h[40], h[41], h[42], h[43]]), 0);
    }

    #[test]
    fn header_mono_8k() {
        let h = header_bytes(1, 8_000);
        assert_eq!(u16::from_le_bytes([h[22], h[23]]), 1);
        assert_eq!(u32::from_le_bytes([h[28], h[29], h[30], h[31]]), 16_000);
        assert_eq!(u16::from_le_bytes([h[32], h[33]]), 2);
    }

    // ── Finalize ──

    #[test]
    fn finalize_patches_only_size_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let mut contents = header_bytes(2, 44_100);
        contents.extend_from_slice(&[0xAB; 100]);
        fs::write(&path, &contents).unwrap();

        finalize(&path, 100).unwrap();

        let patched = fs::read(&path).unwrap();
        assert_eq!(patched.len(), contents.len());
        assert_eq!(
            u32::from_le_bytes([patched[4], patched[5], patched[6], patched[7]]),
            136
        );
        assert_eq!(
            u32::from_le_bytes([patched[40], patched[41], patched[42], patched[43]]),
            100
        );
        // Everything outside the two size fields is untouched
        assert_eq!(&patched[0..4], &contents[0..4]);
        assert_eq!(&patched[8..40], &contents[8..40]);
        assert_eq!(&patched[44..], &contents[44..]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        fs::write(&path, header_bytes(1, 22_050)).unwrap();

        finalize(&path, 512).unwrap();
        let first = fs::read(&path).unwrap();
        finalize(&path, 512).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn finalize_zero_restores_provisional_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let before = header_bytes(2, 48_000);
        fs::write(&path, &before).unwrap();

        finalize(&path, 0).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    // ── Read-back ──

    #[test]
    fn read_header_reports_format_and_finalize_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        fs::write(&path, header_bytes(2, 44_100)).unwrap();

        let info = read_header(&path).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.data_len, 0);
        assert!(!is_finalized(&path));

        finalize(&path, 1234).unwrap();
        assert_eq!(read_header(&path).unwrap().data_len, 1234);
        assert!(is_finalized(&path));
    }

    #[test]
    fn read_header_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        fs::write(&path, [0u8; 64]).unwrap();
        assert!(read_header(&path).is_err());
        assert!(!is_finalized(&path));
    }
}
