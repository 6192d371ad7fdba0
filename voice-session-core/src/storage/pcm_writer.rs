use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::SessionError;
use crate::processing::wav_format::{self, WavSpec};

/// Streaming WAV file writer.
///
/// Protect with `Mutex` for cross-thread access.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes patched on close]
/// [raw little-endian PCM data...]
/// ```
pub struct PcmFileWriter {
    file_path: PathBuf,
    file: Option<File>,
    total_bytes_written: u64,
    is_open: bool,
}

impl PcmFileWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            total_bytes_written: 0,
            is_open: false,
        }
    }

    /// Create the file and write the initial 44-byte WAV header.
    pub fn open(&mut self, sample_rate: u32, bit_depth: u16, channels: u16) -> Result<(), SessionError> {
        if self.is_open {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::FileIoFailure(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| SessionError::FileIoFailure(format!("failed to create file: {}", e)))?;
        self.file = Some(file);

        let header = WavSpec::new(sample_rate, channels, bit_depth).header(0);
        self.write_raw(&header)?;
        self.is_open = true;
        Ok(())
    }

    /// Append PCM bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if !self.is_open {
            return Err(SessionError::FileIoFailure("file is not open for writing".into()));
        }
        self.write_raw(data)
    }

    /// Finalize the file: patch the WAV header sizes and return the SHA-256
    /// checksum of the completed file.
    pub fn close(&mut self) -> Result<String, SessionError> {
        if !self.is_open {
            return Err(SessionError::FileIoFailure("file is not open".into()));
        }
        let mut file = self
            .file
            .take()
            .ok_or_else(|| SessionError::FileIoFailure("file is not open".into()))?;
        self.is_open = false;

        for (offset, bytes) in wav_format::size_patches(self.data_bytes()) {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&bytes)?;
        }
        file.flush()?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    /// PCM payload bytes written so far.
    pub fn data_bytes(&self) -> u64 {
        self.total_bytes_written
            .saturating_sub(wav_format::WAV_HEADER_SIZE as u64)
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SessionError::FileIoFailure("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| SessionError::FileIoFailure(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, SessionError> {
    let data = fs::read(path)
        .map_err(|e| SessionError::FileIoFailure(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format::WavHeader;

    #[test]
    fn write_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.wav");

        let mut writer = PcmFileWriter::new(path.clone());
        writer.open(16000, 16, 1).unwrap();
        writer.write(&[0u8; 32]).unwrap();
        writer.write(&[1u8; 32]).unwrap();
        assert_eq!(writer.data_bytes(), 64);

        let checksum = writer.close().unwrap();
        assert_eq!(checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 64);
        let header = WavHeader::parse(&file_data).unwrap();
        assert_eq!(header.data_size, 64);
        assert_eq!(header.spec.sample_rate, 16000);
        let chunk_size = u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]);
        assert_eq!(chunk_size, 36 + 64);
    }

    #[test]
    fn checksum_matches_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sum.wav");

        let mut writer = PcmFileWriter::new(path.clone());
        writer.open(8000, 8, 1).unwrap();
        writer.write(&[128u8; 10]).unwrap();
        let checksum = writer.close().unwrap();

        assert_eq!(checksum, sha256_file(&path).unwrap());
    }

    #[test]
    fn write_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PcmFileWriter::new(dir.path().join("closed.wav"));
        assert!(matches!(writer.write(&[0u8; 2]), Err(SessionError::FileIoFailure(_))));
        assert!(writer.close().is_err());
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("a.wav");
        let mut writer = PcmFileWriter::new(path.clone());
        writer.open(16000, 16, 1).unwrap();
        writer.close().unwrap();
        assert!(path.exists());
    }
}
