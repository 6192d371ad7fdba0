//! Canonical 44-byte RIFF/WAVE headers for the recordings this crate writes.
//!
//! ```text
//! 0  "RIFF"  4  riff size (file - 8)  8  "WAVE"
//! 12 "fmt "  16 16  20 format  22 channels  24 rate  28 byte rate  32 align  34 bits
//! 36 "data"  40 data size
//! ```

pub const WAV_HEADER_SIZE: usize = 44;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;

/// WAVE `fmt ` format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavEncoding {
    Pcm,
    IeeeFloat,
}

impl WavEncoding {
    /// 32-bit samples are stored as float, every other depth as integer PCM.
    pub fn for_bit_depth(bit_depth: u16) -> Self {
        if bit_depth == 32 {
            Self::IeeeFloat
        } else {
            Self::Pcm
        }
    }

    fn code(self) -> u16 {
        match self {
            Self::Pcm => 1,
            Self::IeeeFloat => 3,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Pcm),
            3 => Some(Self::IeeeFloat),
            _ => None,
        }
    }
}

/// Sample layout described by a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub encoding: WavEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl WavSpec {
    pub fn new(sample_rate: u32, channels: u16, bit_depth: u16) -> Self {
        Self {
            encoding: WavEncoding::for_bit_depth(bit_depth),
            sample_rate,
            channels,
            bit_depth,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bit_depth / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Header for `data_size` payload bytes.
    pub fn header(&self, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
        let mut header = [0u8; WAV_HEADER_SIZE];
        let mut put = |at: usize, bytes: &[u8]| header[at..at + bytes.len()].copy_from_slice(bytes);

        put(0, b"RIFF");
        put(RIFF_SIZE_OFFSET, &(36 + data_size).to_le_bytes());
        put(8, b"WAVE");
        put(12, b"fmt ");
        put(16, &16u32.to_le_bytes());
        put(20, &self.encoding.code().to_le_bytes());
        put(22, &self.channels.to_le_bytes());
        put(24, &self.sample_rate.to_le_bytes());
        put(28, &self.byte_rate().to_le_bytes());
        put(32, &self.block_align().to_le_bytes());
        put(34, &self.bit_depth.to_le_bytes());
        put(36, b"data");
        put(DATA_SIZE_OFFSET, &data_size.to_le_bytes());

        header
    }
}

/// A parsed canonical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub spec: WavSpec,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse a header laid out like [`WavSpec::header`] writes it.
    /// Headers with extra chunks or unknown format codes yield `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < WAV_HEADER_SIZE
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Some(Self {
            spec: WavSpec {
                encoding: WavEncoding::from_code(u16_at(20))?,
                channels: u16_at(22),
                sample_rate: u32_at(24),
                bit_depth: u16_at(34),
            },
            data_size: u32_at(DATA_SIZE_OFFSET),
        })
    }
}

/// Offset/value pairs that finalize a header once the payload length is known.
pub fn size_patches(data_size: u64) -> [(u64, [u8; 4]); 2] {
    let data = data_size.min(u32::MAX as u64 - 36) as u32;
    [
        (RIFF_SIZE_OFFSET as u64, (36 + data).to_le_bytes()),
        (DATA_SIZE_OFFSET as u64, data.to_le_bytes()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_for_16khz_mono() {
        let spec = WavSpec::new(16000, 1, 16);
        assert_eq!(spec.block_align(), 2);
        assert_eq!(spec.byte_rate(), 32000);

        let header = spec.header(3200);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes([header[28], header[29], header[30], header[31]]), 32000);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 36 + 3200);
    }

    #[test]
    fn float_depth_is_tagged_as_float() {
        assert_eq!(WavSpec::new(16000, 1, 32).encoding, WavEncoding::IeeeFloat);
        assert_eq!(WavSpec::new(16000, 1, 8).encoding, WavEncoding::Pcm);

        let header = WavSpec::new(16000, 1, 32).header(0);
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 3);
    }

    #[test]
    fn parse_reads_back_written_header() {
        let spec = WavSpec::new(24000, 2, 16);
        assert_eq!(WavHeader::parse(&spec.header(96)), Some(WavHeader { spec, data_size: 96 }));
        assert_eq!(WavHeader::parse(b"RIFF"), None);

        let mut alaw = spec.header(0);
        alaw[20] = 6;
        assert_eq!(WavHeader::parse(&alaw), None);
    }

    #[test]
    fn size_patches_finalize_placeholder_header() {
        let mut header = WavSpec::new(48000, 2, 16).header(0);
        for (offset, bytes) in size_patches(19200) {
            let at = offset as usize;
            header[at..at + 4].copy_from_slice(&bytes);
        }

        let parsed = WavHeader::parse(&header).unwrap();
        assert_eq!(parsed.data_size, 19200);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 19200 + 36);
    }
}
