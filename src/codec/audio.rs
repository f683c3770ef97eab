use crate::codec::Carrier;
use crate::error::{PixelCryptError, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use std::io::Cursor;

/// Layout of one PCM sample as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleLayout {
    /// Unsigned 8-bit, offset binary
    U8,
    I16,
    I24,
    I32,
    F32,
}

impl SampleLayout {
    fn from_spec(spec: &WavSpec) -> Result<Self> {
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8) => Ok(Self::U8),
            (SampleFormat::Int, 16) => Ok(Self::I16),
            (SampleFormat::Int, 24) => Ok(Self::I24),
            (SampleFormat::Int, 32) => Ok(Self::I32),
            (SampleFormat::Float, 32) => Ok(Self::F32),
            (format, bits) => Err(PixelCryptError::UnsupportedCarrier(format!(
                "{:?} PCM with {} bits per sample",
                format, bits
            ))),
        }
    }

    fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I24 => 3,
            Self::I32 | Self::F32 => 4,
        }
    }
}

/// WAV audio carrier.
///
/// Units are the little-endian bytes of every sample, in file order, exactly
/// as they sit in the `data` chunk. Everything outside the sample bytes,
/// including metadata chunks, is written back untouched.
#[derive(Debug, Clone)]
pub struct AudioCarrier {
    spec: WavSpec,
    original: Vec<u8>,
    /// Offset of the first sample byte in `original`
    data_offset: usize,
    units: Vec<u8>,
}

impl AudioCarrier {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(data))?;
        let spec = reader.spec();
        let layout = SampleLayout::from_spec(&spec)?;
        let byte_len = reader.len() as usize * layout.width();

        // the header parse stops at the start of the data chunk
        let data_offset = reader.into_inner().position() as usize;
        let units = data
            .get(data_offset..data_offset + byte_len)
            .ok_or_else(|| PixelCryptError::Format("WAV data chunk is truncated".into()))?
            .to_vec();

        Ok(Self {
            spec,
            original: data.to_vec(),
            data_offset,
            units,
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn to_wav(&self) -> Vec<u8> {
        let mut out = self.original.clone();
        out[self.data_offset..self.data_offset + self.units.len()].copy_from_slice(&self.units);
        out
    }
}

impl Carrier for AudioCarrier {
    fn units(&self) -> &[u8] {
        &self.units
    }

    fn units_mut(&mut self) -> &mut [u8] {
        &mut self.units
    }

    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(self.to_wav())
    }
}
