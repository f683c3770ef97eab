use crate::codec::Carrier;
use crate::error::{PixelCryptError, Result};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Still-image carrier.
///
/// Pixels are normalised to 8-bit RGB; units are the channel bytes in
/// row-major, channel-minor order (`R0 G0 B0 R1 G1 B1 ...`).
#[derive(Debug, Clone)]
pub struct ImageCarrier {
    width: u32,
    height: u32,
    units: Vec<u8>,
}

impl ImageCarrier {
    /// Decode any supported raster container
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(data)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            width,
            height,
            units: rgb.into_raw(),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode as PNG, the only lossless output that keeps every low bit
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let rgb = RgbImage::from_raw(self.width, self.height, self.units.clone()).ok_or_else(
            || PixelCryptError::Format("pixel buffer does not match image dimensions".into()),
        )?;
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

impl Carrier for ImageCarrier {
    fn units(&self) -> &[u8] {
        &self.units
    }

    fn units_mut(&mut self) -> &mut [u8] {
        &mut self.units
    }

    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>> {
        self.to_png()
    }
}
