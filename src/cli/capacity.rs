use crate::carrier::CarrierKind;
use crate::envelope::MIN_ENVELOPE_LEN;
use crate::error::Result;
use crate::vault::Vault;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Carrier capacity as reported by the capacity command
#[derive(Debug, Clone, Serialize)]
pub struct CapacityReport {
    pub path: PathBuf,
    pub kind: CarrierKind,
    /// Largest framed payload, envelope overhead included
    pub capacity_bytes: usize,
    /// Largest secret that still fits once sealed
    pub max_secret_bytes: usize,
}

impl fmt::Display for CapacityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Carrier: {} ({})", self.path.display(), self.kind)?;
        writeln!(f, "Capacity: {} bytes", self.capacity_bytes)?;
        writeln!(
            f,
            "Max secret: {} bytes ({} bytes envelope overhead)",
            self.max_secret_bytes, MIN_ENVELOPE_LEN
        )
    }
}

/// Measure how much the carrier at `input` can hold
pub fn show_capacity(vault: &Vault, input: &Path, kind: Option<CarrierKind>) -> Result<CapacityReport> {
    let kind = match kind {
        Some(kind) => kind,
        None => CarrierKind::detect(input)?,
    };
    let data = std::fs::read(input)?;
    let capacity_bytes = vault.capacity(&data, kind)?;

    Ok(CapacityReport {
        path: input.to_path_buf(),
        kind,
        capacity_bytes,
        max_secret_bytes: capacity_bytes.saturating_sub(MIN_ENVELOPE_LEN),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quarantine::QuarantineRegistry;
    use crate::transcode::FfmpegTranscoder;
    use image::{ImageFormat, RgbImage};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_capacity_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.png");
        RgbImage::new(100, 100)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let vault = Vault::new(
            QuarantineRegistry::open_in_memory().unwrap(),
            Arc::new(FfmpegTranscoder::default()),
        );
        let report = show_capacity(&vault, &path, None).unwrap();
        assert_eq!(report.kind, CarrierKind::Image);
        assert_eq!(report.capacity_bytes, 3746);
        assert_eq!(report.max_secret_bytes, 3458);
        assert!(report.to_string().contains("Capacity: 3746 bytes"));
    }

    #[test]
    fn test_tiny_carrier_has_no_room_for_envelope() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("icon.png");
        RgbImage::new(8, 8)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let vault = Vault::new(
            QuarantineRegistry::open_in_memory().unwrap(),
            Arc::new(FfmpegTranscoder::default()),
        );
        let report = show_capacity(&vault, &path, Some(CarrierKind::Image)).unwrap();
        // 192 units
        assert_eq!(report.capacity_bytes, 20);
        assert_eq!(report.max_secret_bytes, 0);
    }
}
