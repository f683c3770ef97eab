use crate::error::{PixelCryptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Media family of a carrier file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierKind {
    /// Raster image, one unit per RGB channel byte
    Image,
    /// WAV audio, one unit per PCM sample byte
    Audio,
    /// Video container, carried by its audio track
    Video,
}

impl CarrierKind {
    /// Infer the carrier kind from a file extension
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| {
                PixelCryptError::UnsupportedCarrier(format!(
                    "cannot infer carrier kind of {} (no extension)",
                    path.display()
                ))
            })?;

        match ext.as_str() {
            "png" | "bmp" | "jpg" | "jpeg" => Ok(Self::Image),
            "wav" | "wave" => Ok(Self::Audio),
            "mp4" | "m4v" | "mov" => Ok(Self::Video),
            other => Err(PixelCryptError::UnsupportedCarrier(format!(
                "extension .{}",
                other
            ))),
        }
    }

    /// Extension of the file written by an encode. Images are always
    /// re-encoded losslessly as PNG.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Audio => "wav",
            Self::Video => "mp4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CarrierKind {
    type Err = PixelCryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "image" | "png" => Ok(Self::Image),
            "audio" | "wav" => Ok(Self::Audio),
            "video" | "mp4" => Ok(Self::Video),
            _ => Err(PixelCryptError::UnsupportedCarrier(format!("kind: {}", s))),
        }
    }
}

/// `<dir>/<stem>_encoded.<ext>` next to the input
pub fn default_output_path(input: &Path, kind: CarrierKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "carrier".to_string());
    let name = format!("{}_encoded.{}", stem, kind.output_extension());
    match input.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
