//! Narrow contract with the external audio/video transcoding tool.
//!
//! The video carrier never parses containers itself. It asks a
//! [`Transcoder`] to probe for an audio track, dump that track as headerless
//! PCM, synthesise silence, and remux a new lossless audio track next to the
//! untouched video stream. [`FfmpegTranscoder`] implements the contract by
//! running `ffprobe`/`ffmpeg` as blocking subprocesses.

use crate::error::{PixelCryptError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Headerless PCM layout exchanged with the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample; samples are signed little-endian
    pub sample_width: u16,
}

impl PcmFormat {
    /// Signed 16-bit little-endian stereo at 44.1 kHz
    pub const CD: Self = Self {
        sample_rate: 44_100,
        channels: 2,
        sample_width: 2,
    };

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * self.sample_width as usize
    }

    /// Byte length of `seconds` of audio, rounded down to whole frames
    pub fn byte_len(&self, seconds: f64) -> usize {
        let frame = self.channels as usize * self.sample_width as usize;
        let frames = (seconds.max(0.0) * self.sample_rate as f64).floor() as usize;
        frames * frame
    }

    fn ffmpeg_codec(&self) -> &'static str {
        match self.sample_width {
            1 => "pcm_u8",
            3 => "pcm_s24le",
            4 => "pcm_s32le",
            _ => "pcm_s16le",
        }
    }

    fn ffmpeg_format(&self) -> &'static str {
        match self.sample_width {
            1 => "u8",
            3 => "s24le",
            4 => "s32le",
            _ => "s16le",
        }
    }
}

/// Operations the video carrier needs from an external transcoder.
///
/// Every call is a single blocking operation: it either completes and leaves
/// its output file fully written, or fails with `ExternalToolFailure`.
pub trait Transcoder: Send + Sync {
    /// PCM layout produced by [`Transcoder::extract_pcm`] and
    /// [`Transcoder::synthesize_silence`], and accepted by [`Transcoder::remux`]
    fn pcm_format(&self) -> PcmFormat;

    fn has_audio(&self, container: &Path) -> Result<bool>;

    /// Container duration in seconds
    fn duration(&self, container: &Path) -> Result<f64>;

    /// Write the first audio track of `container` to `out` as headerless PCM
    fn extract_pcm(&self, container: &Path, out: &Path) -> Result<()>;

    /// Write `seconds` of silent headerless PCM to `out`
    fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<()>;

    /// Copy the first video stream of `video` unchanged, add `pcm` as a
    /// lossless audio stream, drop all container metadata, write to `out`
    fn remux(&self, video: &Path, pcm: &Path, out: &Path) -> Result<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` and `ffprobe` executables
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    format: PcmFormat,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            format: PcmFormat::CD,
        }
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y"]);
        cmd
    }

    fn ffprobe(&self) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error"]);
        cmd
    }

    fn pcm_args(&self) -> [String; 6] {
        [
            "-f".into(),
            self.format.ffmpeg_format().into(),
            "-ar".into(),
            self.format.sample_rate.to_string(),
            "-ac".into(),
            self.format.channels.to_string(),
        ]
    }
}

impl Transcoder for FfmpegTranscoder {
    fn pcm_format(&self) -> PcmFormat {
        self.format
    }

    fn has_audio(&self, container: &Path) -> Result<bool> {
        let mut cmd = self.ffprobe();
        cmd.args([
            "-select_streams",
            "a",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "csv=p=0",
        ])
        .arg(container);
        let output = run(cmd)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|line| line.trim() == "audio"))
    }

    fn duration(&self, container: &Path) -> Result<f64> {
        let mut cmd = self.ffprobe();
        cmd.args([
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(container);
        let output = run(cmd)?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse::<f64>().map_err(|_| {
            PixelCryptError::ExternalToolFailure(format!(
                "ffprobe reported an unreadable duration: {:?}",
                text.trim()
            ))
        })
    }

    fn extract_pcm(&self, container: &Path, out: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(container)
            .args(["-vn", "-map", "0:a:0", "-acodec", self.format.ffmpeg_codec()])
            .args(self.pcm_args())
            .arg(out);
        run(cmd).map(|_| ())
    }

    fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<()> {
        let layout = if self.format.channels == 1 { "mono" } else { "stereo" };
        let source = format!("anullsrc=r={}:cl={}", self.format.sample_rate, layout);
        let mut cmd = self.ffmpeg();
        cmd.args(["-f", "lavfi", "-i"])
            .arg(source)
            .arg("-t")
            .arg(format!("{:.6}", seconds))
            .args(["-acodec", self.format.ffmpeg_codec()])
            .args(self.pcm_args())
            .arg(out);
        run(cmd).map(|_| ())
    }

    fn remux(&self, video: &Path, pcm: &Path, out: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .args(self.pcm_args())
            .arg("-i")
            .arg(pcm)
            .args(["-map", "0:v:0", "-map", "1:a:0"])
            .args(["-c:v", "copy", "-c:a", "alac"])
            // strip authoring metadata and chapters, no encoder tag
            .args(["-map_metadata", "-1", "-map_chapters", "-1"])
            .args(["-fflags", "+bitexact", "-f", "mp4"])
            .arg(out);
        run(cmd).map(|_| ())
    }
}

fn run(mut cmd: Command) -> Result<Output> {
    cmd.stdin(Stdio::null());
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(program = %program, args = ?cmd.get_args().collect::<Vec<_>>(), "running transcoder");

    let output = cmd.output().map_err(|e| {
        PixelCryptError::ExternalToolFailure(format!("failed to launch {}: {}", program, e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("no diagnostic output").trim();
        return Err(PixelCryptError::ExternalToolFailure(format!(
            "{} exited with {}: {}",
            program, output.status, detail
        )));
    }

    Ok(output)
}
