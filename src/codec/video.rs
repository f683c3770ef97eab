use crate::codec::Carrier;
use crate::error::Result;
use crate::transcode::Transcoder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// What the caller intends to do with a video carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Payload will be written; a silent track is synthesised when the
    /// container has no audio.
    Embed,
    /// Payload will only be read; a container without audio yields no units.
    Extract,
}

/// Video carrier adapter.
///
/// The container is snapshotted into a private scratch directory, its audio
/// track is dumped to headerless PCM and those PCM bytes become the carrier
/// units. On re-encode the original video stream is copied unchanged next to
/// a lossless rendition of the modified PCM, with container metadata removed.
///
/// Every intermediate file lives in the scratch directory, which is removed
/// when the carrier is dropped or consumed, on success and failure alike.
pub struct VideoCarrier {
    transcoder: Arc<dyn Transcoder>,
    scratch: TempDir,
    source: PathBuf,
    units: Vec<u8>,
}

impl VideoCarrier {
    pub fn from_bytes(
        data: &[u8],
        transcoder: Arc<dyn Transcoder>,
        work_dir: Option<&Path>,
        access: Access,
    ) -> Result<Self> {
        let scratch = scratch_dir(work_dir)?;
        let source = scratch.path().join("source.mp4");
        fs::write(&source, data)?;

        let track = scratch.path().join("track.pcm");
        if transcoder.has_audio(&source)? {
            transcoder.extract_pcm(&source, &track)?;
        } else if access == Access::Embed {
            let seconds = transcoder.duration(&source)?;
            info!(seconds, "video has no audio track, synthesising silence");
            transcoder.synthesize_silence(seconds, &track)?;
        } else {
            debug!("video has no audio track, nothing to extract");
            return Ok(Self {
                transcoder,
                scratch,
                source,
                units: Vec::new(),
            });
        }

        let units = fs::read(&track)?;
        fs::remove_file(&track)?;
        debug!(units = units.len(), "extracted working audio track");

        Ok(Self {
            transcoder,
            scratch,
            source,
            units,
        })
    }

    /// Scratch directory holding this carrier's intermediates
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

impl std::fmt::Debug for VideoCarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCarrier")
            .field("scratch", &self.scratch.path())
            .field("units", &self.units.len())
            .finish()
    }
}

impl Carrier for VideoCarrier {
    fn units(&self) -> &[u8] {
        &self.units
    }

    fn units_mut(&mut self) -> &mut [u8] {
        &mut self.units
    }

    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>> {
        let stego_track = self.scratch.path().join("stego.pcm");
        let remuxed = self.scratch.path().join("remuxed.mp4");

        fs::write(&stego_track, &self.units)?;
        self.transcoder.remux(&self.source, &stego_track, &remuxed)?;
        let bytes = fs::read(&remuxed)?;

        let Self { scratch, .. } = *self;
        scratch.close()?;
        Ok(bytes)
    }
}

fn scratch_dir(work_dir: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pixelcrypt-");
    let dir = match work_dir {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::{embed, extract};
    use crate::error::PixelCryptError;
    use crate::transcode::PcmFormat;
    use tempfile::tempdir;

    const MAGIC: &[u8; 8] = b"FAKEVID1";

    /// Stand-in container: magic, BE u32 video length, video bytes, PCM bytes.
    /// Metadata is a trailing `meta:` suffix on the video part and must be
    /// dropped by remux.
    pub(crate) struct FakeTranscoder;

    pub(crate) fn fake_container(video: &[u8], pcm: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&(video.len() as u32).to_be_bytes());
        out.extend_from_slice(video);
        out.extend_from_slice(pcm);
        out
    }

    fn split(container: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
        let data = fs::read(container)?;
        if data.len() < 12 || &data[..8] != MAGIC {
            return Err(PixelCryptError::ExternalToolFailure(
                "invalid data found when processing input".into(),
            ));
        }
        let len = u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;
        Ok((data[12..12 + len].to_vec(), data[12 + len..].to_vec()))
    }

    impl Transcoder for FakeTranscoder {
        fn pcm_format(&self) -> PcmFormat {
            PcmFormat::CD
        }

        fn has_audio(&self, container: &Path) -> Result<bool> {
            Ok(!split(container)?.1.is_empty())
        }

        fn duration(&self, container: &Path) -> Result<f64> {
            // a millisecond per video byte keeps the numbers small
            Ok(split(container)?.0.len() as f64 / 1000.0)
        }

        fn extract_pcm(&self, container: &Path, out: &Path) -> Result<()> {
            fs::write(out, split(container)?.1)?;
            Ok(())
        }

        fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<()> {
            fs::write(out, vec![0u8; PcmFormat::CD.byte_len(seconds)])?;
            Ok(())
        }

        fn remux(&self, video: &Path, pcm: &Path, out: &Path) -> Result<()> {
            let (stream, _) = split(video)?;
            let stream = match stream.windows(5).position(|w| w == b"meta:") {
                Some(at) => stream[..at].to_vec(),
                None => stream,
            };
            fs::write(out, fake_container(&stream, &fs::read(pcm)?))?;
            Ok(())
        }
    }

    /// Behaves like [`FakeTranscoder`] until the final remux, which fails
    struct FailingRemux;

    impl Transcoder for FailingRemux {
        fn pcm_format(&self) -> PcmFormat {
            FakeTranscoder.pcm_format()
        }

        fn has_audio(&self, container: &Path) -> Result<bool> {
            FakeTranscoder.has_audio(container)
        }

        fn duration(&self, container: &Path) -> Result<f64> {
            FakeTranscoder.duration(container)
        }

        fn extract_pcm(&self, container: &Path, out: &Path) -> Result<()> {
            FakeTranscoder.extract_pcm(container, out)
        }

        fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<()> {
            FakeTranscoder.synthesize_silence(seconds, out)
        }

        fn remux(&self, _video: &Path, _pcm: &Path, out: &Path) -> Result<()> {
            // leave a partial output behind, as an interrupted ffmpeg would
            fs::write(out, b"truncated")?;
            Err(PixelCryptError::ExternalToolFailure(
                "alac: encoder initialisation failed".into(),
            ))
        }
    }

    fn load(data: &[u8], work: &Path, access: Access) -> Result<VideoCarrier> {
        VideoCarrier::from_bytes(data, Arc::new(FakeTranscoder), Some(work), access)
    }

    #[test]
    fn test_embed_extract_through_audio_track() {
        let work = tempdir().unwrap();
        let pcm: Vec<u8> = (0..4000).map(|i| (i * 7 % 256) as u8).collect();
        let original = fake_container(b"h264-frames meta:author=alice", &pcm);

        let mut carrier = load(&original, work.path(), Access::Embed).unwrap();
        assert_eq!(carrier.units(), &pcm[..]);
        embed(carrier.units_mut(), b"video payload").unwrap();
        let encoded = Box::new(carrier).into_bytes().unwrap();

        let (stream, _) = {
            let path = work.path().join("check.mp4");
            fs::write(&path, &encoded).unwrap();
            let parts = split(&path).unwrap();
            fs::remove_file(&path).unwrap();
            parts
        };
        assert_eq!(stream, b"h264-frames ");

        let reread = load(&encoded, work.path(), Access::Extract).unwrap();
        assert_eq!(extract(reread.units()).unwrap(), b"video payload");
        drop(reread);

        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_silent_track_synthesised_for_embed() {
        let work = tempdir().unwrap();
        let silent = fake_container(&[0xEE; 100], &[]);

        let carrier = load(&silent, work.path(), Access::Embed).unwrap();
        assert_eq!(carrier.units().len(), PcmFormat::CD.byte_len(0.1));

        let reread = load(&silent, work.path(), Access::Extract).unwrap();
        assert!(reread.units().is_empty());
        assert!(extract(reread.units()).is_none());
    }

    #[test]
    fn test_scratch_removed_on_failure() {
        let work = tempdir().unwrap();
        let result = load(b"not a container", work.path(), Access::Extract);
        assert!(matches!(
            result,
            Err(PixelCryptError::ExternalToolFailure(_))
        ));
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_removed_when_remux_fails() {
        let work = tempdir().unwrap();
        let original = fake_container(b"h264-frames", &[0x10; 2000]);

        let mut carrier = VideoCarrier::from_bytes(
            &original,
            Arc::new(FailingRemux),
            Some(work.path()),
            Access::Embed,
        )
        .unwrap();
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 1);
        embed(carrier.units_mut(), b"never written").unwrap();

        let result = Box::new(carrier).into_bytes();
        assert!(matches!(
            result,
            Err(PixelCryptError::ExternalToolFailure(_))
        ));
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }
}
