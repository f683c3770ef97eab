//! Encode and decode pipelines.
//!
//! ```text
//! encode: carrier bytes -> capacity check -> seal(secret) -> embed -> container bytes
//! decode: carrier file  -> hash -> ban check -> extract -> open -> registry update
//! ```
//!
//! Decode charges the quarantine registry for every failure to recover a
//! secret from a parseable carrier. Encode never touches the registry.

use crate::carrier::CarrierKind;
use crate::codec::{self, Access, AudioCarrier, Carrier, ImageCarrier, VideoCarrier};
use crate::config::Config;
use crate::envelope;
use crate::error::{PixelCryptError, Result};
use crate::quarantine::{content_hash, QuarantineRegistry, QuarantineState, MAX_ATTEMPTS};
use crate::transcode::{FfmpegTranscoder, Transcoder};
use fs2::FileExt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Orchestrates carriers, envelopes and the quarantine registry
#[derive(Clone)]
pub struct Vault {
    registry: QuarantineRegistry,
    transcoder: Arc<dyn Transcoder>,
    work_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("registry", &self.registry)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Vault {
    pub fn new(registry: QuarantineRegistry, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            registry,
            transcoder,
            work_dir: None,
        }
    }

    /// Build a vault from validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let registry = QuarantineRegistry::open(&config.registry_path)?;
        let transcoder = FfmpegTranscoder::new(config.ffmpeg.clone(), config.ffprobe.clone());
        let vault = Self::new(registry, Arc::new(transcoder));
        Ok(match &config.work_dir {
            Some(dir) => vault.with_work_dir(dir),
            None => vault,
        })
    }

    /// Root for video scratch directories
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &QuarantineRegistry {
        &self.registry
    }

    fn load(&self, data: &[u8], kind: CarrierKind, access: Access) -> Result<Box<dyn Carrier>> {
        Ok(match kind {
            CarrierKind::Image => Box::new(ImageCarrier::from_bytes(data)?),
            CarrierKind::Audio => Box::new(AudioCarrier::from_bytes(data)?),
            CarrierKind::Video => Box::new(VideoCarrier::from_bytes(
                data,
                Arc::clone(&self.transcoder),
                self.work_dir.as_deref(),
                access,
            )?),
        })
    }

    /// Largest envelope, in bytes, the carrier can hold
    #[instrument(skip_all, fields(kind = %kind))]
    pub fn capacity(&self, data: &[u8], kind: CarrierKind) -> Result<usize> {
        let carrier = self.load(data, kind, Access::Embed)?;
        let units = carrier.units().len();
        let capacity = codec::capacity_bytes(units);
        debug!(units, capacity, "measured carrier");
        Ok(capacity)
    }

    /// Seal `secret` for `public_key_pem` and hide it in the carrier.
    ///
    /// Returns the re-encoded container: PNG for images, WAV for audio and
    /// MP4 for video.
    #[instrument(skip_all, fields(kind = %kind, payload_size = secret.len()))]
    pub fn encode(
        &self,
        data: &[u8],
        kind: CarrierKind,
        public_key_pem: &[u8],
        secret: &[u8],
    ) -> Result<Vec<u8>> {
        if secret.is_empty() {
            return Err(PixelCryptError::SecretRequired);
        }
        let recipient = envelope::parse_public_key(public_key_pem)?;

        let mut carrier = self.load(data, kind, Access::Embed)?;
        let capacity = codec::capacity_bytes(carrier.units().len());
        let needed = envelope::sealed_len(secret.len());
        if needed > capacity {
            return Err(PixelCryptError::CapacityExceeded {
                payload_size: needed,
                capacity,
            });
        }

        let sealed = envelope::seal_for(secret, &recipient)?;
        codec::embed(carrier.units_mut(), &sealed)?;
        let encoded = carrier.into_bytes()?;

        info!(envelope = sealed.len(), capacity, "secret embedded");
        Ok(encoded)
    }

    /// Recover the secret hidden in the carrier file at `path`.
    ///
    /// Fails fast with `QuarantineBanned` for a banned carrier. Otherwise a
    /// failure to find or open an envelope, or an envelope holding nothing,
    /// is recorded against the carrier's hash: `WrongKey` while attempts remain, `AttemptsExhausted` when this
    /// failure triggers the ban, which also scrambles the file at `path`.
    /// A container that cannot be parsed at all is not charged.
    #[instrument(skip_all, fields(path = %path.display(), kind = %kind))]
    pub fn decode(&self, path: &Path, kind: CarrierKind, private_key_pem: &[u8]) -> Result<Vec<u8>> {
        let data = read_shared(path)?;
        let hash = content_hash(&data);

        if self.registry.is_banned(&hash)? {
            warn!(hash = %hash, "rejecting banned carrier");
            return Err(PixelCryptError::QuarantineBanned);
        }

        let carrier = self.load(&data, kind, Access::Extract)?;
        let opened = match codec::extract(carrier.units()) {
            Some(sealed) => envelope::open(&sealed, private_key_pem).and_then(|secret| {
                if secret.is_empty() {
                    Err(PixelCryptError::Format("envelope holds an empty secret".into()))
                } else {
                    Ok(secret)
                }
            }),
            None => Err(PixelCryptError::Format("no intact payload in carrier".into())),
        };
        drop(carrier);

        match opened {
            Ok(secret) => {
                self.registry.record_success(&hash)?;
                info!(hash = %hash, "secret recovered");
                Ok(secret)
            }
            Err(e) if e.consumes_attempt() => {
                debug!(hash = %hash, error = %e, "decode failed");
                let outcome = self.registry.record_failure(&hash, path)?;
                Err(if outcome.newly_banned {
                    PixelCryptError::AttemptsExhausted
                } else if outcome.banned {
                    PixelCryptError::QuarantineBanned
                } else {
                    PixelCryptError::WrongKey {
                        remaining: MAX_ATTEMPTS - outcome.attempts,
                    }
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Quarantine state of the carrier file at `path`
    pub fn status(&self, path: &Path) -> Result<(String, QuarantineState)> {
        let hash = content_hash(&read_shared(path)?);
        let state = self.registry.state(&hash)?;
        Ok((hash, state))
    }
}

/// Snapshot a file under a shared lock so it cannot be scrambled mid-read
fn read_shared(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    FileExt::lock_shared(&file)?;
    let mut data = Vec::new();
    let read = file.read_to_end(&mut data);
    FileExt::unlock(&file)?;
    read?;
    Ok(data)
}
