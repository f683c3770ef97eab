//! PixelCrypt - steganographic vault with destructive brute-force protection
//!
//! A secret is sealed in an RSA/AES hybrid envelope and hidden in the least
//! significant bits of an ordinary image, WAV file or video soundtrack. Only
//! the holder of the matching private key can recover it. Each carrier file,
//! identified by the SHA-256 of its bytes, tolerates a limited number of
//! failed decodes; after that its hash is banned and the file is scrambled
//! in place.
//!
//! ## Pipelines
//!
//! ```text
//! Encode: carrier -> capacity check -> seal (RSA-OAEP + AES-EAX) -> LSB embed -> PNG / WAV / MP4
//! Decode: carrier -> hash -> ban check -> LSB extract -> open -> quarantine update
//! ```
//!
//! - **Codec**: 4-byte big-endian length prefix, then payload, one bit per
//!   carrier unit, MSB first
//! - **Envelope**: `[wrapped key 256][nonce 16][tag 16][ciphertext]`
//! - **Quarantine**: SQLite-backed failure counter, shared by every process
//!   using the same database
//!
//! ## Example
//!
//! ```no_run
//! use pixelcrypt::{CarrierKind, QuarantineRegistry, Vault, FfmpegTranscoder};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let registry = QuarantineRegistry::open(Path::new("security_registry.db")).unwrap();
//! let vault = Vault::new(registry, Arc::new(FfmpegTranscoder::default()));
//!
//! let keys = pixelcrypt::envelope::generate_keypair().unwrap();
//! let cover = std::fs::read("cover.png").unwrap();
//! let encoded = vault
//!     .encode(&cover, CarrierKind::Image, keys.public_pem.as_bytes(), b"the secret")
//!     .unwrap();
//! std::fs::write("cover_encoded.png", encoded).unwrap();
//!
//! let secret = vault
//!     .decode(Path::new("cover_encoded.png"), CarrierKind::Image, keys.private_pem.as_bytes())
//!     .unwrap();
//! assert_eq!(secret, b"the secret");
//! ```

pub mod carrier;
pub mod cli;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod quarantine;
pub mod telemetry;
pub mod transcode;
pub mod vault;

pub use carrier::CarrierKind;
pub use config::Config;
pub use error::{PixelCryptError, Result};
pub use quarantine::{QuarantineRegistry, QuarantineState, MAX_ATTEMPTS};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use vault::Vault;
