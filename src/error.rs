use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelCryptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image carrier error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Audio carrier error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Quarantine registry error: {0}")]
    Registry(#[from] rusqlite::Error),

    #[error("Payload too large: {payload_size} bytes, carrier holds at most {capacity} bytes")]
    CapacityExceeded { payload_size: usize, capacity: usize },

    #[error("Invalid format: {0}")]
    Format(String),

    /// Wrong key, tampered ciphertext, tag or wrapped key. Deliberately carries
    /// no detail about which part failed.
    #[error("Decryption failed: wrong key or corrupted data")]
    AuthenticationFailure,

    #[error("Invalid key: {0}")]
    KeyFormat(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Wrong key, {remaining} attempts remaining")]
    WrongKey { remaining: u32 },

    #[error("Carrier corrupted: security limit exceeded, this file is permanently banned")]
    QuarantineBanned,

    #[error("Final attempt failed: carrier has been corrupted and permanently banned")]
    AttemptsExhausted,

    #[error("External tool failure: {0}")]
    ExternalToolFailure(String),

    #[error("Unsupported carrier: {0}")]
    UnsupportedCarrier(String),

    #[error("Secret required")]
    SecretRequired,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PixelCryptError {
    /// True for both the pre-check ban and the ban fired by the final attempt.
    pub fn is_banned(&self) -> bool {
        matches!(self, Self::QuarantineBanned | Self::AttemptsExhausted)
    }

    /// Whether a failure raised while opening an extracted payload must be
    /// charged against the carrier's attempt budget.
    ///
    /// Format, authentication and key-parse failures are indistinguishable to
    /// the caller and all count. Local I/O and registry failures do not.
    pub fn consumes_attempt(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::AuthenticationFailure | Self::KeyFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PixelCryptError>;
