use crate::carrier::{default_output_path, CarrierKind};
use crate::error::Result;
use crate::vault::Vault;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Options for the encode command
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Recipient public key PEM file
    pub public_key: PathBuf,
    pub secret: Zeroizing<Vec<u8>>,
    /// Overrides extension-based detection
    pub kind: Option<CarrierKind>,
    /// Defaults to `<stem>_encoded.<ext>` next to the input
    pub output: Option<PathBuf>,
}

/// Hide the secret in `input` and write the encoded carrier.
/// Returns the path written.
pub fn encode_file(vault: &Vault, input: &Path, options: &EncodeOptions) -> Result<PathBuf> {
    let kind = match options.kind {
        Some(kind) => kind,
        None => CarrierKind::detect(input)?,
    };
    let public_key = std::fs::read(&options.public_key)?;
    let carrier = std::fs::read(input)?;

    let encoded = vault.encode(&carrier, kind, &public_key, &options.secret)?;

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, kind));
    std::fs::write(&output, encoded)?;
    Ok(output)
}
