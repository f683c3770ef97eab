use crate::carrier::CarrierKind;
use crate::error::Result;
use crate::vault::Vault;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Options for the decode command
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Private key PEM file
    pub private_key: PathBuf,
    pub kind: Option<CarrierKind>,
}

/// Recover the secret hidden in `input`
pub fn decode_file(vault: &Vault, input: &Path, options: &DecodeOptions) -> Result<Zeroizing<Vec<u8>>> {
    let kind = match options.kind {
        Some(kind) => kind,
        None => CarrierKind::detect(input)?,
    };
    let private_key = Zeroizing::new(std::fs::read(&options.private_key)?);
    let secret = vault.decode(input, kind, &private_key)?;
    Ok(Zeroizing::new(secret))
}
