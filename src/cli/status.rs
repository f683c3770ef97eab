use crate::error::Result;
use crate::quarantine::QuarantineState;
use crate::vault::Vault;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Quarantine standing of one carrier file
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub path: PathBuf,
    pub file_hash: String,
    pub state: QuarantineState,
    pub remaining: u32,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Carrier: {}", self.path.display())?;
        writeln!(f, "SHA-256: {}", self.file_hash)?;
        writeln!(f, "State: {}", self.state)?;
        writeln!(f, "Attempts remaining: {}", self.remaining)
    }
}

pub fn show_status(vault: &Vault, input: &Path) -> Result<StatusReport> {
    let (file_hash, state) = vault.status(input)?;
    Ok(StatusReport {
        path: input.to_path_buf(),
        file_hash,
        remaining: state.remaining(),
        state,
    })
}
