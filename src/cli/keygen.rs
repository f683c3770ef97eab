use crate::envelope::generate_keypair;
use crate::error::{PixelCryptError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// Options for the keygen command
#[derive(Debug, Clone, Default)]
pub struct KeygenOptions {
    /// Replace existing key files
    pub force: bool,
}

/// Paths written by [`write_keypair`]
#[derive(Debug, Clone)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Generate a keypair into `out_dir` as `private_key.pem` and `public_key.pem`
pub fn write_keypair(out_dir: &Path, options: &KeygenOptions) -> Result<KeyFiles> {
    fs::create_dir_all(out_dir)?;
    let files = KeyFiles {
        private_key: out_dir.join(PRIVATE_KEY_FILE),
        public_key: out_dir.join(PUBLIC_KEY_FILE),
    };

    if !options.force {
        for existing in [&files.private_key, &files.public_key] {
            if existing.exists() {
                return Err(PixelCryptError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} exists (use --force to replace)", existing.display()),
                )));
            }
        }
    }

    let pair = generate_keypair()?;
    write_private(&files.private_key, pair.private_pem.as_bytes())?;
    fs::write(&files.public_key, pair.public_pem.as_bytes())?;

    Ok(files)
}

fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(pem)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{open, seal};
    use tempfile::tempdir;

    #[test]
    fn test_keygen_writes_usable_pair() {
        let dir = tempdir().unwrap();
        let files = write_keypair(dir.path(), &KeygenOptions::default()).unwrap();

        let public = fs::read(&files.public_key).unwrap();
        let private = fs::read(&files.private_key).unwrap();
        let envelope = seal(b"from disk", &public).unwrap();
        assert_eq!(open(&envelope, &private).unwrap(), b"from disk");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&files.private_key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_keygen_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), b"precious").unwrap();

        let err = write_keypair(dir.path(), &KeygenOptions::default()).unwrap_err();
        assert!(matches!(err, PixelCryptError::Io(_)));
        assert_eq!(fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap(), b"precious");
    }
}
