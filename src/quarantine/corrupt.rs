use super::content_hash;
use crate::error::Result;
use fs2::FileExt;
use rand::rngs::OsRng;
use rand::Rng;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Bytes overwritten at the start of the file, where container headers live
pub const HEAD_LEN: u64 = 1024;
/// Number of random spans scrambled past the head
pub const SPAN_COUNT: usize = 5;
pub const SPAN_LEN: u64 = 100;

/// Destroy a carrier in place.
///
/// Overwrites the head and a handful of random spans with noise so the
/// container can no longer be opened. The file keeps its length and stays on
/// disk. Holds an exclusive advisory lock for the duration so a concurrent
/// snapshot never reads a half-scrambled file.
///
/// Returns the content hash of the scrambled file.
pub fn corrupt_carrier(path: &Path) -> Result<String> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    FileExt::lock_exclusive(&file)?;

    let result = scramble_file(&mut file);

    if let Err(e) = FileExt::unlock(&file) {
        warn!(path = %path.display(), error = %e, "failed to release carrier lock");
    }
    let scrambled = result?;

    debug!(path = %path.display(), "carrier scrambled");
    Ok(content_hash(&scrambled))
}

fn scramble_file(file: &mut std::fs::File) -> io::Result<Vec<u8>> {
    let len = file.metadata()?.len();
    scramble(file, len, &mut OsRng)?;
    file.sync_all()?;

    let mut scrambled = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut scrambled)?;
    Ok(scrambled)
}

/// Scramble a `len`-byte target. Writes never extend past `len`.
pub fn scramble<W, R>(target: &mut W, len: u64, rng: &mut R) -> io::Result<()>
where
    W: Write + Seek,
    R: Rng,
{
    let head = len.min(HEAD_LEN);
    overwrite(target, 0, head, rng)?;

    let upper = HEAD_LEN.max(len.saturating_sub(SPAN_LEN));
    for _ in 0..SPAN_COUNT {
        let offset = rng.gen_range(HEAD_LEN..=upper);
        if offset >= len {
            continue;
        }
        overwrite(target, offset, SPAN_LEN.min(len - offset), rng)?;
    }

    target.flush()
}

fn overwrite<W: Write + Seek, R: Rng>(
    target: &mut W,
    offset: u64,
    count: u64,
    rng: &mut R,
) -> io::Result<()> {
    if count == 0 {
        return Ok(());
    }
    let mut noise = vec![0u8; count as usize];
    rng.fill(noise.as_mut_slice());
    target.seek(SeekFrom::Start(offset))?;
    target.write_all(&noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_scramble_keeps_length_and_destroys_head() {
        let original = vec![0u8; 10_000];
        let mut cursor = Cursor::new(original.clone());
        scramble(&mut cursor, 10_000, &mut StdRng::seed_from_u64(7)).unwrap();

        let scrambled = cursor.into_inner();
        assert_eq!(scrambled.len(), 10_000);
        assert_ne!(&scrambled[..1024], &original[..1024]);
        // at most the head plus five spans were touched
        let touched = scrambled.iter().filter(|&&b| b != 0).count();
        assert!(touched <= 1024 + 500);
    }

    #[test]
    fn test_scramble_small_file_only_touches_head() {
        let mut cursor = Cursor::new(vec![0u8; 300]);
        scramble(&mut cursor, 300, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(cursor.into_inner().len(), 300);
    }

    #[test]
    fn test_scramble_spans_clamped_to_end() {
        // spans may start anywhere in 1024..=1030 and must stop at 1130
        for seed in 0..32 {
            let mut cursor = Cursor::new(vec![0u8; 1130]);
            scramble(&mut cursor, 1130, &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(cursor.into_inner().len(), 1130);
        }
    }

    #[test]
    fn test_corrupt_carrier_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("carrier.png");
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let hash = corrupt_carrier(&path).unwrap();
        let after = fs::read(&path).unwrap();
        assert_eq!(after.len(), data.len());
        assert_eq!(hash, content_hash(&after));
        assert_ne!(&after[..1024], &data[..1024]);

        // repeated corruption is harmless
        corrupt_carrier(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 5000);
    }

    #[test]
    fn test_corrupt_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(corrupt_carrier(&dir.path().join("gone.wav")).is_err());
    }
}
