//! Length-framed LSB codec shared by every carrier kind.
//!
//! A frame is a 4-byte big-endian payload length followed by the payload.
//! Frame bits are written MSB-first, one bit into the low bit of each carrier
//! unit, starting at unit 0 in the carrier's traversal order:
//!
//! ```text
//! units:  [u0 .. u31]        [u32 .. u32+8L-1]        [rest untouched]
//! bits:    length (BE u32)    payload bytes, MSB-first
//! ```

pub mod audio;
pub mod raster;
pub mod video;

pub use audio::AudioCarrier;
pub use raster::ImageCarrier;
pub use video::{Access, VideoCarrier};

use crate::error::{PixelCryptError, Result};

/// Size of the big-endian length prefix in bytes
pub const LENGTH_PREFIX_LEN: usize = 4;

const LENGTH_PREFIX_BITS: usize = LENGTH_PREFIX_LEN * 8;

/// A decoded carrier exposing its mutable unit buffer.
///
/// Implementations own the buffer for the lifetime of one embed or extract
/// and must traverse units in the same order for both directions.
pub trait Carrier {
    fn units(&self) -> &[u8];

    fn units_mut(&mut self) -> &mut [u8];

    /// Re-encode the (possibly modified) units into the carrier's container
    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Largest payload, in bytes, a carrier of `unit_count` units can frame
pub fn capacity_bytes(unit_count: usize) -> usize {
    (unit_count / 8).saturating_sub(LENGTH_PREFIX_LEN)
}

/// Number of carrier units a framed payload of `payload_len` bytes occupies
pub fn frame_bits(payload_len: usize) -> usize {
    (LENGTH_PREFIX_LEN + payload_len) * 8
}

/// Embed `payload` into the low bits of `units`.
///
/// Fails with `CapacityExceeded` before touching any unit when the frame does
/// not fit.
pub fn embed(units: &mut [u8], payload: &[u8]) -> Result<()> {
    let capacity = capacity_bytes(units.len());
    if payload.len() > capacity || u32::try_from(payload.len()).is_err() {
        return Err(PixelCryptError::CapacityExceeded {
            payload_size: payload.len(),
            capacity,
        });
    }

    let prefix = (payload.len() as u32).to_be_bytes();
    let frame = prefix.iter().chain(payload.iter());

    for (byte_index, &byte) in frame.enumerate() {
        let base = byte_index * 8;
        for bit in 0..8 {
            let value = (byte >> (7 - bit)) & 1;
            let unit = &mut units[base + bit];
            *unit = (*unit & !1) | value;
        }
    }

    Ok(())
}

/// Extract a framed payload from the low bits of `units`.
///
/// Returns `None` when the carrier is too short to hold a length prefix or
/// the declared length overruns the carrier. Both cases mean "no intact
/// payload here".
pub fn extract(units: &[u8]) -> Option<Vec<u8>> {
    if units.len() < LENGTH_PREFIX_BITS {
        return None;
    }

    let declared = read_byte_run(&units[..LENGTH_PREFIX_BITS]);
    let length = u32::from_be_bytes([declared[0], declared[1], declared[2], declared[3]]) as usize;

    let needed = length
        .checked_mul(8)
        .and_then(|bits| bits.checked_add(LENGTH_PREFIX_BITS))?;
    if needed > units.len() {
        return None;
    }

    Some(read_byte_run(&units[LENGTH_PREFIX_BITS..needed]))
}

/// Pack low bits, MSB-first, into bytes. `units.len()` must be a multiple of 8.
fn read_byte_run(units: &[u8]) -> Vec<u8> {
    units
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, unit| (acc << 1) | (unit & 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capacity_formula() {
        // 100x100 RGB image
        assert_eq!(capacity_bytes(30_000), 3746);
        assert_eq!(capacity_bytes(32), 0);
        assert_eq!(capacity_bytes(7), 0);
        assert_eq!(capacity_bytes(0), 0);
    }

    #[test]
    fn test_embed_extract_basic() {
        let mut units = vec![0xAAu8; 256];
        embed(&mut units, b"hi").unwrap();
        assert_eq!(extract(&units).unwrap(), b"hi");
    }

    #[test]
    fn test_frame_layout_is_msb_first_big_endian() {
        let mut units = vec![0u8; 64];
        embed(&mut units, &[0x81]).unwrap();

        let bits: Vec<u8> = units.iter().map(|u| u & 1).collect();
        // length prefix = 1
        let mut prefix = vec![0u8; 32];
        prefix[31] = 1;
        assert_eq!(&bits[..32], &prefix[..]);
        // payload 0x81 = 1000_0001
        assert_eq!(&bits[32..40], &[1, 0, 0, 0, 0, 0, 0, 1]);
        // untouched tail
        assert!(units[40..].iter().all(|&u| u == 0));
    }

    #[test]
    fn test_exact_capacity_boundary() {
        let mut units = vec![0x55u8; 30_000];
        let capacity = capacity_bytes(units.len());

        let fits = vec![0x3Cu8; capacity];
        embed(&mut units, &fits).unwrap();
        assert_eq!(extract(&units).unwrap(), fits);

        let mut fresh = vec![0x55u8; 30_000];
        let too_big = vec![0x3Cu8; capacity + 1];
        let err = embed(&mut fresh, &too_big).unwrap_err();
        assert!(matches!(
            err,
            PixelCryptError::CapacityExceeded {
                payload_size: 3747,
                capacity: 3746
            }
        ));
        // nothing was written
        assert!(fresh.iter().all(|&u| u == 0x55));
    }

    #[test]
    fn test_empty_payload() {
        let mut units = vec![0xFFu8; 40];
        embed(&mut units, b"").unwrap();
        assert_eq!(extract(&units).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_extract_rejects_overlong_declaration() {
        // all low bits set: declared length 0xFFFF_FFFF
        let units = vec![0x01u8; 1024];
        assert!(extract(&units).is_none());
    }

    #[test]
    fn test_extract_rejects_short_carrier() {
        assert!(extract(&[0u8; 31]).is_none());
        assert!(extract(&[]).is_none());
    }

    proptest! {
        #[test]
        fn prop_embed_only_touches_frame_low_bits(
            cover in proptest::collection::vec(any::<u8>(), 32..2048),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut units = cover.clone();
            match embed(&mut units, &payload) {
                Ok(()) => {
                    let used = frame_bits(payload.len());
                    for (i, (before, after)) in cover.iter().zip(units.iter()).enumerate() {
                        prop_assert_eq!(before & !1, after & !1);
                        if i >= used {
                            prop_assert_eq!(before, after);
                        }
                    }
                    prop_assert_eq!(extract(&units), Some(payload));
                }
                Err(_) => {
                    prop_assert!(payload.len() > capacity_bytes(cover.len()));
                    prop_assert_eq!(units, cover);
                }
            }
        }
    }
}
