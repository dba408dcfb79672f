//! Sortable byte encodings.
//!
//! Types stored under the generic byte-item code (`u`) but ordered by an
//! index need an encoding whose unsigned lexicographic order matches the
//! natural order of the value. These helpers produce and read the encodings
//! the engine's `d` and `z` read formats expect.

use crate::error::{MapError, MapResult};

/// Encoded width of a double.
pub const DOUBLE_WIDTH: usize = 8;

/// Encoded width of a big integer: one sign byte plus a 128-bit magnitude.
pub const BIGINT_WIDTH: usize = 17;

/// Flips a big-endian buffer between its natural and sortable forms.
///
/// Non-negative values only need the sign bit toggled; negative values are
/// inverted so that larger magnitudes sort first.
fn flip_sign(buffer: &mut [u8], positive: bool) {
    if positive {
        buffer[0] ^= 0x80;
    } else {
        for byte in buffer.iter_mut() {
            *byte ^= 0xff;
        }
    }
}

/// Encodes a double so that byte order matches numeric order.
///
/// # Example
///
/// ```rust
/// use docmap_common::types::sortable::encode_double;
///
/// assert!(encode_double(-1.5) < encode_double(0.0));
/// assert!(encode_double(0.0) < encode_double(2.25));
/// ```
#[must_use]
pub fn encode_double(value: f64) -> [u8; DOUBLE_WIDTH] {
    let mut bytes = value.to_be_bytes();
    let positive = bytes[0] & 0x80 == 0;
    flip_sign(&mut bytes, positive);
    bytes
}

/// Decodes a double written by [`encode_double`].
pub fn decode_double(bytes: &[u8]) -> MapResult<f64> {
    let mut buffer: [u8; DOUBLE_WIDTH] = bytes.try_into().map_err(|_| MapError::Codec {
        message: format!(
            "sortable double needs {} bytes, got {}",
            DOUBLE_WIDTH,
            bytes.len()
        ),
    })?;
    let positive = buffer[0] & 0x80 == 0x80;
    flip_sign(&mut buffer, positive);
    Ok(f64::from_be_bytes(buffer))
}

/// Encodes a big integer so that byte order matches numeric order.
#[must_use]
pub fn encode_bigint(value: i128) -> Vec<u8> {
    let negative = value < 0;
    let mut buffer = Vec::with_capacity(BIGINT_WIDTH);
    buffer.push(if negative { 0x80 } else { 0x00 });
    buffer.extend_from_slice(&value.unsigned_abs().to_be_bytes());
    flip_sign(&mut buffer, !negative);
    buffer
}

/// Decodes a big integer written by [`encode_bigint`].
pub fn decode_bigint(bytes: &[u8]) -> MapResult<i128> {
    if bytes.len() != BIGINT_WIDTH {
        return Err(MapError::Codec {
            message: format!(
                "sortable bigint needs {} bytes, got {}",
                BIGINT_WIDTH,
                bytes.len()
            ),
        });
    }
    let mut buffer = bytes.to_vec();
    let positive = buffer[0] & 0x80 == 0x80;
    flip_sign(&mut buffer, positive);

    let mut magnitude = [0u8; 16];
    magnitude.copy_from_slice(&buffer[1..]);
    let magnitude = u128::from_be_bytes(magnitude);

    if positive {
        i128::try_from(magnitude).map_err(|_| MapError::Codec {
            message: "sortable bigint magnitude out of range".to_string(),
        })
    } else {
        // 2^127 wraps onto i128::MIN, which is the one magnitude that needs it.
        Ok((magnitude as i128).wrapping_neg())
    }
}
