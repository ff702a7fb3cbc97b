//! Symbol ID decoding (IAID, A.3).

use crate::arithmetic_decoder::{ArithmeticDecoding, ContextState};

/// Decode a `code_len`-bit symbol ID.
///
/// "The number of contexts required is 2^SBSYMCODELEN, which is less than
/// twice the maximum symbol ID." (A.3)
#[inline(always)]
pub(crate) fn decode<D: ArithmeticDecoding + ?Sized>(
    decoder: &mut D,
    code_len: u32,
    states: &mut [ContextState],
) -> u32 {
    // "1) Set: PREV = 1"
    let mut prev = 1_u32;

    // "2) Decode SBSYMCODELEN bits as follows: a) Decode a bit with CX equal to
    // "IAID + PREV" ... b) After each bit is decoded, set: PREV = (PREV << 1) OR D"
    for _ in 0..code_len {
        let bit = decoder.decode_bit(prev, states);
        prev = (prev << 1) | u32::from(bit);
    }

    // "3) The result is equal to: PREV - 2^SBSYMCODELEN"
    prev - (1 << code_len)
}
