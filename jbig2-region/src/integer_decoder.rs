//! Arithmetic integer decoding (A.2).
//!
//! "An invocation of an arithmetic integer decoding procedure involves decoding
//! a sequence of bits, where each bit is decoded using a context formed by the
//! bits decoded previously in this invocation." (A.1)

use alloc::vec;
use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoding, ContextState};

/// The context memory of one integer decoding procedure (IAx).
///
/// "Each arithmetic integer decoding procedure requires 512 bytes of storage
/// for its context memory." (A.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerContexts {
    states: Vec<ContextState>,
}

impl IntegerContexts {
    /// Fresh contexts for one procedure, such as IADT or IARDX.
    pub fn new() -> Self {
        Self {
            states: vec![ContextState::default(); 512],
        }
    }
}

impl Default for IntegerContexts {
    fn default() -> Self {
        Self::new()
    }
}

/// The prefix tree of Figure A.1: how many value bits follow and the offset
/// added to them.
const VALUE_RANGES: [(u32, u32); 6] = [
    (2, 0),
    (4, 4),
    (6, 20),
    (8, 84),
    (12, 340),
    (32, 4436),
];

/// Decode one integer. `None` is OOB.
///
/// "The result of the integer arithmetic decoding procedure is equal to:
/// - V if S = 0
/// - -V if S = 1 and V > 0
/// - OOB if S = 1 and V = 0" (A.2)
pub(crate) fn decode<D: ArithmeticDecoding + ?Sized>(
    decoder: &mut D,
    contexts: &mut IntegerContexts,
) -> Option<i32> {
    // "1) Set: PREV = 1"
    let mut prev = 1_u32;
    let states = &mut contexts.states;

    let sign = decode_bit(decoder, states, &mut prev);

    // Each 1 bit moves one level down the prefix tree; the last level has no
    // terminating 0.
    let mut level = 0;
    while level < VALUE_RANGES.len() - 1 && decode_bit(decoder, states, &mut prev) == 1 {
        level += 1;
    }

    let (bits, offset) = VALUE_RANGES[level];
    let mut value = 0_u32;
    for _ in 0..bits {
        value = (value << 1) | decode_bit(decoder, states, &mut prev);
    }
    let value = i64::from(value) + i64::from(offset);

    match (sign, value) {
        (1, 0) => None,
        (1, v) => Some((-v).clamp(i64::from(i32::MIN), 0) as i32),
        (_, v) => Some(v.min(i64::from(i32::MAX)) as i32),
    }
}

/// "3) After each bit is decoded: If PREV < 256 set:
///     PREV = (PREV << 1) OR D
/// Otherwise set:
///     PREV = (((PREV << 1) OR D) AND 511) OR 256" (A.2)
#[inline(always)]
fn decode_bit<D: ArithmeticDecoding + ?Sized>(
    decoder: &mut D,
    states: &mut [ContextState],
    prev: &mut u32,
) -> u32 {
    let bit = u32::from(decoder.decode_bit(*prev & 0x1ff, states));

    *prev = if *prev < 256 {
        (*prev << 1) | bit
    } else {
        (((*prev << 1) | bit) & 511) | 256
    };

    bit
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed bit sequence and records the contexts it was asked for.
    struct Script {
        bits: Vec<u8>,
        contexts: Vec<u32>,
    }

    impl ArithmeticDecoding for Script {
        fn decode_bit(&mut self, context: u32, _: &mut [ContextState]) -> u8 {
            self.contexts.push(context);
            self.bits.remove(0)
        }
    }

    fn run(bits: &[u8]) -> (Option<i32>, Vec<u32>) {
        let mut script = Script {
            bits: bits.to_vec(),
            contexts: Vec::new(),
        };
        let value = script.decode_int(&mut IntegerContexts::new());
        assert!(script.bits.is_empty(), "not all bits were consumed");
        (value, script.contexts)
    }

    #[test]
    fn small_positive() {
        // S=0, prefix 0, value 0b11.
        let (value, contexts) = run(&[0, 0, 1, 1]);
        assert_eq!(value, Some(3));
        assert_eq!(contexts, [1, 0b10, 0b100, 0b1001]);
    }

    #[test]
    fn negative_in_second_range() {
        // S=1, prefix 10, value 0b0010 + 4.
        let (value, _) = run(&[1, 1, 0, 0, 0, 1, 0]);
        assert_eq!(value, Some(-6));
    }

    #[test]
    fn oob() {
        let (value, _) = run(&[1, 0, 0, 0]);
        assert_eq!(value, None);
    }

    #[test]
    fn negative_zero_is_not_oob_in_higher_ranges() {
        // S=1, prefix 10, value 0 + 4.
        let (value, _) = run(&[1, 1, 0, 0, 0, 0, 0]);
        assert_eq!(value, Some(-4));
    }

    #[test]
    fn prev_keeps_nine_bits() {
        // S=0, prefix 11110, twelve value bits.
        let mut bits = vec![0, 1, 1, 1, 1, 0];
        bits.extend([1; 12]);
        let (value, contexts) = run(&bits);
        assert_eq!(value, Some(4095 + 340));
        assert!(contexts.iter().all(|&cx| cx < 512));
        assert!(contexts[9..].iter().all(|&cx| cx >= 256));
    }

    #[test]
    fn largest_range_saturates() {
        let mut bits = vec![0, 1, 1, 1, 1, 1];
        bits.extend([1; 32]);
        let (value, _) = run(&bits);
        assert_eq!(value, Some(i32::MAX));
    }
}
