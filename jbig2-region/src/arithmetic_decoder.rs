//! The arithmetic decoder (Annex E).
//!
//! "The arithmetic decoding procedure receives an arithmetically coded bit
//! sequence and an associated sequence of context labels, and reconstructs
//! the original string of binary symbols." (E.1.1)
//!
//! Region decoders only talk to [`ArithmeticDecoding`]. [`MqDecoder`] is the
//! standard implementation over a byte slice.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{RegionError, Result};
use crate::integer_decoder::{self, IntegerContexts};
use crate::symbol_id_decoder;

/// Per-context probability state (E.2.4).
///
/// "Each context has associated with it an index, I(CX), which identifies a
/// particular probability estimate and its associated MPS value." (E.2.4)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextState {
    /// "I(CX) - Index for context CX"
    pub index: u8,
    /// "MPS(CX) - The sense of MPS for context CX"
    pub mps: u8,
}

/// Allocate a fresh context table with `1 << bits` entries.
pub fn new_contexts(bits: u32) -> Vec<ContextState> {
    vec![ContextState::default(); 1 << bits]
}

/// Like [`new_contexts`], but reports a failed allocation instead of aborting.
pub(crate) fn try_new_contexts(bits: u32) -> Result<Vec<ContextState>> {
    let len = 1_usize.checked_shl(bits).ok_or(RegionError::TooLarge)?;

    let mut states = Vec::new();
    states
        .try_reserve_exact(len)
        .map_err(|_| RegionError::TooLarge)?;
    states.resize(len, ContextState::default());

    Ok(states)
}

/// A context-adaptive binary decoder.
///
/// Implementations carry the position in the coded data; the probability
/// state lives in the table passed to every call so that it can be shared
/// between regions or reset independently.
pub trait ArithmeticDecoding {
    /// Decode one bit with context `context` and return 0 or 1.
    ///
    /// `states` must have an entry for `context`.
    fn decode_bit(&mut self, context: u32, states: &mut [ContextState]) -> u8;

    /// Decode a signed integer (A.2). Returns `None` for OOB.
    fn decode_int(&mut self, contexts: &mut IntegerContexts) -> Option<i32> {
        integer_decoder::decode(self, contexts)
    }

    /// Decode a symbol ID of `code_len` bits (A.3).
    fn decode_symbol_id(&mut self, code_len: u32, states: &mut [ContextState]) -> u32 {
        symbol_id_decoder::decode(self, code_len, states)
    }
}

impl<T: ArithmeticDecoding + ?Sized> ArithmeticDecoding for &mut T {
    #[inline(always)]
    fn decode_bit(&mut self, context: u32, states: &mut [ContextState]) -> u8 {
        (**self).decode_bit(context, states)
    }

    fn decode_int(&mut self, contexts: &mut IntegerContexts) -> Option<i32> {
        (**self).decode_int(contexts)
    }

    fn decode_symbol_id(&mut self, code_len: u32, states: &mut [ContextState]) -> u32 {
        (**self).decode_symbol_id(code_len, states)
    }
}

/// The MQ decoder state (E.3).
///
/// "State variables used by the arithmetic decoder procedures are described in
/// Table E.1." (E.3.1)
#[derive(Debug, Clone)]
pub struct MqDecoder<'a> {
    data: &'a [u8],
    /// "Chigh and Clow can be thought of as one 32-bit C-register" (E.3.1)
    c: u32,
    /// "A-register" (E.3.1)
    a: u32,
    /// "BP - A pointer to the compressed data"
    pos: usize,
    /// "CT - The bit counter"
    ct: u32,
}

impl<'a> MqDecoder<'a> {
    /// Start decoding `data` (INITDEC, Figure G.1).
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            c: 0,
            a: 0,
            pos: 0,
            ct: 0,
        };

        // "C = (B XOR 0xFF) << 16"
        decoder.c = u32::from(decoder.byte_at(0) ^ 0xff) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct -= 7;
        decoder.a = 0x8000;

        decoder
    }

    /// BYTEIN (Figure G.3).
    ///
    /// Past the end of the data the decoder is fed 0xFF bytes, which behave
    /// like a marker.
    #[inline(always)]
    fn byte_in(&mut self) {
        if self.byte_at(self.pos) == 0xff {
            if self.byte_at(self.pos + 1) > 0x8f {
                self.ct = 8;
            } else {
                self.pos += 1;
                self.c = self
                    .c
                    .wrapping_add(0xfe00)
                    .wrapping_sub(u32::from(self.byte_at(self.pos)) << 9);
                self.ct = 7;
            }
        } else {
            self.pos += 1;
            self.c = self
                .c
                .wrapping_add(0xff00)
                .wrapping_sub(u32::from(self.byte_at(self.pos)) << 8);
            self.ct = 8;
        }
    }

    /// RENORMD (Figure E.18).
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    #[inline(always)]
    fn byte_at(&self, pos: usize) -> u8 {
        self.data.get(pos).copied().unwrap_or(0xff)
    }
}

impl ArithmeticDecoding for MqDecoder<'_> {
    /// DECODE (Figure G.2) with `MPS_EXCHANGE` and `LPS_EXCHANGE`
    /// (Figures E.16 and E.17).
    #[inline(always)]
    fn decode_bit(&mut self, context: u32, states: &mut [ContextState]) -> u8 {
        let state = &mut states[context as usize];
        let qe = &QE_TABLE[state.index as usize];

        self.a -= qe.qe;

        if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return state.mps;
            }

            // MPS_EXCHANGE
            let d = if self.a < qe.qe {
                let d = 1 - state.mps;
                if qe.switch {
                    state.mps = 1 - state.mps;
                }
                state.index = qe.nlps;
                d
            } else {
                state.index = qe.nmps;
                state.mps
            };
            self.renormalize();

            d
        } else {
            self.c -= self.a << 16;

            // LPS_EXCHANGE
            let d = if self.a < qe.qe {
                state.index = qe.nmps;
                state.mps
            } else {
                let d = 1 - state.mps;
                if qe.switch {
                    state.mps = 1 - state.mps;
                }
                state.index = qe.nlps;
                d
            };
            self.a = qe.qe;
            self.renormalize();

            d
        }
    }
}

/// Qe value table entry (Table E.1).
#[derive(Debug, Clone, Copy)]
struct QeData {
    qe: u32,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

macro_rules! qe {
    ($($qe:expr, $nmps:expr, $nlps:expr, $switch:expr),+ $(,)?) => {
        [
            $(
                QeData {
                    qe: $qe,
                    nmps: $nmps,
                    nlps: $nlps,
                    switch: $switch,
                }
            ),+
        ]
    };
}

/// "Table E.1 - Qe values and probability estimation process"
#[rustfmt::skip]
static QE_TABLE: [QeData; 47] = qe!(
    // Index  Qe_Value  NMPS  NLPS  SWITCH
    /*  0 */ 0x5601,    1,    1,    true,
    /*  1 */ 0x3401,    2,    6,    false,
    /*  2 */ 0x1801,    3,    9,    false,
    /*  3 */ 0x0AC1,    4,    12,   false,
    /*  4 */ 0x0521,    5,    29,   false,
    /*  5 */ 0x0221,    38,   33,   false,
    /*  6 */ 0x5601,    7,    6,    true,
    /*  7 */ 0x5401,    8,    14,   false,
    /*  8 */ 0x4801,    9,    14,   false,
    /*  9 */ 0x3801,    10,   14,   false,
    /* 10 */ 0x3001,    11,   17,   false,
    /* 11 */ 0x2401,    12,   18,   false,
    /* 12 */ 0x1C01,    13,   20,   false,
    /* 13 */ 0x1601,    29,   21,   false,
    /* 14 */ 0x5601,    15,   14,   true,
    /* 15 */ 0x5401,    16,   14,   false,
    /* 16 */ 0x5101,    17,   15,   false,
    /* 17 */ 0x4801,    18,   16,   false,
    /* 18 */ 0x3801,    19,   17,   false,
    /* 19 */ 0x3401,    20,   18,   false,
    /* 20 */ 0x3001,    21,   19,   false,
    /* 21 */ 0x2801,    22,   19,   false,
    /* 22 */ 0x2401,    23,   20,   false,
    /* 23 */ 0x2201,    24,   21,   false,
    /* 24 */ 0x1C01,    25,   22,   false,
    /* 25 */ 0x1801,    26,   23,   false,
    /* 26 */ 0x1601,    27,   24,   false,
    /* 27 */ 0x1401,    28,   25,   false,
    /* 28 */ 0x1201,    29,   26,   false,
    /* 29 */ 0x1101,    30,   27,   false,
    /* 30 */ 0x0AC1,    31,   28,   false,
    /* 31 */ 0x09C1,    32,   29,   false,
    /* 32 */ 0x08A1,    33,   30,   false,
    /* 33 */ 0x0521,    34,   31,   false,
    /* 34 */ 0x0441,    35,   32,   false,
    /* 35 */ 0x02A1,    36,   33,   false,
    /* 36 */ 0x0221,    37,   34,   false,
    /* 37 */ 0x0141,    38,   35,   false,
    /* 38 */ 0x0111,    39,   36,   false,
    /* 39 */ 0x0085,    40,   37,   false,
    /* 40 */ 0x0049,    41,   38,   false,
    /* 41 */ 0x0025,    42,   39,   false,
    /* 42 */ 0x0015,    43,   40,   false,
    /* 43 */ 0x0009,    44,   41,   false,
    /* 44 */ 0x0005,    45,   42,   false,
    /* 45 */ 0x0001,    45,   43,   false,
    /* 46 */ 0x5601,    46,   46,   false,
);
