//! The Huffman side of text region decoding (6.4, 7.4.3.1.6).
//!
//! Table selection and the standard tables (Annex B) belong to the caller; a
//! text region only names the quantity it needs next.

use crate::error::Result;

/// The quantities of a text region that are coded with a Huffman table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextHuffmanTable {
    /// SBHUFFFS, the first S coordinate of a strip.
    FirstS,
    /// SBHUFFDS, the S distance to the previous instance.
    DeltaS,
    /// SBHUFFDT, the strip T delta.
    DeltaT,
    /// SBHUFFRDW, refinement width delta.
    RefinementDeltaWidth,
    /// SBHUFFRDH, refinement height delta.
    RefinementDeltaHeight,
    /// SBHUFFRDX, refinement x offset.
    RefinementDeltaX,
    /// SBHUFFRDY, refinement y offset.
    RefinementDeltaY,
    /// SBHUFFRSIZE, the byte size of the refinement bitmap data.
    RefinementSize,
    /// The symbol ID code table decoded from the region header (7.4.3.1.7).
    SymbolId,
}

/// A bit reader with Huffman integer decoding.
pub trait HuffmanDecoding {
    /// Decode a value with the table selected for `table`. `None` is OOB.
    fn decode_int(&mut self, table: TextHuffmanTable) -> Result<Option<i32>>;

    /// Read `count` bits, most significant first. `count` is at most 32.
    fn read_bits(&mut self, count: u8) -> Result<u32>;

    /// Read a single bit.
    fn read_bit(&mut self) -> Result<u8> {
        Ok(self.read_bits(1)? as u8)
    }

    /// Skip to the next byte boundary.
    fn align(&mut self);

    /// Take `len` bytes from a byte-aligned position.
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]>;
}
