//! The code-word side of MMR decoding (6.2.6, ITU-T T.6).

/// A two-dimensional coding mode (T.6, Table 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoDimensionalCode {
    /// P: skip to below b2.
    Pass,
    /// H: two run lengths follow.
    Horizontal,
    /// V: a1 is at b1 plus the given offset, -3 to 3.
    Vertical(i8),
}

/// The end-of-facsimile-block marker as returned by
/// [`MmrDecoding::get_24_bits`] (two EOL codes, 6.2.6).
pub const EOFB: u32 = 0x001001;

/// A T.6 code-word reader.
///
/// Every method returns `None` for a bit pattern that is not a valid code of
/// the requested kind.
pub trait MmrDecoding {
    /// Reset the bit buffer before a new bitmap.
    fn reset(&mut self);

    /// Read a two-dimensional mode code.
    fn get_2d_code(&mut self) -> Option<TwoDimensionalCode>;

    /// Read one white run-length code, terminating or make-up.
    fn get_white_code(&mut self) -> Option<u32>;

    /// Read one black run-length code, terminating or make-up.
    fn get_black_code(&mut self) -> Option<u32>;

    /// Read the next 24 bits without interpretation.
    fn get_24_bits(&mut self) -> u32;

    /// Move to the byte `length` bytes after the start of the data.
    fn skip_to(&mut self, length: u32);
}
