//! Error types for JBIG2 region decoding.

use core::fmt;

/// The main error type for region decoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Errors related to reading data through a collaborator.
    Parse(ParseError),
    /// Errors related to region dimensions and allocation.
    Region(RegionError),
    /// Errors related to template configuration.
    Template(TemplateError),
    /// Errors related to symbol instances in text regions.
    Symbol(SymbolError),
    /// Errors related to Huffman decoding.
    Huffman(HuffmanError),
    /// Arithmetic overflow in coordinate calculations.
    Overflow,
    /// The caller requested cancellation while the region was decoded.
    Cancelled,
}

/// Errors related to reading data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Unexpected end of input.
    UnexpectedEof,
}

/// Errors related to region dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// A region with an invalid dimension.
    InvalidDimension,
    /// The bitmap is too large to be allocated.
    TooLarge,
    /// An auxiliary bitmap does not have the dimensions of the region.
    DimensionMismatch,
    /// Invalid combination operator value.
    InvalidCombinationOperator,
}

/// Errors related to template configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// The number of adaptive template pixels does not match the template.
    InvalidAtPixelCount,
    /// The context table cannot hold every context of the template.
    ContextTableTooSmall,
}

/// Errors related to symbol handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    /// An out-of-band value where a number was required.
    UnexpectedOob,
    /// A refined symbol with a negative size.
    InvalidRefinementSize,
    /// Symbol IDs would need more than 31 bits.
    TooManySymbols,
}

/// Errors related to Huffman decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanError {
    /// Invalid Huffman code sequence.
    InvalidCode,
    /// Unexpected out-of-band value.
    UnexpectedOob,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Region(e) => write!(f, "{e}"),
            Self::Template(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Huffman(e) => write!(f, "{e}"),
            Self::Overflow => write!(f, "arithmetic overflow"),
            Self::Cancelled => write!(f, "decoding was cancelled"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimension => write!(f, "invalid dimension value"),
            Self::TooLarge => write!(f, "bitmap is too large"),
            Self::DimensionMismatch => write!(f, "bitmap dimensions do not match the region"),
            Self::InvalidCombinationOperator => write!(f, "invalid combination operator"),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAtPixelCount => write!(f, "wrong number of adaptive template pixels"),
            Self::ContextTableTooSmall => write!(f, "context table is too small for the template"),
        }
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedOob => write!(f, "unexpected out-of-band value"),
            Self::InvalidRefinementSize => write!(f, "refined symbol has a negative size"),
            Self::TooManySymbols => write!(f, "too many symbols in text region"),
        }
    }
}

impl fmt::Display for HuffmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "invalid Huffman code"),
            Self::UnexpectedOob => write!(f, "unexpected out-of-band value"),
        }
    }
}

impl core::error::Error for DecodeError {}
impl core::error::Error for ParseError {}
impl core::error::Error for RegionError {}
impl core::error::Error for TemplateError {}
impl core::error::Error for SymbolError {}
impl core::error::Error for HuffmanError {}

impl From<ParseError> for DecodeError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<RegionError> for DecodeError {
    fn from(e: RegionError) -> Self {
        Self::Region(e)
    }
}

impl From<TemplateError> for DecodeError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

impl From<SymbolError> for DecodeError {
    fn from(e: SymbolError) -> Self {
        Self::Symbol(e)
    }
}

impl From<HuffmanError> for DecodeError {
    fn from(e: HuffmanError) -> Self {
        Self::Huffman(e)
    }
}

/// Result type for region decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;
