/*!
A memory-safe, pure-Rust decoder for JBIG2 regions.

`jbig2-region` implements the region decoding procedures of ITU-T T.88
(also known as ISO/IEC 14492): generic regions (6.2), generic refinement
regions (6.3) and text regions (6.4). It works on already-parsed region
parameters. Segment parsing, symbol dictionaries and page composition are
left to the caller, as are the entropy decoders that are not arithmetic:
MMR code words are read through [`MmrDecoding`] and Huffman-coded text
regions through [`HuffmanDecoding`].

# Example
```rust
use jbig2_region::{
    Bitmap, GenericRegionCoding, GenericRegionParams, MqDecoder, Template,
    decode_generic_region, new_contexts,
};

let data = [0x84, 0xc7, 0x3b, 0xfc, 0xe1, 0xa1, 0x43, 0x04];
let mut region = Bitmap::new(16, 4)?;
let params = GenericRegionParams::new(Template::Template0);
let mut decoder = MqDecoder::new(&data);
let mut contexts = new_contexts(Template::Template0.context_bits());

decode_generic_region(
    &mut region,
    &params,
    GenericRegionCoding::Arithmetic {
        decoder: &mut decoder,
        contexts: &mut contexts,
    },
)?;

println!("{} bytes per row", region.stride());
# Ok::<(), jbig2_region::DecodeError>(())
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

mod arithmetic_decoder;
mod bitmap;
mod cursor;
mod decode;
mod error;
mod huffman;
mod integer_decoder;
mod mmr;
mod symbol_id_decoder;

pub use arithmetic_decoder::{ArithmeticDecoding, ContextState, MqDecoder, new_contexts};
pub use bitmap::Bitmap;
pub use cursor::PixelCursor;
pub use decode::generic::{GenericRegionCoding, GenericRegionParams, decode_generic_region};
pub use decode::generic_refinement::{RefinementRegionParams, decode_refinement_region};
pub use decode::text::{
    ReferenceCorner, SymbolIdCoding, TextRegionCoding, TextRegionContexts, TextRegionParams,
    decode_text_region,
};
pub use decode::{AdaptiveTemplatePixel, CombinationOperator, RefinementTemplate, Template};
pub use error::{
    DecodeError, HuffmanError, ParseError, RegionError, Result, SymbolError, TemplateError,
};
pub use huffman::{HuffmanDecoding, TextHuffmanTable};
pub use integer_decoder::IntegerContexts;
pub use mmr::{EOFB, MmrDecoding, TwoDimensionalCode};
