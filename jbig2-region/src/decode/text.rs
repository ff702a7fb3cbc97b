//! Text region decoding procedure (6.4).

use alloc::vec::Vec;
use core::sync::atomic::AtomicBool;

use log::{debug, warn};

use super::generic::check_signed_dimensions;
use super::generic_refinement::{RefinementRegionParams, decode_refinement_region};
use super::{
    AdaptiveTemplatePixel, CombinationOperator, RefinementTemplate, check_adaptive_pixels,
    check_cancelled, check_context_table,
};
use crate::arithmetic_decoder::{
    ArithmeticDecoding, ContextState, MqDecoder, new_contexts, try_new_contexts,
};
use crate::bitmap::Bitmap;
use crate::error::{DecodeError, HuffmanError, RegionError, Result, SymbolError, bail};
use crate::huffman::{HuffmanDecoding, TextHuffmanTable};
use crate::integer_decoder::IntegerContexts;

/// The longest symbol ID the IAID procedure can produce in 32 bits.
const MAX_SYMBOL_CODE_LENGTH: u32 = 31;

/// Reference corner for symbol placement (REFCORNER, 6.4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceCorner {
    /// 0
    BottomLeft,
    /// 1
    TopLeft,
    /// 2
    BottomRight,
    /// 3
    TopRight,
}

/// Parameters of a text region (Table 9).
#[derive(Debug, Clone, Copy)]
pub struct TextRegionParams<'a> {
    /// SBSYMS. A symbol ID indexes this list.
    pub symbols: &'a [&'a Bitmap],
    /// SBNUMINSTANCES.
    pub num_instances: u32,
    /// LOGSBSTRIPS, 0 to 3.
    pub log_strip_size: u8,
    /// SBDEFPIXEL.
    pub default_pixel: bool,
    /// SBCOMBOP.
    pub combination_operator: CombinationOperator,
    /// TRANSPOSED.
    pub transposed: bool,
    /// REFCORNER.
    pub reference_corner: ReferenceCorner,
    /// SBDSOFFSET.
    pub delta_s_offset: i32,
    /// SBREFINE.
    pub refine: bool,
    /// SBRTEMPLATE.
    pub refinement_template: RefinementTemplate,
    /// SBRAT.
    pub refinement_at_pixels: &'a [AdaptiveTemplatePixel],
    /// Polled once per symbol instance.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> TextRegionParams<'a> {
    /// Parameters for `num_instances` unrefined instances of `symbols`,
    /// top-left anchored and OR-combined onto a background region.
    pub fn new(symbols: &'a [&'a Bitmap], num_instances: u32) -> Self {
        Self {
            symbols,
            num_instances,
            log_strip_size: 0,
            default_pixel: false,
            combination_operator: CombinationOperator::Or,
            transposed: false,
            reference_corner: ReferenceCorner::TopLeft,
            delta_s_offset: 0,
            refine: false,
            refinement_template: RefinementTemplate::Template0,
            refinement_at_pixels: AdaptiveTemplatePixel::nominal_refinement(
                RefinementTemplate::Template0,
            ),
            cancel: None,
        }
    }
}

/// Arithmetic decoder contexts of a text region (6.4.6 to 6.4.11).
#[derive(Debug, Clone)]
pub struct TextRegionContexts {
    /// IADT: Strip delta T (6.4.6)
    iadt: IntegerContexts,
    /// IAFS: First symbol S coordinate (6.4.7)
    iafs: IntegerContexts,
    /// IADS: Subsequent symbol S coordinate (6.4.8)
    iads: IntegerContexts,
    /// IAIT: Symbol instance T coordinate (6.4.9)
    iait: IntegerContexts,
    /// IAID: Symbol ID (6.4.10)
    iaid: Vec<ContextState>,
    symbol_code_length: u32,
    /// IARI: Refinement image indicator (6.4.11)
    iari: IntegerContexts,
    /// IARDW: Refinement delta width (6.4.11.1)
    iardw: IntegerContexts,
    /// IARDH: Refinement delta height (6.4.11.2)
    iardh: IntegerContexts,
    /// IARDX: Refinement X offset (6.4.11.3)
    iardx: IntegerContexts,
    /// IARDY: Refinement Y offset (6.4.11.4)
    iardy: IntegerContexts,
    /// GR contexts of refined instances.
    refinement: Vec<ContextState>,
}

impl TextRegionContexts {
    /// Fresh contexts for a region over `num_symbols` symbols.
    ///
    /// "SBSYMCODELEN = ⌈log2(SBNUMSYMS)⌉" (6.4.10)
    ///
    /// The IAID table has `2^SBSYMCODELEN` entries. A code length above 31 is
    /// rejected and a table that cannot be allocated is an error.
    pub fn new(num_symbols: u32, refinement_template: RefinementTemplate) -> Result<Self> {
        let symbol_code_length = u32::BITS - num_symbols.saturating_sub(1).leading_zeros();
        if symbol_code_length > MAX_SYMBOL_CODE_LENGTH {
            bail!(SymbolError::TooManySymbols);
        }

        Ok(Self {
            iadt: IntegerContexts::new(),
            iafs: IntegerContexts::new(),
            iads: IntegerContexts::new(),
            iait: IntegerContexts::new(),
            iaid: try_new_contexts(symbol_code_length)?,
            symbol_code_length,
            iari: IntegerContexts::new(),
            iardw: IntegerContexts::new(),
            iardh: IntegerContexts::new(),
            iardx: IntegerContexts::new(),
            iardy: IntegerContexts::new(),
            refinement: new_contexts(refinement_template.context_bits()),
        })
    }

    /// SBSYMCODELEN.
    pub fn symbol_code_length(&self) -> u32 {
        self.symbol_code_length
    }

    fn integer(&mut self, quantity: Quantity) -> &mut IntegerContexts {
        match quantity {
            Quantity::StripDeltaT => &mut self.iadt,
            Quantity::FirstS => &mut self.iafs,
            Quantity::DeltaS => &mut self.iads,
            Quantity::RefinementDeltaWidth => &mut self.iardw,
            Quantity::RefinementDeltaHeight => &mut self.iardh,
            Quantity::RefinementDeltaX => &mut self.iardx,
            Quantity::RefinementDeltaY => &mut self.iardy,
        }
    }
}

/// How symbol IDs are coded in a Huffman text region (7.4.3.1.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolIdCoding {
    /// Through [`TextHuffmanTable::SymbolId`].
    Table,
    /// As a plain number of the given bit width.
    FixedWidth(u8),
}

/// The entropy coding of a text region (SBHUFF).
pub enum TextRegionCoding<'a> {
    /// SBHUFF = 0.
    Arithmetic {
        /// The arithmetic decoder positioned at the region data.
        decoder: &'a mut dyn ArithmeticDecoding,
        /// Contexts for every coded quantity.
        contexts: &'a mut TextRegionContexts,
    },
    /// SBHUFF = 1.
    Huffman {
        /// The bit reader positioned at the region data.
        decoder: &'a mut dyn HuffmanDecoding,
        /// How symbol IDs are coded.
        symbol_ids: SymbolIdCoding,
    },
}

/// Quantities coded with either an IAx procedure or a Huffman table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    StripDeltaT,
    FirstS,
    DeltaS,
    RefinementDeltaWidth,
    RefinementDeltaHeight,
    RefinementDeltaX,
    RefinementDeltaY,
}

impl Quantity {
    fn table(self) -> TextHuffmanTable {
        match self {
            Self::StripDeltaT => TextHuffmanTable::DeltaT,
            Self::FirstS => TextHuffmanTable::FirstS,
            Self::DeltaS => TextHuffmanTable::DeltaS,
            Self::RefinementDeltaWidth => TextHuffmanTable::RefinementDeltaWidth,
            Self::RefinementDeltaHeight => TextHuffmanTable::RefinementDeltaHeight,
            Self::RefinementDeltaX => TextHuffmanTable::RefinementDeltaX,
            Self::RefinementDeltaY => TextHuffmanTable::RefinementDeltaY,
        }
    }
}

impl TextRegionCoding<'_> {
    fn decode_integer(&mut self, quantity: Quantity) -> Result<Option<i32>> {
        match self {
            Self::Arithmetic { decoder, contexts } => {
                Ok(decoder.decode_int(contexts.integer(quantity)))
            }
            Self::Huffman { decoder, .. } => decoder.decode_int(quantity.table()),
        }
    }

    /// Decode a quantity for which OOB is not allowed.
    fn decode_required(&mut self, quantity: Quantity) -> Result<i32> {
        match self.decode_integer(quantity)? {
            Some(value) => Ok(value),
            None if matches!(self, Self::Huffman { .. }) => {
                Err(HuffmanError::UnexpectedOob.into())
            }
            None => Err(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode the strip delta T, scaled by SBSTRIPS (6.4.6).
    fn read_strip_delta_t(&mut self, strip_size: i32) -> Result<i32> {
        self.decode_required(Quantity::StripDeltaT)?
            .checked_mul(strip_size)
            .ok_or(DecodeError::Overflow)
    }

    /// Decode the T coordinate of an instance within its strip (6.4.9).
    fn read_symbol_t(&mut self, log_strip_size: u8) -> Result<i32> {
        // "If SBSTRIPS = 1, then CURT = 0."
        if log_strip_size == 0 {
            return Ok(0);
        }

        match self {
            Self::Arithmetic { decoder, contexts } => decoder
                .decode_int(&mut contexts.iait)
                .ok_or(SymbolError::UnexpectedOob.into()),
            Self::Huffman { decoder, .. } => Ok(decoder.read_bits(log_strip_size)? as i32),
        }
    }

    /// Decode a symbol ID (6.4.10). Huffman tables may yield negative values.
    fn read_symbol_id(&mut self) -> Result<i64> {
        match self {
            Self::Arithmetic { decoder, contexts } => {
                let code_length = contexts.symbol_code_length;
                Ok(i64::from(
                    decoder.decode_symbol_id(code_length, &mut contexts.iaid),
                ))
            }
            Self::Huffman {
                decoder,
                symbol_ids: SymbolIdCoding::Table,
            } => decoder
                .decode_int(TextHuffmanTable::SymbolId)?
                .map(i64::from)
                .ok_or(HuffmanError::UnexpectedOob.into()),
            Self::Huffman {
                decoder,
                symbol_ids: SymbolIdCoding::FixedWidth(bits),
            } => Ok(i64::from(decoder.read_bits(*bits)?)),
        }
    }

    /// Decode the refinement indicator R_I (6.4.11).
    fn read_refinement_flag(&mut self) -> Result<bool> {
        match self {
            Self::Arithmetic { decoder, contexts } => decoder
                .decode_int(&mut contexts.iari)
                .map(|value| value != 0)
                .ok_or(SymbolError::UnexpectedOob.into()),
            Self::Huffman { decoder, .. } => Ok(decoder.read_bit()? != 0),
        }
    }

    /// Decode the refined instance bitmap, steps 5) to 7) of 6.4.11.
    fn decode_refinement_bitmap(
        &mut self,
        refined: &mut Bitmap,
        params: &RefinementRegionParams<'_>,
    ) -> Result<()> {
        match self {
            Self::Arithmetic { decoder, contexts } => {
                decode_refinement_region(refined, params, &mut **decoder, &mut contexts.refinement)
            }
            Self::Huffman { decoder, .. } => {
                let size = decoder
                    .decode_int(TextHuffmanTable::RefinementSize)?
                    .ok_or(HuffmanError::UnexpectedOob)?;
                let size = usize::try_from(size).map_err(|_| HuffmanError::InvalidCode)?;

                // "skip over any bits remaining in the last byte read"
                decoder.align();
                let data = decoder.read_bytes(size)?;

                let mut mq = MqDecoder::new(data);
                let mut contexts = new_contexts(params.template.context_bits());
                decode_refinement_region(refined, params, &mut mq, &mut contexts)
            }
        }
    }
}

/// Decode a text region into `region` (6.4.5).
///
/// The region is first cleared to the default pixel. Instances whose symbol
/// ID does not name a symbol are skipped with a warning.
pub fn decode_text_region(
    region: &mut Bitmap,
    params: &TextRegionParams<'_>,
    mut coding: TextRegionCoding<'_>,
) -> Result<()> {
    check_signed_dimensions(region)?;

    if params.log_strip_size > 3 {
        bail!(RegionError::InvalidDimension);
    }

    if params.refine {
        let template = params.refinement_template;
        check_adaptive_pixels(
            params.refinement_at_pixels.len(),
            template.adaptive_template_pixels(),
        )?;

        if let TextRegionCoding::Arithmetic { contexts, .. } = &coding {
            check_context_table(contexts.refinement.len(), template.context_bits())?;
        }
    }

    debug!(
        "decoding {}x{} text region, {} instances of {} symbols",
        region.width(),
        region.height(),
        params.num_instances,
        params.symbols.len()
    );

    // "1) Fill a bitmap SBREG, of the size given by SBW and SBH, with the
    // SBDEFPIXEL value."
    region.clear(params.default_pixel);

    let strip_size = 1_i32 << params.log_strip_size;

    // "2) Decode the initial STRIPT value as described in 6.4.6. Negate the
    // decoded value and assign this negated value to the variable STRIPT."
    let mut strip_t = coding
        .read_strip_delta_t(strip_size)?
        .checked_neg()
        .ok_or(DecodeError::Overflow)?;
    let mut first_s = 0_i32;
    let mut instances = 0_u32;

    // "4) Decode each strip as follows:"
    'strips: while instances < params.num_instances {
        // "b) Decode the strip's delta T value as described in 6.4.6. Let DT be
        // the decoded value. Set: STRIPT = STRIPT + DT"
        let delta_t = coding.read_strip_delta_t(strip_size)?;
        strip_t = strip_t.checked_add(delta_t).ok_or(DecodeError::Overflow)?;

        // "c) i) If the current symbol instance is the first symbol instance in
        // the strip, then decode the first symbol instance's S coordinate as
        // described in 6.4.7. Let DFS be the decoded value. Set:
        // FIRSTS = FIRSTS + DFS; CURS = FIRSTS"
        let delta_first_s = coding.decode_required(Quantity::FirstS)?;
        first_s = first_s
            .checked_add(delta_first_s)
            .ok_or(DecodeError::Overflow)?;
        let mut current_s = first_s;

        loop {
            check_cancelled(params.cancel)?;

            // "iii) Decode the symbol instance's T coordinate as described in
            // 6.4.9. Let CURT be the decoded value. Set: T = STRIPT + CURT"
            let current_t = coding.read_symbol_t(params.log_strip_size)?;
            let symbol_t = strip_t
                .checked_add(current_t)
                .ok_or(DecodeError::Overflow)?;

            // "iv) Decode the symbol instance's symbol ID as described in 6.4.10."
            let symbol_id = coding.read_symbol_id()?;
            let symbol = usize::try_from(symbol_id)
                .ok()
                .and_then(|id| params.symbols.get(id).copied());

            match symbol {
                Some(symbol) => {
                    // "v) Determine the symbol instance's bitmap IB_I as described
                    // in 6.4.11."
                    let refined = if params.refine && coding.read_refinement_flag()? {
                        Some(decode_refined_instance(&mut coding, symbol, params)?)
                    } else {
                        None
                    };
                    let bitmap = refined.as_ref().unwrap_or(symbol);

                    // "vi) Update CURS ... vii) Set: S_I = CURS ... x) Draw IB_I
                    // into SBREG."
                    current_s = place_instance(region, bitmap, current_s, symbol_t, params)?;
                }
                None => warn!(
                    "symbol ID {symbol_id} out of range, region has {} symbols",
                    params.symbols.len()
                ),
            }

            instances += 1;

            // "ii) Otherwise, decode the symbol instance's S coordinate as
            // described in 6.4.8. If the result of this decoding is OOB then the
            // last symbol instance of the strip has been decoded; proceed to step
            // 4 d)."
            let Some(delta_s) = coding.decode_integer(Quantity::DeltaS)? else {
                break;
            };

            if instances >= params.num_instances {
                warn!("text region strip continues past the declared instance count");
                break 'strips;
            }

            // "Otherwise, let IDS be the decoded value. Set:
            // CURS = CURS + IDS + SBDSOFFSET"
            current_s = current_s
                .checked_add(delta_s)
                .and_then(|s| s.checked_add(params.delta_s_offset))
                .ok_or(DecodeError::Overflow)?;
        }
    }

    Ok(())
}

/// Decode a refined instance bitmap (6.4.11, R_I = 1).
fn decode_refined_instance(
    coding: &mut TextRegionCoding<'_>,
    symbol: &Bitmap,
    params: &TextRegionParams<'_>,
) -> Result<Bitmap> {
    let rdw = coding.decode_required(Quantity::RefinementDeltaWidth)?;
    let rdh = coding.decode_required(Quantity::RefinementDeltaHeight)?;
    let rdx = coding.decode_required(Quantity::RefinementDeltaX)?;
    let rdy = coding.decode_required(Quantity::RefinementDeltaY)?;

    // "GRW = W_IB + RDW, GRH = H_IB + RDH"
    let width = u32::try_from(i64::from(symbol.width()) + i64::from(rdw))
        .map_err(|_| SymbolError::InvalidRefinementSize)?;
    let height = u32::try_from(i64::from(symbol.height()) + i64::from(rdh))
        .map_err(|_| SymbolError::InvalidRefinementSize)?;

    // "GRREFERENCEDX = ⌊RDW / 2⌋ + RDX, GRREFERENCEDY = ⌊RDH / 2⌋ + RDY"
    let reference_dx = rdw
        .div_euclid(2)
        .checked_add(rdx)
        .ok_or(DecodeError::Overflow)?;
    let reference_dy = rdh
        .div_euclid(2)
        .checked_add(rdy)
        .ok_or(DecodeError::Overflow)?;

    let refinement = RefinementRegionParams {
        template: params.refinement_template,
        // "TPGRON = 0"
        tpgron: false,
        reference: symbol,
        reference_dx,
        reference_dy,
        adaptive_template_pixels: params.refinement_at_pixels,
        cancel: params.cancel,
    };

    let mut refined = Bitmap::new(width, height)?;
    coding.decode_refinement_bitmap(&mut refined, &refinement)?;

    Ok(refined)
}

/// Draw one instance and return the updated CURS (6.4.5 steps 3 c) vi) to xi)).
fn place_instance(
    region: &mut Bitmap,
    bitmap: &Bitmap,
    s: i32,
    t: i32,
    params: &TextRegionParams<'_>,
) -> Result<i32> {
    let width = i64::from(bitmap.width());
    let height = i64::from(bitmap.height());
    let corner = params.reference_corner;

    // The extent along S, less one.
    let extent = if params.transposed { height } else { width } - 1;

    // "vi) If TRANSPOSED is 0 and REFCORNER is TOPRIGHT or BOTTOMRIGHT, set:
    // CURS = CURS + W_I - 1. If TRANSPOSED is 1 and REFCORNER is BOTTOMLEFT or
    // BOTTOMRIGHT, set: CURS = CURS + H_I - 1. Otherwise, do not change CURS."
    let advance_first = if params.transposed {
        matches!(
            corner,
            ReferenceCorner::BottomLeft | ReferenceCorner::BottomRight
        )
    } else {
        matches!(corner, ReferenceCorner::TopRight | ReferenceCorner::BottomRight)
    };

    let mut s = i64::from(s);
    if advance_first {
        s += extent;
    }
    let t = i64::from(t);

    let (x, y) = if params.transposed {
        match corner {
            ReferenceCorner::TopLeft => (t, s),
            ReferenceCorner::TopRight => (t - width + 1, s),
            ReferenceCorner::BottomLeft => (t, s - height + 1),
            ReferenceCorner::BottomRight => (t - width + 1, s - height + 1),
        }
    } else {
        match corner {
            ReferenceCorner::TopLeft => (s, t),
            ReferenceCorner::TopRight => (s - width + 1, t),
            ReferenceCorner::BottomLeft => (s, t - height + 1),
            ReferenceCorner::BottomRight => (s - width + 1, t - height + 1),
        }
    };

    let x = i32::try_from(x).map_err(|_| DecodeError::Overflow)?;
    let y = i32::try_from(y).map_err(|_| DecodeError::Overflow)?;
    region.combine(bitmap, x, y, params.combination_operator);

    // "xi) If TRANSPOSED is 0 and REFCORNER is TOPLEFT or BOTTOMLEFT, set:
    // CURS = CURS + W_I - 1. If TRANSPOSED is 1 and REFCORNER is TOPLEFT or
    // TOPRIGHT, set: CURS = CURS + H_I - 1. Otherwise, do not change CURS."
    if !advance_first {
        s += extent;
    }

    i32::try_from(s).map_err(|_| DecodeError::Overflow)
}
