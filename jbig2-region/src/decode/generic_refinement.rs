//! Generic refinement region decoding procedure (6.3).

use core::sync::atomic::AtomicBool;

use log::debug;

use super::generic::check_signed_dimensions;
use super::{
    AdaptiveTemplatePixel, RefinementTemplate, check_adaptive_pixels, check_cancelled,
    check_context_table,
};
use crate::arithmetic_decoder::{ArithmeticDecoding, ContextState};
use crate::bitmap::Bitmap;
use crate::cursor::PixelCursor;
use crate::error::Result;

/// Parameters of a refinement region (Table 6).
#[derive(Debug, Clone, Copy)]
pub struct RefinementRegionParams<'a> {
    /// GRTEMPLATE.
    pub template: RefinementTemplate,
    /// TPGRON.
    pub tpgron: bool,
    /// GRREFERENCE.
    pub reference: &'a Bitmap,
    /// GRREFERENCEDX. A pixel (x, y) of the region corresponds to the
    /// reference pixel (x - dx, y - dy).
    pub reference_dx: i32,
    /// GRREFERENCEDY.
    pub reference_dy: i32,
    /// GRAT: for template 0 the first pixel is on the region and the second
    /// on the reference. Template 1 has none.
    pub adaptive_template_pixels: &'a [AdaptiveTemplatePixel],
    /// Polled once per row.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> RefinementRegionParams<'a> {
    /// Parameters with nominal adaptive pixels, no offset and no typical
    /// prediction.
    pub fn new(template: RefinementTemplate, reference: &'a Bitmap) -> Self {
        Self {
            template,
            tpgron: false,
            reference,
            reference_dx: 0,
            reference_dy: 0,
            adaptive_template_pixels: AdaptiveTemplatePixel::nominal_refinement(template),
            cancel: None,
        }
    }
}

/// Clamp a coordinate into `i32`. Anything clamped is outside every bitmap
/// and still reads 0.
#[inline]
fn coordinate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Three horizontally adjacent pixels x - 1, x, x + 1 of one row, read
/// through a cursor.
struct Neighbours {
    cursor: PixelCursor,
    bits: u32,
}

impl Neighbours {
    fn new() -> Self {
        Self {
            cursor: PixelCursor::default(),
            bits: 0,
        }
    }

    /// Position the window for x = 0 of a row whose first pixel is at
    /// `(x, y)` in `bitmap`.
    fn start(&mut self, bitmap: &Bitmap, x: i64, y: i64) {
        self.cursor.seek(coordinate(x - 1), coordinate(y));
        self.bits = self.cursor.preload(bitmap, 2);
    }

    #[inline(always)]
    fn advance(&mut self, bitmap: &Bitmap) -> u32 {
        self.bits = ((self.bits << 1) | self.cursor.next_pixel(bitmap)) & 0b111;
        self.bits
    }
}

/// Decode a refinement region into `region` (6.3.5.6).
///
/// The region is cleared first.
pub fn decode_refinement_region<D: ArithmeticDecoding + ?Sized>(
    region: &mut Bitmap,
    params: &RefinementRegionParams<'_>,
    decoder: &mut D,
    contexts: &mut [ContextState],
) -> Result<()> {
    let template = params.template;
    check_signed_dimensions(region)?;
    check_adaptive_pixels(
        params.adaptive_template_pixels.len(),
        template.adaptive_template_pixels(),
    )?;
    check_context_table(contexts.len(), template.context_bits())?;

    debug!(
        "decoding {}x{} refinement region, {template:?}, offset ({}, {}), TPGRON {}",
        region.width(),
        region.height(),
        params.reference_dx,
        params.reference_dy,
        params.tpgron
    );

    region.clear(false);

    let reference = params.reference;
    let dx = i64::from(params.reference_dx);
    let dy = i64::from(params.reference_dy);

    let mut above = Neighbours::new();
    let mut reference_above = Neighbours::new();
    let mut reference_row = Neighbours::new();
    let mut reference_below = Neighbours::new();
    let mut at_region = PixelCursor::default();
    let mut at_reference = PixelCursor::default();

    // "1) Set: LTP = 0" (6.3.5.6)
    let mut ltp = false;

    // "3) Decode each row as follows:"
    for y in 0..region.height() {
        check_cancelled(params.cancel)?;

        // "b) If TPGRON is 1, then decode a bit using the arithmetic entropy
        // coder ... Let SLTP be the value of this bit. Set: LTP = LTP XOR SLTP"
        if params.tpgron {
            ltp ^= decoder.decode_bit(template.sltp_context(), contexts) != 0;
        }

        let row = i64::from(y);
        above.start(region, 0, row - 1);
        reference_above.start(reference, -dx, row - dy - 1);
        reference_row.start(reference, -dx, row - dy);
        reference_below.start(reference, -dx, row - dy + 1);

        if let [region_at, reference_at] = params.adaptive_template_pixels {
            at_region.seek(
                i32::from(region_at.x),
                coordinate(row + i64::from(region_at.y)),
            );
            at_reference.seek(
                coordinate(i64::from(reference_at.x) - dx),
                coordinate(row + i64::from(reference_at.y) - dy),
            );
        }

        let mut left = 0;

        for x in 0..region.width() {
            let r_above = above.advance(region);
            let ref_above = reference_above.advance(reference);
            let ref_row = reference_row.advance(reference);
            let ref_below = reference_below.advance(reference);

            // "i) Set TPGRPIX equal to 1 if:
            //    - TPGRON is 1 AND;
            //    - a 3 × 3 pixel array in the reference bitmap (Figure 16),
            //      centred at the location corresponding to the current pixel,
            //      contains pixels all of the same value."
            let neighbourhood = ref_above & ref_row & ref_below;
            let empty = ref_above | ref_row | ref_below;
            let predicted = if ltp && neighbourhood == 0b111 {
                Some(1)
            } else if ltp && empty == 0 {
                Some(0)
            } else {
                None
            };

            let pixel = match predicted {
                // "ii) If TPGRPIX is 1 then implicitly decode the current pixel
                // by setting it equal to its predicted value (TPGRVAL)."
                Some(value) => value,
                None => {
                    let context = match template {
                        // Figure 12.
                        RefinementTemplate::Template0 => {
                            let region_at = at_region.next_pixel(region);
                            let reference_at = at_reference.next_pixel(reference);

                            ((r_above & 0b11) << 11)
                                | (left << 10)
                                | ((ref_above & 0b11) << 8)
                                | (ref_row << 5)
                                | (ref_below << 2)
                                | (region_at << 1)
                                | reference_at
                        }
                        // Figure 13.
                        RefinementTemplate::Template1 => {
                            (r_above << 7)
                                | (left << 6)
                                | (((ref_above >> 1) & 1) << 5)
                                | (ref_row << 2)
                                | (ref_below & 0b11)
                        }
                    };

                    u32::from(decoder.decode_bit(context, contexts))
                }
            };

            // Adaptive cursors move with every pixel, decoded or not.
            if predicted.is_some() && template == RefinementTemplate::Template0 {
                at_region.next_pixel(region);
                at_reference.next_pixel(reference);
            }

            if pixel != 0 {
                region.set_pixel(x, y, true);
            }
            left = pixel;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::arithmetic_decoder::new_contexts;
    use crate::error::{DecodeError, TemplateError};

    #[derive(Default)]
    struct Script {
        bits: Vec<u8>,
        contexts: Vec<u32>,
    }

    impl ArithmeticDecoding for Script {
        fn decode_bit(&mut self, context: u32, _: &mut [ContextState]) -> u8 {
            self.contexts.push(context);
            if self.bits.is_empty() {
                0
            } else {
                self.bits.remove(0)
            }
        }
    }

    fn decode(region: &mut Bitmap, params: &RefinementRegionParams<'_>, script: &mut Script) {
        let mut contexts = new_contexts(params.template.context_bits());
        decode_refinement_region(region, params, script, &mut contexts).unwrap();
    }

    #[test]
    fn template1_context() {
        let reference = Bitmap::new_with(3, 3, true).unwrap();
        let mut region = Bitmap::new(3, 3).unwrap();
        let mut script = Script::default();
        decode(
            &mut region,
            &RefinementRegionParams::new(RefinementTemplate::Template1, &reference),
            &mut script,
        );

        // R(x - 1..x + 1, y) = 011 at bit 2, R(x..x + 1, y + 1) = 11 at bit 0.
        assert_eq!(script.contexts[0], 0b01111);
        assert_eq!(script.contexts.len(), 9);
    }

    #[test]
    fn template0_context_with_adaptive_pixels() {
        let reference = Bitmap::new_with(2, 2, true).unwrap();
        let mut region = Bitmap::new(2, 2).unwrap();
        let mut script = Script {
            bits: [1, 0, 0, 0].to_vec(),
            ..Script::default()
        };
        decode(
            &mut region,
            &RefinementRegionParams::new(RefinementTemplate::Template0, &reference),
            &mut script,
        );

        assert_eq!(script.contexts, [0x6c, 0x4d8, 0x1360, 0x2c3]);
    }

    #[test]
    fn reference_offset_maps_pixels() {
        let mut reference = Bitmap::new(2, 2).unwrap();
        reference.set_pixel(0, 0, true);
        let mut region = Bitmap::new(3, 3).unwrap();
        let params = RefinementRegionParams {
            reference_dx: 1,
            reference_dy: 1,
            ..RefinementRegionParams::new(RefinementTemplate::Template1, &reference)
        };
        let mut script = Script::default();
        decode(&mut region, &params, &mut script);

        // Reference pixel (0, 0) corresponds to region pixel (1, 1).
        assert_eq!(script.contexts, [0x01, 0x02, 0, 0x04, 0x08, 0x10, 0, 0x20, 0]);
    }

    #[test]
    fn typical_prediction_skips_uniform_neighbourhoods() {
        let reference = Bitmap::new_with(4, 4, true).unwrap();
        let mut region = Bitmap::new(4, 4).unwrap();
        let params = RefinementRegionParams {
            tpgron: true,
            ..RefinementRegionParams::new(RefinementTemplate::Template0, &reference)
        };
        let mut script = Script {
            // Per row: SLTP, then the pixels whose neighbourhood touches the
            // border.
            bits: [1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1, 1, 1, 1].to_vec(),
            ..Script::default()
        };
        decode(&mut region, &params, &mut script);

        assert!(script.bits.is_empty());
        assert_eq!(script.contexts.len(), 16);
        assert_eq!(script.contexts[0], 0x0040);
        assert_eq!(region, reference);
    }

    #[test]
    fn typical_prediction_predicts_background() {
        let reference = Bitmap::new(3, 3).unwrap();
        let mut region = Bitmap::new(3, 3).unwrap();
        let params = RefinementRegionParams {
            tpgron: true,
            ..RefinementRegionParams::new(RefinementTemplate::Template1, &reference)
        };
        let mut script = Script {
            bits: [1].to_vec(),
            ..Script::default()
        };
        decode(&mut region, &params, &mut script);

        // One SLTP per row, every pixel predicted.
        assert_eq!(script.contexts, [0x0008; 3]);
        assert_eq!(region, reference);
    }

    #[test]
    fn adaptive_pixel_count_is_checked() {
        let reference = Bitmap::new(1, 1).unwrap();
        let mut region = Bitmap::new(1, 1).unwrap();
        let mut contexts = new_contexts(13);

        let params = RefinementRegionParams {
            adaptive_template_pixels: AdaptiveTemplatePixel::nominal_refinement(
                RefinementTemplate::Template0,
            ),
            ..RefinementRegionParams::new(RefinementTemplate::Template1, &reference)
        };
        assert_eq!(
            decode_refinement_region(&mut region, &params, &mut Script::default(), &mut contexts),
            Err(DecodeError::Template(TemplateError::InvalidAtPixelCount))
        );
    }
}
