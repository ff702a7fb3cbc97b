//! Generic region decoding procedure (6.2).

use alloc::vec::Vec;
use core::sync::atomic::AtomicBool;

use log::{debug, warn};

use super::{
    AdaptiveTemplatePixel, Template, check_adaptive_pixels, check_cancelled, check_context_table,
};
use crate::arithmetic_decoder::{ArithmeticDecoding, ContextState};
use crate::bitmap::Bitmap;
use crate::cursor::PixelCursor;
use crate::error::{DecodeError, RegionError, Result, bail};
use crate::mmr::{EOFB, MmrDecoding, TwoDimensionalCode};

/// Parameters of a generic region (Table 2).
#[derive(Debug, Clone, Copy)]
pub struct GenericRegionParams<'a> {
    /// GBTEMPLATE. Ignored for MMR.
    pub template: Template,
    /// TPGDON. Ignored for MMR.
    pub tpgdon: bool,
    /// SKIP: pixels set here are not decoded and stay 0. Must have the size
    /// of the region.
    pub skip: Option<&'a Bitmap>,
    /// GBAT: four pixels for template 0, one otherwise. Ignored for MMR.
    pub adaptive_template_pixels: &'a [AdaptiveTemplatePixel],
    /// Polled once per row.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> GenericRegionParams<'a> {
    /// Parameters with the nominal adaptive pixels of `template` and no
    /// typical prediction.
    pub fn new(template: Template) -> Self {
        Self {
            template,
            tpgdon: false,
            skip: None,
            adaptive_template_pixels: AdaptiveTemplatePixel::nominal(template),
            cancel: None,
        }
    }
}

/// The entropy coding of a generic region (MMR, 6.2.2).
pub enum GenericRegionCoding<'a> {
    /// "6.2.5 Decoding using a template and arithmetic coding"
    Arithmetic {
        /// The arithmetic decoder positioned at the region data.
        decoder: &'a mut dyn ArithmeticDecoding,
        /// GB contexts, at least `1 << template.context_bits()` of them.
        contexts: &'a mut [ContextState],
    },
    /// "6.2.6 Decoding using MMR coding"
    Mmr {
        /// The code-word reader positioned at the region data.
        decoder: &'a mut dyn MmrDecoding,
        /// The number of data bytes, if the segment declares it.
        data_length: Option<u32>,
    },
}

/// Decode a generic region into `region`.
///
/// The region is cleared first. On error, the rows decoded so far are kept.
pub fn decode_generic_region(
    region: &mut Bitmap,
    params: &GenericRegionParams<'_>,
    coding: GenericRegionCoding<'_>,
) -> Result<()> {
    check_signed_dimensions(region)?;

    if let Some(skip) = params.skip
        && (skip.width() != region.width() || skip.height() != region.height())
    {
        bail!(RegionError::DimensionMismatch);
    }

    match coding {
        GenericRegionCoding::Arithmetic { decoder, contexts } => {
            let template = params.template;
            check_adaptive_pixels(
                params.adaptive_template_pixels.len(),
                template.adaptive_template_pixels(),
            )?;
            check_context_table(contexts.len(), template.context_bits())?;

            debug!(
                "decoding {}x{} generic region, {template:?}, TPGDON {}",
                region.width(),
                region.height(),
                params.tpgdon
            );

            region.clear(false);
            decode_bitmap_arithmetic_coding(region, params, decoder, contexts)
        }
        GenericRegionCoding::Mmr {
            decoder,
            data_length,
        } => {
            debug!(
                "decoding {}x{} MMR generic region",
                region.width(),
                region.height()
            );

            region.clear(false);
            decode_bitmap_mmr(region, params.cancel, decoder, data_length)
        }
    }
}

/// Check that every coordinate of `bitmap` is representable as `i32`.
pub(crate) fn check_signed_dimensions(bitmap: &Bitmap) -> Result<()> {
    if i32::try_from(bitmap.width()).is_err() || i32::try_from(bitmap.height()).is_err() {
        bail!(DecodeError::Overflow);
    }

    Ok(())
}

/// Decode a bitmap using arithmetic coding (6.2.5).
fn decode_bitmap_arithmetic_coding(
    region: &mut Bitmap,
    params: &GenericRegionParams<'_>,
    decoder: &mut dyn ArithmeticDecoding,
    contexts: &mut [ContextState],
) -> Result<()> {
    let layout = params.template.layout();
    let at_pixels = params.adaptive_template_pixels;
    let num_at = at_pixels.len();
    let above1_window = layout.above1;
    let current_window = layout.current;
    let above2_shift = layout.above2.map_or(0, |window| window.shift);

    let mut above2 = PixelCursor::default();
    let mut above1 = PixelCursor::default();
    let mut at_cursors = [PixelCursor::default(); 4];

    // "1) Set: LTP = 0" (6.2.5.7)
    let mut ltp = false;

    // "3) Decode each row as follows:" (6.2.5.7)
    for y in 0..region.height() {
        check_cancelled(params.cancel)?;

        // "b) If TPGDON is 1, then decode a bit using the arithmetic entropy
        // coder ... Let SLTP be the value of this bit. Set: LTP = LTP XOR SLTP"
        if params.tpgdon {
            ltp ^= decoder.decode_bit(layout.sltp_context, contexts) != 0;
        }

        // "c) If LTP = 1 then set every pixel of the current row of GBREG equal
        // to the corresponding pixel of the row immediately above."
        if ltp {
            if y > 0 {
                region.duplicate_row(y, y - 1);
            }
            continue;
        }

        let row = y as i32;

        // Each window is preloaded so that one more read completes it for x = 0.
        let mut window2 = 0;
        if let Some(window) = layout.above2 {
            above2.seek(-i32::from(window.reach), row - 2);
            window2 = above2.preload(region, u32::from(window.width) - 1);
        }
        above1.seek(-i32::from(above1_window.reach), row - 1);
        let mut window1 = above1.preload(region, u32::from(above1_window.width) - 1);
        let mut current = 0;

        for (cursor, pixel) in at_cursors.iter_mut().zip(at_pixels) {
            cursor.seek(i32::from(pixel.x), row + i32::from(pixel.y));
        }

        // "d) If LTP = 0 then, from left to right, decode each pixel of the
        // current row of GBREG."
        for x in 0..region.width() {
            if let Some(window) = layout.above2 {
                window2 = ((window2 << 1) | above2.next_pixel(region)) & window.mask();
            }
            window1 = ((window1 << 1) | above1.next_pixel(region)) & above1_window.mask();

            let mut context = (window2 << above2_shift)
                | (window1 << above1_window.shift)
                | (current << current_window.shift);
            for (i, cursor) in at_cursors[..num_at].iter_mut().enumerate() {
                context |= cursor.next_pixel(region) << (num_at - 1 - i);
            }

            // "If USESKIP is 1 and the pixel in the bitmap SKIP at the location
            // corresponding to the current pixel is 1, then set the current pixel
            // to 0." (6.2.5.7)
            let skipped = params.skip.is_some_and(|skip| skip.get_pixel(x, row));
            let pixel = if skipped {
                0
            } else {
                u32::from(decoder.decode_bit(context, contexts))
            };

            if pixel != 0 {
                region.set_pixel(x, y, true);
            }
            current = ((current << 1) | pixel) & current_window.mask();
        }
    }

    Ok(())
}

/// Changing elements of the line being decoded.
///
/// `changes[..=a0i]` are the valid entries: even entries end a white run,
/// odd entries end a black run. `changes[a0i]` is the position of a0.
struct CodingLine {
    changes: Vec<u32>,
    a0i: usize,
    width: u32,
}

impl CodingLine {
    fn new(width: u32) -> Result<Self> {
        let len = width as usize + 2;
        let mut changes = Vec::new();
        changes
            .try_reserve_exact(len)
            .map_err(|_| RegionError::TooLarge)?;
        changes.resize(len, 0);
        changes[0] = width;

        Ok(Self {
            changes,
            a0i: 0,
            width,
        })
    }

    #[inline]
    fn a0(&self) -> i64 {
        i64::from(self.changes[self.a0i])
    }

    #[inline]
    fn is_complete(&self) -> bool {
        self.changes[self.a0i] >= self.width
    }

    /// The changing elements of the finished line followed by two entries at
    /// the line width, which is the form the next line reads as its
    /// reference.
    fn to_reference(&self, reference: &mut Vec<u32>) {
        reference.clear();
        reference.extend(
            self.changes[..=self.a0i]
                .iter()
                .take_while(|&&change| change < self.width),
        );
        reference.extend([self.width; 2]);
    }

    fn start_line(&mut self) {
        self.changes[0] = 0;
        self.a0i = 0;
    }

    /// Extend the run ending at a0 to `a1` in the given color.
    #[inline]
    fn add(&mut self, a1: i64, black: bool) {
        if a1 > self.a0() {
            let a1 = a1.min(i64::from(self.width)) as u32;
            if (self.a0i & 1 == 1) != black {
                self.a0i += 1;
            }
            self.changes[self.a0i] = a1;
        }
    }

    /// Like [`add`](Self::add), but `a1` may lie left of a0, which moves a0
    /// back.
    #[inline]
    fn add_backwards(&mut self, a1: i64, black: bool) {
        if a1 > self.a0() {
            self.add(a1, black);
        } else if a1 < self.a0() {
            let a1 = a1.max(0) as u32;
            while self.a0i > 0 && a1 <= self.changes[self.a0i - 1] {
                self.a0i -= 1;
            }
            self.changes[self.a0i] = a1;
        }
    }

    /// End the line with white pixels.
    fn finish_white(&mut self) {
        self.add(i64::from(self.width), false);
    }

    /// Write the black runs of the finished line into `row` of `region`.
    fn write_row(&self, region: &mut Bitmap, row: u32) {
        for run in self.changes[..=self.a0i].chunks_exact(2) {
            for x in run[0]..run[1].min(self.width) {
                region.set_pixel(x, row, true);
            }
        }
    }
}

#[inline]
fn reference_at(reference: &[u32], index: usize, width: u32) -> i64 {
    i64::from(reference.get(index).copied().unwrap_or(width))
}

/// Read a run length made of make-up codes and one terminating code.
fn read_run(decoder: &mut dyn MmrDecoding, black: bool, width: u32) -> Option<u32> {
    let mut run = 0_u32;

    loop {
        let code = if black {
            decoder.get_black_code()?
        } else {
            decoder.get_white_code()?
        };
        run = run.saturating_add(code);

        if code < 64 || run > width {
            return Some(run);
        }
    }
}

/// Decode a bitmap using MMR coding (6.2.6).
///
/// "Pixels decoded by the MMR decoder having the value 'black' shall be treated
/// as having the value 1." (6.2.6)
fn decode_bitmap_mmr(
    region: &mut Bitmap,
    cancel: Option<&AtomicBool>,
    decoder: &mut dyn MmrDecoding,
    data_length: Option<u32>,
) -> Result<()> {
    let width = region.width();
    let w = i64::from(width);

    decoder.reset();

    let mut line = CodingLine::new(width)?;
    let mut reference = Vec::new();

    for y in 0..region.height() {
        check_cancelled(cancel)?;

        line.to_reference(&mut reference);
        line.start_line();

        let mut b1i = 0_usize;
        let mut black = false;
        let b = |index: usize| reference_at(&reference, index, width);

        // Move b1 to the first changing element right of a0 with the opposite
        // color of a0.
        let advance = |mut b1i: usize, a0: i64| {
            while b(b1i) <= a0 && b(b1i) < w {
                b1i += 2;
            }
            b1i
        };

        while !line.is_complete() {
            let Some(code) = decoder.get_2d_code() else {
                warn!("invalid 2D code in MMR data on row {y}");
                line.finish_white();
                break;
            };

            match code {
                TwoDimensionalCode::Pass => {
                    let b2 = b(b1i + 1);
                    line.add(b2, black);
                    if b2 < w {
                        b1i += 2;
                    }
                }
                TwoDimensionalCode::Horizontal => {
                    let runs = read_run(decoder, black, width)
                        .zip(read_run(decoder, !black, width));
                    let Some((first, second)) = runs else {
                        warn!("invalid run length code in MMR data on row {y}");
                        line.finish_white();
                        break;
                    };

                    line.add(line.a0() + i64::from(first), black);
                    if !line.is_complete() {
                        line.add(line.a0() + i64::from(second), !black);
                    }
                    b1i = advance(b1i, line.a0());
                }
                TwoDimensionalCode::Vertical(offset) if offset >= 0 => {
                    line.add(b(b1i) + i64::from(offset), black);
                    black = !black;
                    if !line.is_complete() {
                        b1i = advance(b1i + 1, line.a0());
                    }
                }
                TwoDimensionalCode::Vertical(offset) => {
                    line.add_backwards(b(b1i) + i64::from(offset), black);
                    black = !black;
                    if !line.is_complete() {
                        b1i = if b1i > 0 { b1i - 1 } else { b1i + 1 };
                        b1i = advance(b1i, line.a0());
                    }
                }
            }
        }

        line.write_row(region, y);
    }

    // "If the number of bytes contained in the encoded bitmap is known in
    // advance, then it is permissible for the data stream not to contain an
    // EOFB." (6.2.6)
    match data_length {
        Some(length) => decoder.skip_to(length),
        None => {
            if decoder.get_24_bits() != EOFB {
                warn!("missing EOFB at the end of MMR data");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use core::sync::atomic::Ordering;

    use super::*;
    use crate::arithmetic_decoder::new_contexts;
    use crate::error::TemplateError;
    use crate::mmr::TwoDimensionalCode::{Horizontal, Pass, Vertical};

    /// Replays scripted bits, or zeros once the script is exhausted.
    #[derive(Default)]
    struct Script {
        bits: Vec<u8>,
        contexts: Vec<u32>,
    }

    impl Script {
        fn new(bits: &[u8]) -> Self {
            Self {
                bits: bits.to_vec(),
                contexts: Vec::new(),
            }
        }
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

    fn decode(region: &mut Bitmap, params: &GenericRegionParams<'_>, script: &mut Script) -> Result<()> {
        let mut contexts = new_contexts(params.template.context_bits());
        decode_generic_region(
            region,
            params,
            GenericRegionCoding::Arithmetic {
                decoder: script,
                contexts: &mut contexts,
            },
        )
    }

    fn row(bitmap: &Bitmap, y: u32) -> Vec<bool> {
        (0..bitmap.width()).map(|x| bitmap.get_pixel(x, y as i32)).collect()
    }

    #[test]
    fn typical_prediction_costs_one_call_per_row() {
        let mut region = Bitmap::new(8, 3).unwrap();
        let params = GenericRegionParams {
            tpgdon: true,
            ..GenericRegionParams::new(Template::Template0)
        };
        // Row 0: SLTP 0, then eight pixels. Row 1: SLTP 1. Row 2: SLTP 0.
        let mut script = Script::new(&[0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 0]);
        decode(&mut region, &params, &mut script).unwrap();

        assert_eq!(script.contexts.len(), 11);
        assert_eq!(script.contexts[0], 0x3953);
        assert_eq!(script.contexts[9], 0x3953);
        assert_eq!(script.contexts[10], 0x3953);
        assert_eq!(
            row(&region, 0),
            [true, false, true, true, false, false, true, true]
        );
        assert_eq!(row(&region, 1), row(&region, 0));
        assert_eq!(row(&region, 2), row(&region, 0));
    }

    #[test]
    fn typical_prediction_on_first_row_leaves_it_blank() {
        let mut region = Bitmap::new_with(4, 1, true).unwrap();
        let params = GenericRegionParams {
            tpgdon: true,
            ..GenericRegionParams::new(Template::Template2)
        };
        let mut script = Script::new(&[1]);
        decode(&mut region, &params, &mut script).unwrap();

        assert_eq!(script.contexts, [0x0e3]);
        assert_eq!(row(&region, 0), [false; 4]);
    }

    #[test]
    fn skipped_pixels_are_zero_without_decoding() {
        let mut region = Bitmap::new(4, 2).unwrap();
        let mut skip = Bitmap::new(4, 2).unwrap();
        skip.set_pixel(1, 0, true);
        skip.set_pixel(3, 1, true);

        let params = GenericRegionParams {
            skip: Some(&skip),
            ..GenericRegionParams::new(Template::Template3)
        };
        let mut script = Script::new(&[1; 6]);
        decode(&mut region, &params, &mut script).unwrap();

        assert_eq!(script.contexts.len(), 6);
        assert_eq!(row(&region, 0), [true, false, true, true]);
        assert_eq!(row(&region, 1), [true, true, true, false]);
    }

    #[test]
    fn context_from_current_row() {
        let mut region = Bitmap::new(3, 1).unwrap();
        let mut script = Script::new(&[1, 0, 0]);
        decode(&mut region, &GenericRegionParams::new(Template::Template3), &mut script).unwrap();

        // x - 1 is the lowest bit of the current-row window, at bit 1.
        assert_eq!(script.contexts, [0b0, 0b10, 0b100]);
    }

    #[test]
    fn context_from_rows_above() {
        let mut region = Bitmap::new(1, 3).unwrap();
        let mut script = Script::new(&[1, 0, 0]);
        decode(&mut region, &GenericRegionParams::new(Template::Template1), &mut script).unwrap();

        // (x, y - 1) is bit 2 of the row-above window at bit 4; (x, y - 2) is
        // bit 2 of the window at bit 9.
        assert_eq!(script.contexts, [0, 1 << 6, 1 << 11]);
    }

    #[test]
    fn adaptive_pixel_bits_are_ordered() {
        let mut region = Bitmap::new(2, 1).unwrap();
        let at = [
            AdaptiveTemplatePixel { x: -1, y: 0 },
            AdaptiveTemplatePixel { x: -2, y: 0 },
            AdaptiveTemplatePixel { x: -3, y: 0 },
            AdaptiveTemplatePixel { x: -4, y: 0 },
        ];
        let params = GenericRegionParams {
            adaptive_template_pixels: &at,
            ..GenericRegionParams::new(Template::Template0)
        };
        let mut script = Script::new(&[1, 0]);
        decode(&mut region, &params, &mut script).unwrap();

        // Pixel (0, 0) is both x - 1 of the current row and the first AT pixel.
        assert_eq!(script.contexts, [0, (1 << 4) | (1 << 3)]);
    }

    #[test]
    fn invalid_parameters_leave_region_untouched() {
        let mut region = Bitmap::new_with(4, 4, true).unwrap();
        let original = region.clone();

        let params = GenericRegionParams {
            adaptive_template_pixels: &[],
            ..GenericRegionParams::new(Template::Template0)
        };
        assert_eq!(
            decode(&mut region, &params, &mut Script::default()),
            Err(TemplateError::InvalidAtPixelCount.into())
        );

        let skip = Bitmap::new(3, 4).unwrap();
        let params = GenericRegionParams {
            skip: Some(&skip),
            ..GenericRegionParams::new(Template::Template1)
        };
        assert_eq!(
            decode(&mut region, &params, &mut Script::default()),
            Err(RegionError::DimensionMismatch.into())
        );

        let mut contexts = new_contexts(10);
        let result = decode_generic_region(
            &mut region,
            &GenericRegionParams::new(Template::Template0),
            GenericRegionCoding::Arithmetic {
                decoder: &mut Script::default(),
                contexts: &mut contexts,
            },
        );
        assert_eq!(result, Err(TemplateError::ContextTableTooSmall.into()));

        assert_eq!(region, original);
    }

    #[test]
    fn cancellation_stops_decoding() {
        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);

        let mut region = Bitmap::new(4, 4).unwrap();
        let params = GenericRegionParams {
            cancel: Some(&cancel),
            ..GenericRegionParams::new(Template::Template0)
        };
        let mut script = Script::default();
        assert_eq!(
            decode(&mut region, &params, &mut script),
            Err(DecodeError::Cancelled)
        );
        assert!(script.contexts.is_empty());
    }

    #[derive(Default)]
    struct MmrScript {
        codes: Vec<Option<TwoDimensionalCode>>,
        white: Vec<u32>,
        black: Vec<u32>,
        tail: u32,
        resets: u32,
        skipped_to: Option<u32>,
        read_tail: bool,
    }

    impl MmrDecoding for MmrScript {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn get_2d_code(&mut self) -> Option<TwoDimensionalCode> {
            if self.codes.is_empty() {
                None
            } else {
                self.codes.remove(0)
            }
        }

        fn get_white_code(&mut self) -> Option<u32> {
            (!self.white.is_empty()).then(|| self.white.remove(0))
        }

        fn get_black_code(&mut self) -> Option<u32> {
            (!self.black.is_empty()).then(|| self.black.remove(0))
        }

        fn get_24_bits(&mut self) -> u32 {
            self.read_tail = true;
            self.tail
        }

        fn skip_to(&mut self, length: u32) {
            self.skipped_to = Some(length);
        }
    }

    fn decode_mmr(region: &mut Bitmap, script: &mut MmrScript, data_length: Option<u32>) {
        decode_generic_region(
            region,
            &GenericRegionParams::new(Template::Template0),
            GenericRegionCoding::Mmr {
                decoder: script,
                data_length,
            },
        )
        .unwrap();
    }

    #[test]
    fn mmr_horizontal_then_vertical() {
        let mut region = Bitmap::new(8, 2).unwrap();
        let mut script = MmrScript {
            // Row 0: H(2 white, 3 black), V0 to the end.
            // Row 1: V0 three times copies row 0.
            codes: vec![
                Some(Horizontal),
                Some(Vertical(0)),
                Some(Vertical(0)),
                Some(Vertical(0)),
                Some(Vertical(0)),
            ],
            white: vec![2],
            black: vec![3],
            tail: EOFB,
            ..MmrScript::default()
        };
        decode_mmr(&mut region, &mut script, None);

        let expected = [false, false, true, true, true, false, false, false];
        assert_eq!(row(&region, 0), expected);
        assert_eq!(row(&region, 1), expected);
        assert_eq!(script.resets, 1);
        assert!(script.read_tail);
        assert!(script.codes.is_empty());
    }

    #[test]
    fn mmr_vertical_offsets_and_pass() {
        let mut region = Bitmap::new(8, 3).unwrap();
        let mut script = MmrScript {
            codes: vec![
                // Row 0: black from 2 to 5.
                Some(Horizontal),
                Some(Vertical(0)),
                // Row 1: VR1, VL1, V0 gives black from 3 to 4.
                Some(Vertical(1)),
                Some(Vertical(-1)),
                Some(Vertical(0)),
                // Row 2: pass over the run, then V0 at the end.
                Some(Pass),
                Some(Vertical(0)),
            ],
            white: vec![2],
            black: vec![3],
            tail: EOFB,
            ..MmrScript::default()
        };
        decode_mmr(&mut region, &mut script, None);

        assert_eq!(
            row(&region, 0),
            [false, false, true, true, true, false, false, false]
        );
        assert_eq!(
            row(&region, 1),
            [false, false, false, true, false, false, false, false]
        );
        assert_eq!(row(&region, 2), [false; 8]);
        assert!(script.codes.is_empty());
    }

    #[test]
    fn mmr_makeup_codes_add_up() {
        let mut region = Bitmap::new(100, 1).unwrap();
        let mut script = MmrScript {
            codes: vec![Some(Horizontal), Some(Vertical(0))],
            white: vec![64, 6],
            black: vec![10],
            ..MmrScript::default()
        };
        decode_mmr(&mut region, &mut script, Some(7));

        let set: Vec<u32> = (0..100).filter(|&x| region.get_pixel(x, 0)).collect();
        assert_eq!(set, (70..80).collect::<Vec<_>>());
        assert_eq!(script.skipped_to, Some(7));
        assert!(!script.read_tail);
    }

    #[test]
    fn mmr_invalid_code_ends_line() {
        let mut region = Bitmap::new(4, 2).unwrap();
        let mut script = MmrScript {
            // Row 0: invalid code. Row 1: all black via H(0, 4).
            codes: vec![None, Some(Horizontal)],
            white: vec![0],
            black: vec![4],
            tail: 0,
            ..MmrScript::default()
        };
        decode_mmr(&mut region, &mut script, None);

        assert_eq!(row(&region, 0), [false; 4]);
        assert_eq!(row(&region, 1), [true; 4]);
        // A missing EOFB is only a warning.
        assert!(script.read_tail);
    }
}
