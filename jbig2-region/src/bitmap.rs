//! Packed bi-level bitmaps.
//!
//! "The variable whose value is the result of this decoding procedure is shown
//! in Table 3." (6.2.3)
//!
//! Pixels are stored one bit each, MSB first, with every row padded to a
//! whole number of bytes. The padding bits are always zero.

use alloc::vec::Vec;

use crate::decode::CombinationOperator;
use crate::error::{RegionError, Result, bail};

/// A bi-level bitmap.
///
/// A set bit (`true`) is a foreground (black) pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    /// Number of bytes per row.
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create a new bitmap filled with background pixels.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::new_with(width, height, false)
    }

    /// Create a new bitmap with every pixel set to `value`.
    pub fn new_with(width: u32, height: u32, value: bool) -> Result<Self> {
        check_height(height)?;
        let stride = (width as usize).div_ceil(8);
        let len = stride
            .checked_mul(height as usize)
            .ok_or(RegionError::TooLarge)?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| RegionError::TooLarge)?;
        data.resize(len, if value { 0xff } else { 0x00 });

        let mut bitmap = Self {
            width,
            height,
            stride,
            data,
        };
        bitmap.clear_padding();

        Ok(bitmap)
    }

    /// Create a bitmap from row-padded, MSB-first packed data.
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_height(height)?;
        let stride = (width as usize).div_ceil(8);

        if Some(data.len()) != stride.checked_mul(height as usize) {
            return Err(RegionError::DimensionMismatch.into());
        }

        let mut bitmap = Self {
            width,
            height,
            stride,
            data,
        };
        bitmap.clear_padding();

        Ok(bitmap)
    }

    /// The width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The number of bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The packed pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the pixel at (x, y).
    ///
    /// A negative `y` reads row 0. Some streams reference the row above a
    /// bitmap's first row, and reading row 0 for it is what existing decoders
    /// do. Every other coordinate must be inside the bitmap; use
    /// [`PixelCursor`](crate::PixelCursor) for zero-padded reads.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: i32) -> bool {
        debug_assert!(x < self.width, "x out of bounds");
        let y = y.max(0) as usize;
        let byte = self.data[y * self.stride + (x as usize >> 3)];

        (byte >> (7 - (x & 7))) & 1 != 0
    }

    /// Set the pixel at (x, y). The coordinates must be inside the bitmap.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, value: bool) {
        debug_assert!(x < self.width, "x out of bounds");
        let idx = y as usize * self.stride + (x as usize >> 3);
        let mask = 0x80 >> (x & 7);

        if value {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// Set every pixel to `value`.
    pub fn clear(&mut self, value: bool) {
        self.data.fill(if value { 0xff } else { 0x00 });
        self.clear_padding();
    }

    /// Copy every pixel of row `src_row` into row `dest_row`.
    pub fn duplicate_row(&mut self, dest_row: u32, src_row: u32) {
        let src = src_row as usize * self.stride;
        let dest = dest_row as usize * self.stride;
        self.data.copy_within(src..src + self.stride, dest);
    }

    /// Combine `source` into this bitmap with its top-left corner at (x, y).
    ///
    /// "These operators describe how the segment's bitmap is to be combined with
    /// the page bitmap." (7.4.1.5)
    ///
    /// Source pixels that fall outside this bitmap are dropped.
    pub fn combine(&mut self, source: &Self, x: i32, y: i32, operator: CombinationOperator) {
        let x = i64::from(x);
        let y = i64::from(y);

        for sy in 0..source.height {
            let dest_y = y + i64::from(sy);
            if dest_y < 0 {
                continue;
            }
            if dest_y >= i64::from(self.height) {
                break;
            }

            for sx in 0..source.width {
                let dest_x = x + i64::from(sx);
                if dest_x < 0 {
                    continue;
                }
                if dest_x >= i64::from(self.width) {
                    break;
                }

                let src_pixel = source.get_pixel(sx, sy as i32);
                let dst_pixel = self.get_pixel(dest_x as u32, dest_y as i32);
                let result = operator.apply(dst_pixel, src_pixel);

                if result != dst_pixel {
                    self.set_pixel(dest_x as u32, dest_y as u32, result);
                }
            }
        }
    }

    /// Grow the bitmap to `new_height` rows. Existing rows are kept and new rows
    /// are filled with `value`. A height that is not larger is a no-op.
    pub fn expand(&mut self, new_height: u32, value: bool) -> Result<()> {
        if new_height <= self.height {
            return Ok(());
        }
        check_height(new_height)?;

        let new_len = self
            .stride
            .checked_mul(new_height as usize)
            .ok_or(RegionError::TooLarge)?;
        self.data
            .try_reserve_exact(new_len - self.data.len())
            .map_err(|_| RegionError::TooLarge)?;
        self.data.resize(new_len, if value { 0xff } else { 0x00 });
        self.height = new_height;
        self.clear_padding();

        Ok(())
    }

    /// Copy the `width` × `height` rectangle at (x, y) into a new bitmap.
    /// Parts of the rectangle outside this bitmap are background.
    pub fn slice(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        let mut out = Self::new(width, height)?;

        let rows = height.min(self.height.saturating_sub(y));
        let cols = width.min(self.width.saturating_sub(x));

        for sy in 0..rows {
            for sx in 0..cols {
                if self.get_pixel(x + sx, (y + sy) as i32) {
                    out.set_pixel(sx, sy, true);
                }
            }
        }

        Ok(out)
    }

    /// Serialize the bitmap as row-padded, MSB-first packed bytes.
    ///
    /// With `invert`, every pixel is flipped, which is what consumers that treat
    /// a set bit as white expect. Padding bits are zero either way.
    pub fn export_packed(&self, invert: bool) -> Vec<u8> {
        let mut out = self.data.clone();

        if invert {
            for byte in &mut out {
                *byte = !*byte;
            }
            clear_padding(&mut out, self.width, self.stride);
        }

        out
    }

    /// Convert the bitmap into an 8-bit grayscale image with black foreground.
    #[cfg(feature = "image")]
    pub fn to_luma_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get_pixel(x, y as i32) { 0 } else { 255 }])
        })
    }

    fn clear_padding(&mut self) {
        clear_padding(&mut self.data, self.width, self.stride);
    }
}

/// Rows are addressed with signed coordinates, so the height must fit in an
/// `i32`.
fn check_height(height: u32) -> Result<()> {
    if i32::try_from(height).is_err() {
        bail!(RegionError::InvalidDimension);
    }

    Ok(())
}

fn clear_padding(data: &mut [u8], width: u32, stride: usize) {
    let used = width % 8;
    if used == 0 || stride == 0 {
        return;
    }

    let mask = 0xff_u8 << (8 - used);
    for row in data.chunks_exact_mut(stride) {
        row[stride - 1] &= mask;
    }
}
