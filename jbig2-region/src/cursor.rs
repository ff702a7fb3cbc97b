//! Zero-padded sequential pixel reads.
//!
//! "Near the edges of the bitmap, these neighbour references might not lie in
//! the actual bitmap. The rule to satisfy out-of-bounds references shall be:
//! All pixels lying outside the bounds of the actual bitmap have the value 0."
//! (6.2.5.2)

use crate::bitmap::Bitmap;

/// A scanning position over a bitmap that reads 0 outside of it.
///
/// The cursor does not borrow the bitmap, so it can walk a region that is
/// written to between two reads. Every [`next_pixel`](Self::next_pixel) moves
/// one pixel to the right, whether or not the read was inside the bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelCursor {
    x: i32,
    y: i32,
}

impl PixelCursor {
    /// Create a cursor at (x, y).
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move the cursor to (x, y).
    #[inline]
    pub fn seek(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    /// The current position.
    #[inline]
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Read the pixel at the current position and advance by one column.
    #[inline(always)]
    pub fn next_pixel(&mut self, bitmap: &Bitmap) -> u32 {
        let pixel = if self.x >= 0
            && (self.x as u32) < bitmap.width()
            && self.y >= 0
            && (self.y as u32) < bitmap.height()
        {
            u32::from(bitmap.get_pixel(self.x as u32, self.y))
        } else {
            0
        };

        self.x = self.x.saturating_add(1);

        pixel
    }

    /// Read `count` pixels, shifting each one into `value` from the right.
    #[inline(always)]
    pub(crate) fn preload(&mut self, bitmap: &Bitmap, count: u32) -> u32 {
        let mut value = 0;
        for _ in 0..count {
            value = (value << 1) | self.next_pixel(bitmap);
        }

        value
    }
}
