//! Round-trip tests for jbig2-region.
//!
//! Streams are produced by the reference encoder in `encoder.rs`. Each test
//! computes every context from the finished image, pixel by pixel, over the
//! neighbourhoods of the figures in T.88. The bit order only has to be a fixed
//! permutation of the decoder's, since contexts are just table indices. The
//! decoders must reproduce the image.

use std::fmt::Write;

use jbig2_region::Bitmap;


/// Read a pixel, 0 outside the bitmap.
fn pixel(bitmap: &Bitmap, x: i32, y: i32) -> usize {
    if x < 0 || y < 0 || x >= bitmap.width() as i32 || y >= bitmap.height() as i32 {
        0
    } else {
        usize::from(bitmap.get_pixel(x as u32, y))
    }
}

/// Build a bitmap from a pixel function.
fn draw(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Bitmap {
    let mut bitmap = Bitmap::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            bitmap.set_pixel(x, y, f(x, y));
        }
    }
    bitmap
}

/// Build a bitmap from rows of `#` and `.`.
fn parse(rows: &[&str]) -> Bitmap {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, |row| row.len() as u32);
    draw(width, height, |x, y| rows[y as usize].as_bytes()[x as usize] == b'#')
}

fn render(bitmap: &Bitmap) -> String {
    let mut out = String::new();
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            out.push(if bitmap.get_pixel(x, y as i32) { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}

#[track_caller]
fn assert_bitmap_eq(actual: &Bitmap, expected: &Bitmap) {
    if actual != expected {
        let mut message = String::new();
        let _ = writeln!(message, "bitmaps differ\nexpected:\n{}", render(expected));
        let _ = writeln!(message, "actual:\n{}", render(actual));
        panic!("{message}");
    }
}

/// A bi-level test image with text-like strokes, blank rows and repeated
/// rows.
fn sample_image(width: u32, height: u32) -> Bitmap {
    draw(width, height, |x, y| {
        let y = match y {
            0..=1 => return false,
            9..=11 => 8,
            y => y,
        };
        let stroke = (x / 3 + y / 4) % 5 == 0;
        let dots = (x * 7 + y * 13) % 11 < 3;
        stroke || (dots && x % 17 > 4)
    })
}
