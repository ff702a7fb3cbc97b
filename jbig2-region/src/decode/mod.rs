//! Region decoding procedures (6.2, 6.3, 6.4) and the parameters they share.

pub(crate) mod generic;
pub(crate) mod generic_refinement;
pub(crate) mod text;

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DecodeError, RegionError, Result, TemplateError, bail, err};

/// "These operators describe how the segment's bitmap is to be combined with
/// the page bitmap." (7.4.1.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationOperator {
    /// 0 OR
    Or,
    /// 1 AND
    And,
    /// 2 XOR
    Xor,
    /// 3 XNOR
    Xnor,
    /// 4 REPLACE
    Replace,
}

impl CombinationOperator {
    /// Map the numeric operator code used in segment headers.
    pub fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Or),
            1 => Ok(Self::And),
            2 => Ok(Self::Xor),
            3 => Ok(Self::Xnor),
            4 => Ok(Self::Replace),
            _ => err!(RegionError::InvalidCombinationOperator),
        }
    }

    /// Combine a destination pixel with a source pixel.
    #[inline(always)]
    pub fn apply(self, dst: bool, src: bool) -> bool {
        match self {
            Self::Or => dst | src,
            Self::And => dst & src,
            Self::Xor => dst ^ src,
            Self::Xnor => dst == src,
            Self::Replace => src,
        }
    }
}

/// Generic region template (GBTEMPLATE, 6.2.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// 16-pixel template with four adaptive pixels (Figure 3).
    Template0 = 0,
    /// 13-pixel template (Figure 4).
    Template1 = 1,
    /// 10-pixel template over three rows (Figure 5).
    Template2 = 2,
    /// 10-pixel template over two rows (Figure 6).
    Template3 = 3,
}

impl Template {
    /// The number of bits in a context of this template.
    pub fn context_bits(self) -> u32 {
        self.layout().context_bits
    }

    /// "If GBTEMPLATE is 0 ... four adaptive template pixels; otherwise one."
    pub fn adaptive_template_pixels(self) -> usize {
        self.layout().adaptive_pixels
    }

    #[inline(always)]
    pub(crate) fn layout(self) -> &'static ContextLayout {
        &GENERIC_LAYOUTS[self as usize]
    }
}

/// A run of pixels on one row that slides right by one pixel per column.
///
/// The window covers `x - reach ..= x - reach + width - 1` and is placed at
/// bit `shift` of the context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowWindow {
    pub(crate) reach: u8,
    pub(crate) width: u8,
    pub(crate) shift: u8,
}

impl RowWindow {
    #[inline(always)]
    pub(crate) fn mask(self) -> u32 {
        (1 << self.width) - 1
    }
}

/// Fixed context layout of a generic region template.
///
/// A context is `above2 | above1 | current | AT`, where adaptive pixel `i` of
/// `n` sits at bit `n - 1 - i`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContextLayout {
    pub(crate) context_bits: u32,
    pub(crate) adaptive_pixels: usize,
    /// Row y - 2, if the template reaches it.
    pub(crate) above2: Option<RowWindow>,
    /// Row y - 1.
    pub(crate) above1: RowWindow,
    /// Already decoded pixels on row y, ending at x - 1.
    pub(crate) current: RowWindow,
    /// The context used to decode SLTP (Figures 8 to 11).
    pub(crate) sltp_context: u32,
}

pub(crate) const GENERIC_LAYOUTS: [ContextLayout; 4] = [
    ContextLayout {
        context_bits: 16,
        adaptive_pixels: 4,
        above2: Some(RowWindow {
            reach: 1,
            width: 3,
            shift: 13,
        }),
        above1: RowWindow {
            reach: 2,
            width: 5,
            shift: 8,
        },
        current: RowWindow {
            reach: 4,
            width: 4,
            shift: 4,
        },
        sltp_context: 0x3953,
    },
    ContextLayout {
        context_bits: 13,
        adaptive_pixels: 1,
        above2: Some(RowWindow {
            reach: 1,
            width: 4,
            shift: 9,
        }),
        above1: RowWindow {
            reach: 2,
            width: 5,
            shift: 4,
        },
        current: RowWindow {
            reach: 3,
            width: 3,
            shift: 1,
        },
        sltp_context: 0x079a,
    },
    ContextLayout {
        context_bits: 10,
        adaptive_pixels: 1,
        above2: Some(RowWindow {
            reach: 1,
            width: 3,
            shift: 7,
        }),
        above1: RowWindow {
            reach: 2,
            width: 4,
            shift: 3,
        },
        current: RowWindow {
            reach: 2,
            width: 2,
            shift: 1,
        },
        sltp_context: 0x0e3,
    },
    ContextLayout {
        context_bits: 10,
        adaptive_pixels: 1,
        above2: None,
        above1: RowWindow {
            reach: 3,
            width: 5,
            shift: 5,
        },
        current: RowWindow {
            reach: 4,
            width: 4,
            shift: 1,
        },
        // Figure 11 sets the adaptive pixel.
        sltp_context: 0x18b,
    },
];

/// Refinement region template (GRTEMPLATE, 6.3.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementTemplate {
    /// 13-pixel template with two adaptive pixels (Figure 12).
    Template0 = 0,
    /// 10-pixel template (Figure 13).
    Template1 = 1,
}

impl RefinementTemplate {
    /// The number of bits in a context of this template.
    pub fn context_bits(self) -> u32 {
        match self {
            Self::Template0 => 13,
            Self::Template1 => 10,
        }
    }

    /// Two adaptive pixels for template 0, none for template 1.
    pub fn adaptive_template_pixels(self) -> usize {
        match self {
            Self::Template0 => 2,
            Self::Template1 => 0,
        }
    }

    /// The context of SLTP (Figures 14 and 15): only the reference pixel that
    /// corresponds to the pixel being decoded is set.
    pub(crate) fn sltp_context(self) -> u32 {
        match self {
            Self::Template0 => 0x0040,
            Self::Template1 => 0x0008,
        }
    }
}

/// An adaptive template pixel, relative to the pixel being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveTemplatePixel {
    /// Horizontal offset.
    pub x: i8,
    /// Vertical offset.
    pub y: i8,
}

impl AdaptiveTemplatePixel {
    /// The nominal positions of a generic template (6.2.5.3, Figures 3 to 6).
    pub fn nominal(template: Template) -> &'static [Self] {
        match template {
            Template::Template0 => &[
                Self { x: 3, y: -1 },
                Self { x: -3, y: -1 },
                Self { x: 2, y: -2 },
                Self { x: -2, y: -2 },
            ],
            Template::Template1 => &[Self { x: 3, y: -1 }],
            Template::Template2 | Template::Template3 => &[Self { x: 2, y: -1 }],
        }
    }

    /// The nominal positions of a refinement template (6.3.5.3, Figure 12).
    ///
    /// The first pixel is on the region being decoded, the second on the
    /// reference bitmap.
    pub fn nominal_refinement(template: RefinementTemplate) -> &'static [Self] {
        match template {
            RefinementTemplate::Template0 => &[Self { x: -1, y: -1 }, Self { x: -1, y: -1 }],
            RefinementTemplate::Template1 => &[],
        }
    }
}

/// Check that `count` adaptive pixels were supplied where `expected` are
/// needed.
pub(crate) fn check_adaptive_pixels(count: usize, expected: usize) -> Result<()> {
    if count != expected {
        bail!(TemplateError::InvalidAtPixelCount);
    }

    Ok(())
}

/// Check that a context table can hold `1 << bits` contexts.
pub(crate) fn check_context_table(len: usize, bits: u32) -> Result<()> {
    if len < 1 << bits {
        bail!(TemplateError::ContextTableTooSmall);
    }

    Ok(())
}

/// Return `Cancelled` once the caller has raised `cancel`.
#[inline]
pub(crate) fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(DecodeError::Cancelled),
        _ => Ok(()),
    }
}
