// SPDX-License-Identifier: MIT
//
// Palette entries — one renderable terminal cell color.
//
// A `PaletteColor` pairs *how* to draw a cell (`ColorKind`: which SGR codes,
// which glyph) with *what it looks like* (the RGB the search compares
// against, plus derived HSV used for canonical ordering).
//
// Blended kinds draw a shade glyph (░ ▒ ▓) in a foreground color over a
// background color. Their RGB is the root-mean-square mix of the two
// register colors, weighted by the glyph's coverage in quarters:
//
//   channel = sqrt((w·fg² + (4 − w)·bg²) / 4)
//
// Only unbolded ANSI colors and extended colors can be a background; bold is
// a foreground-only attribute on most terminals.

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use crate::ansi;
use crate::color::{Hsv, Rgb};
use crate::error::{Error, Result};

// ─── Blend Level ─────────────────────────────────────────────────────────────

/// Foreground coverage of a blended cell, in quarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendLevel {
    /// Background only (blank glyph).
    Empty,
    /// Light shade, `░`.
    OneQuarter,
    /// Medium shade, `▒`.
    OneHalf,
    /// Dark shade, `▓`.
    ThreeQuarter,
    /// Foreground only (full block).
    Full,
}

impl BlendLevel {
    /// The three levels that produce a color distinct from both operands.
    pub const PARTIAL: [Self; 3] = [Self::OneQuarter, Self::OneHalf, Self::ThreeQuarter];

    /// Foreground weight out of 4.
    #[inline]
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::OneQuarter => 1,
            Self::OneHalf => 2,
            Self::ThreeQuarter => 3,
            Self::Full => 4,
        }
    }

    /// The glyph drawn for this level.
    #[inline]
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Empty => " ",
            Self::OneQuarter => "\u{2591}",
            Self::OneHalf => "\u{2592}",
            Self::ThreeQuarter => "\u{2593}",
            Self::Full => FULL_BLOCK,
        }
    }
}

/// Glyph for every unblended cell.
pub const FULL_BLOCK: &str = "\u{2588}";

// ─── Color Kind ──────────────────────────────────────────────────────────────

/// How a palette entry is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorKind {
    /// One of the eight standard colors, optionally bold (16 in total).
    Ansi { id: u8, bold: bool },
    /// A shade glyph in one standard color over another. Only the
    /// foreground may be bold.
    BlendedAnsi {
        level: BlendLevel,
        fg: u8,
        fg_bold: bool,
        bg: u8,
    },
    /// One of the 256 extended colors.
    Extended { id: u8 },
    /// A shade glyph in one extended color over another.
    BlendedExtended { level: BlendLevel, fg: u8, bg: u8 },
    /// An exact 24-bit color.
    Truecolor,
}

impl ColorKind {
    /// Human-readable family name, used in error messages.
    #[must_use]
    pub const fn family(self) -> &'static str {
        match self {
            Self::Ansi { .. } => "ansi",
            Self::BlendedAnsi { .. } => "blended ansi",
            Self::Extended { .. } => "extended",
            Self::BlendedExtended { .. } => "blended extended",
            Self::Truecolor => "truecolor",
        }
    }
}

// ─── Palette Color ───────────────────────────────────────────────────────────

/// One renderable palette entry with its approximation target color.
#[derive(Clone, Copy, PartialEq)]
pub struct PaletteColor {
    kind: ColorKind,
    rgb: Rgb,
    hsv: Hsv,
}

impl PaletteColor {
    fn with_kind(kind: ColorKind, rgb: Rgb) -> Self {
        Self {
            kind,
            rgb,
            hsv: rgb.to_hsv(),
        }
    }

    /// A standard color. `id` must be in `0..8`.
    #[must_use]
    pub fn ansi(id: u8, bold: bool, rgb: Rgb) -> Self {
        debug_assert!(id < 8, "ansi id out of range: {id}");
        Self::with_kind(ColorKind::Ansi { id, bold }, rgb)
    }

    /// An extended (256-color) palette entry.
    #[must_use]
    pub fn extended(id: u8, rgb: Rgb) -> Self {
        Self::with_kind(ColorKind::Extended { id }, rgb)
    }

    /// An exact 24-bit color.
    #[must_use]
    pub fn truecolor(rgb: Rgb) -> Self {
        Self::with_kind(ColorKind::Truecolor, rgb)
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ColorKind {
        self.kind
    }

    /// The color the search compares against.
    #[inline]
    #[must_use]
    pub const fn rgb(&self) -> Rgb {
        self.rgb
    }

    #[inline]
    #[must_use]
    pub const fn hsv(&self) -> Hsv {
        self.hsv
    }

    /// Whether this color may serve as the background of a blend.
    #[must_use]
    pub const fn can_blend(&self) -> bool {
        match self.kind {
            ColorKind::Ansi { bold, .. } => !bold,
            ColorKind::Extended { .. } => true,
            ColorKind::BlendedAnsi { .. }
            | ColorKind::BlendedExtended { .. }
            | ColorKind::Truecolor => false,
        }
    }

    /// Draw `other` over `self` at the given coverage.
    ///
    /// `self` becomes the background and `other` the foreground (keeping its
    /// bold flag for ANSI colors).
    ///
    /// # Errors
    ///
    /// [`Error::BlendTypeMismatch`] if the two colors are of different
    /// families; [`Error::UnsupportedBlendTarget`] if their shared family
    /// cannot blend (blended or truecolor) or `self` is bold.
    pub fn blend(&self, level: BlendLevel, other: &Self) -> Result<Self> {
        let kind = match (self.kind, other.kind) {
            (ColorKind::Ansi { bold: true, .. }, ColorKind::Ansi { .. }) => {
                return Err(Error::UnsupportedBlendTarget { kind: "bold ansi" });
            }
            (ColorKind::Ansi { id: bg, .. }, ColorKind::Ansi { id: fg, bold }) => {
                ColorKind::BlendedAnsi {
                    level,
                    fg,
                    fg_bold: bold,
                    bg,
                }
            }
            (ColorKind::Extended { id: bg }, ColorKind::Extended { id: fg }) => {
                ColorKind::BlendedExtended { level, fg, bg }
            }
            (background, foreground) if background.family() == foreground.family() => {
                return Err(Error::UnsupportedBlendTarget {
                    kind: background.family(),
                });
            }
            (background, foreground) => {
                return Err(Error::BlendTypeMismatch {
                    background: background.family(),
                    foreground: foreground.family(),
                });
            }
        };

        Ok(Self::with_kind(kind, mix(self.rgb, other.rgb, level)))
    }

    /// Write the escape sequence and glyph that draw one cell in this color.
    ///
    /// # Errors
    ///
    /// Propagates errors from the writer.
    pub fn write_cell(&self, w: &mut impl Write) -> io::Result<()> {
        match self.kind {
            ColorKind::Ansi { id, bold } => {
                ansi::ansi_colors(w, id, None, bold)?;
                w.write_all(FULL_BLOCK.as_bytes())
            }
            ColorKind::BlendedAnsi {
                level,
                fg,
                fg_bold,
                bg,
            } => {
                ansi::ansi_colors(w, fg, Some(bg), fg_bold)?;
                w.write_all(level.glyph().as_bytes())
            }
            ColorKind::Extended { id } => {
                ansi::fg_indexed(w, id)?;
                w.write_all(FULL_BLOCK.as_bytes())
            }
            ColorKind::BlendedExtended { level, fg, bg } => {
                ansi::fg_indexed(w, fg)?;
                ansi::bg_indexed(w, bg)?;
                w.write_all(level.glyph().as_bytes())
            }
            ColorKind::Truecolor => {
                ansi::fg_rgb(w, self.rgb)?;
                w.write_all(FULL_BLOCK.as_bytes())
            }
        }
    }

    /// The bytes of [`write_cell`](Self::write_cell) as a string.
    #[must_use]
    pub fn cell_string(&self) -> String {
        let mut buf = Vec::with_capacity(32);
        // Writing into a Vec cannot fail.
        let _ = self.write_cell(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Canonical order: descending saturation, then descending value, then
    /// ascending hue.
    ///
    /// Only meaningful for deduplication. Two entries comparing `Equal` are
    /// duplicates whatever their kinds.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .hsv
            .s
            .total_cmp(&self.hsv.s)
            .then_with(|| other.hsv.v.total_cmp(&self.hsv.v))
            .then_with(|| self.hsv.h.total_cmp(&other.hsv.h))
    }
}

impl fmt::Debug for PaletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.kind, self.rgb)
    }
}

/// Root-mean-square mix of `bg` and `fg` with `fg` covering `level` quarters.
fn mix(bg: Rgb, fg: Rgb, level: BlendLevel) -> Rgb {
    let w = level.weight();
    Rgb::new(
        mix_channel(bg.r, fg.r, w),
        mix_channel(bg.g, fg.g, w),
        mix_channel(bg.b, fg.b, w),
    )
}

// The mean of two squares of bytes is at most 255², so its root fits a byte.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mix_channel(bg: u8, fg: u8, weight: u32) -> u8 {
    let bg = u32::from(bg);
    let fg = u32::from(fg);
    let sum = weight * fg * fg + (4 - weight) * bg * bg;
    (f64::from(sum) / 4.0).sqrt().round().clamp(0.0, 255.0) as u8
}

// ─── Tests ───────────────────────────────────────────────────────────────────
