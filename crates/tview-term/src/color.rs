// SPDX-License-Identifier: MIT
//
// Color primitives — RGB triples, derived HSV, and the opponent-space
// distance that drives every palette search.
//
// Single-character variable names (r, g, b, h, s, v, y) are the standard
// mathematical convention in color science.
#![allow(clippy::many_single_char_names)]
//
// The distance works in a YCgCo-like opponent space computed with plain
// integer arithmetic:
//
//   y  =  r + 2g + 2b
//   cg = -r + 2g -  b
//   co = 2r      - 2b
//
// Luma error counts once. Chroma error counts four times when the
// *candidate* is close to grey (co² + cg² < 100), because the eye notices a
// tint on a grey far more than a hue shift on a vivid color. The weight
// depends only on the second argument, so the function is asymmetric:
// always pass the query first and the palette candidate second.

use std::fmt;

// ─── Rgb ─────────────────────────────────────────────────────────────────────

/// A 24-bit color, one byte per channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from a `(r, g, b)` tuple, the shape the reference tables use.
    #[inline]
    #[must_use]
    pub const fn from_tuple((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array, in `[r, g, b]` order.
    #[inline]
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Dense key in `0..1 << 24`, used by the approximation memo.
    #[inline]
    #[must_use]
    pub const fn key(self) -> usize {
        ((self.r as usize) << 16) | ((self.g as usize) << 8) | self.b as usize
    }

    /// Convert to the opponent space used by [`distance`].
    #[inline]
    #[must_use]
    pub const fn opponent(self) -> Opponent {
        let r = self.r as i32;
        let g = self.g as i32;
        let b = self.b as i32;
        Opponent {
            y: r + 2 * g + 2 * b,
            cg: -r + 2 * g - b,
            co: 2 * r - 2 * b,
        }
    }

    /// Derive hue, saturation, and value, all in `[0, 1]`.
    ///
    /// Hue is `0.0` for achromatic colors (where it is undefined).
    #[must_use]
    pub fn to_hsv(self) -> Hsv {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let v = max;
        let s = if max > 0.0 { delta / max } else { 0.0 };

        let h = if delta <= 0.0 {
            0.0
        } else if self.r >= self.g && self.r >= self.b {
            ((g - b) / delta).rem_euclid(6.0)
        } else if self.g >= self.b {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        Hsv { h: h / 6.0, s, v }
    }
}

impl fmt::Debug for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─── Hsv ─────────────────────────────────────────────────────────────────────

/// Hue, saturation, value, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

// ─── Opponent space ──────────────────────────────────────────────────────────

/// A color in the integer opponent space: luma plus two chroma axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opponent {
    pub y: i32,
    pub cg: i32,
    pub co: i32,
}

impl Opponent {
    /// Squared chroma magnitude, `co² + cg²`.
    #[inline]
    #[must_use]
    pub const fn chroma_sq(self) -> i32 {
        self.co * self.co + self.cg * self.cg
    }
}

/// Candidates with a squared chroma below this count as near-grey.
pub const GREY_CHROMA_SQ: i32 = 100;

/// Chroma error weight applied when the candidate is near-grey.
pub const GREY_CHROMA_WEIGHT: f64 = 4.0;

/// Dissimilarity of `candidate` as a stand-in for `query`.
///
/// Smaller is closer; `distance(c, c)` is always `0.0`. The chroma weight
/// comes from `candidate` alone, so the arguments must not be swapped.
#[inline]
#[must_use]
pub fn distance(query: Rgb, candidate: Rgb) -> f64 {
    let q = query.opponent();
    let c = candidate.opponent();

    let dy = f64::from(q.y - c.y);
    let dcg = f64::from(q.cg - c.cg);
    let dco = f64::from(q.co - c.co);

    let weight = if c.chroma_sq() < GREY_CHROMA_SQ {
        GREY_CHROMA_WEIGHT
    } else {
        1.0
    };

    weight.mul_add(dcg.mul_add(dcg, dco * dco), dy * dy)
}

// ─── Reference Palettes ──────────────────────────────────────────────────────

pub mod reference {
    //! Fixed register values used when the terminal cannot be asked.
    //!
    //! - Registers 0–15 differ per terminal: xterm's defaults and the Linux
    //!   VGA console defaults are both provided.
    //! - Registers 16–231 are a 6×6×6 cube over `0, 95, 135, 175, 215, 255`.
    //! - Registers 232–255 are a 24-step grey ramp from 8 to 238.

    use super::Rgb;

    /// xterm's default first sixteen registers.
    pub const XTERM16: [(u8, u8, u8); 16] = [
        (0, 0, 0),       // 0: Black
        (205, 0, 0),     // 1: Red
        (0, 205, 0),     // 2: Green
        (205, 205, 0),   // 3: Yellow
        (0, 0, 238),     // 4: Blue
        (205, 0, 205),   // 5: Magenta
        (0, 205, 205),   // 6: Cyan
        (229, 229, 229), // 7: White
        (127, 127, 127), // 8: Bright Black
        (255, 0, 0),     // 9: Bright Red
        (0, 255, 0),     // 10: Bright Green
        (255, 255, 0),   // 11: Bright Yellow
        (92, 92, 255),   // 12: Bright Blue
        (255, 0, 255),   // 13: Bright Magenta
        (0, 255, 255),   // 14: Bright Cyan
        (255, 255, 255), // 15: Bright White
    ];

    /// The Linux virtual console's default VGA palette.
    pub const CONSOLE16: [(u8, u8, u8); 16] = [
        (0, 0, 0),       // 0: Black
        (170, 0, 0),     // 1: Red
        (0, 170, 0),     // 2: Green
        (170, 85, 0),    // 3: Brown
        (0, 0, 170),     // 4: Blue
        (170, 0, 170),   // 5: Magenta
        (0, 170, 170),   // 6: Cyan
        (170, 170, 170), // 7: Light Grey
        (85, 85, 85),    // 8: Dark Grey
        (255, 85, 85),   // 9: Bright Red
        (85, 255, 85),   // 10: Bright Green
        (255, 255, 85),  // 11: Yellow
        (85, 85, 255),   // 12: Bright Blue
        (255, 85, 255),  // 13: Bright Magenta
        (85, 255, 255),  // 14: Bright Cyan
        (255, 255, 255), // 15: White
    ];

    /// Value of one 6-level cube coordinate.
    #[inline]
    const fn cube_level(i: u8) -> u8 {
        if i == 0 { 0 } else { 55 + 40 * i }
    }

    /// Resolve a 256-color register, taking 0–15 from `base16`.
    #[must_use]
    pub const fn extended_rgb(id: u8, base16: &[(u8, u8, u8); 16]) -> Rgb {
        match id {
            0..=15 => Rgb::from_tuple(base16[id as usize]),
            16..=231 => {
                let i = id - 16;
                Rgb::new(cube_level(i / 36), cube_level((i % 36) / 6), cube_level(i % 6))
            }
            232..=255 => {
                let v = 8 + 10 * (id - 232);
                Rgb::new(v, v, v)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
