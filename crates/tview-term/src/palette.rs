// SPDX-License-Identifier: MIT
//
// Palette construction — from a handful of register colors to every cell
// color the terminal can draw.
//
// Pipeline:
//
//   base colors (16 ANSI or 256 extended, RGB already resolved)
//       │
//       ▼
//   blend every pair where one side can be a background, at ¼ ½ ¾
//       │
//       ▼
//   sort by canonical order, drop canonical duplicates
//       │
//       ▼
//   bucket by ⌊rgb / bucket_width⌋ for the nearest-neighbor search
//
// The palette is immutable once built.

use std::ops::Range;

use crate::cell::{BlendLevel, PaletteColor};
use crate::color::Rgb;
use crate::error::Result;

/// Bucket side for palettes derived from the 16 ANSI colors.
pub const ANSI_BUCKET_WIDTH: u16 = 64;

/// Bucket side for palettes derived from the 256 extended colors.
pub const EXTENDED_BUCKET_WIDTH: u16 = 16;

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// Partition of the RGB cube into equal cubic cells, each listing the
/// palette indices whose color falls inside it.
#[derive(Debug, Clone)]
pub struct Buckets {
    width: u16,
    side: usize,
    cells: Vec<Vec<u32>>,
}

impl Buckets {
    /// Bucket every color in `colors` into cells of side `width`.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero or does not divide 256.
    #[must_use]
    pub fn new(width: u16, colors: &[PaletteColor]) -> Self {
        assert!(
            width > 0 && 256 % width == 0,
            "bucket width must divide 256, got {width}"
        );
        let side = 256 / usize::from(width);
        let mut cells = vec![Vec::new(); side * side * side];

        for (idx, color) in colors.iter().enumerate() {
            let [r, g, b] = Self::coords_of(width, color.rgb());
            // Palettes never come near u32::MAX entries.
            #[allow(clippy::cast_possible_truncation)]
            cells[(r * side + g) * side + b].push(idx as u32);
        }

        Self { width, side, cells }
    }

    /// Side of one bucket in RGB units.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Number of buckets along each axis.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Bucket coordinates of a color.
    #[inline]
    #[must_use]
    pub fn coords(&self, rgb: Rgb) -> [usize; 3] {
        Self::coords_of(self.width, rgb)
    }

    fn coords_of(width: u16, rgb: Rgb) -> [usize; 3] {
        let w = usize::from(width);
        rgb.channels().map(|c| usize::from(c) / w)
    }

    /// Palette indices in the bucket at `(r, g, b)`, or `None` when the
    /// coordinates fall outside the cube.
    #[must_use]
    pub fn get(&self, r: isize, g: isize, b: isize) -> Option<&[u32]> {
        let side = isize::try_from(self.side).ok()?;
        let in_range = |c: isize| (0..side).contains(&c);
        if !(in_range(r) && in_range(g) && in_range(b)) {
            return None;
        }
        let idx = (r * side + g) * side + b;
        usize::try_from(idx).ok().map(|i| self.cells[i].as_slice())
    }

    /// Every bucket in traversal order (red-major, then green, then blue).
    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// Number of non-empty buckets.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }
}

// ─── Palette ─────────────────────────────────────────────────────────────────

/// The deduplicated, bucketed set of colors a terminal can draw.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<PaletteColor>,
    buckets: Buckets,
}

impl Palette {
    /// All entries, in canonical order.
    #[inline]
    #[must_use]
    pub fn colors(&self) -> &[PaletteColor] {
        &self.colors
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Entry at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, idx: usize) -> &PaletteColor {
        &self.colors[idx]
    }

    #[inline]
    #[must_use]
    pub const fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Entries in bucket traversal order.
    pub fn iter_bucketed(&self) -> impl Iterator<Item = &PaletteColor> {
        self.buckets
            .iter()
            .flat_map(|cell| cell.iter().map(|&i| &self.colors[i as usize]))
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Expands base colors into a full [`Palette`].
///
/// # Example
///
/// ```
/// use tview_term::cell::PaletteColor;
/// use tview_term::color::reference;
/// use tview_term::palette::{PaletteBuilder, EXTENDED_BUCKET_WIDTH};
///
/// let base = (16..=21).map(|id| {
///     PaletteColor::extended(id, reference::extended_rgb(id, &reference::XTERM16))
/// });
/// let palette = PaletteBuilder::new(EXTENDED_BUCKET_WIDTH)
///     .with_base(base)
///     .build()?;
/// assert!(palette.len() > 6);
/// # Ok::<(), tview_term::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PaletteBuilder {
    base: Vec<PaletteColor>,
    bucket_width: u16,
}

impl PaletteBuilder {
    /// Start an empty builder that will bucket with the given width.
    #[must_use]
    pub const fn new(bucket_width: u16) -> Self {
        Self {
            base: Vec::new(),
            bucket_width,
        }
    }

    /// Append base colors. Order matters: when both colors of a pair can be
    /// a background, the earlier one is.
    #[must_use]
    pub fn with_base(mut self, colors: impl IntoIterator<Item = PaletteColor>) -> Self {
        self.base.extend(colors);
        self
    }

    /// Number of entries before deduplication: the base colors plus three
    /// blends per eligible pair.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        let pairs = Self::pairs(&self.base).count();
        self.base.len() + pairs * BlendLevel::PARTIAL.len()
    }

    /// Run the pipeline.
    ///
    /// # Errors
    ///
    /// Only a blend failure, which cannot happen for base colors of one
    /// family; it is propagated rather than hidden.
    pub fn build(self) -> Result<Palette> {
        let mut colors = self.expand()?;
        let candidates = colors.len();

        colors.sort_by(PaletteColor::canonical_cmp);
        colors.dedup_by(|a, b| a.canonical_cmp(b).is_eq());

        let buckets = Buckets::new(self.bucket_width, &colors);
        log::debug!(
            "palette: {} base, {candidates} candidates, {} after dedup, {}/{} buckets occupied",
            self.base.len(),
            colors.len(),
            buckets.occupied(),
            buckets.side().pow(3),
        );

        Ok(Palette { colors, buckets })
    }

    /// Base colors plus every partial blend, in generation order.
    fn expand(&self) -> Result<Vec<PaletteColor>> {
        let mut out = Vec::with_capacity(self.candidate_count());
        for (i, base) in self.base.iter().enumerate() {
            out.push(*base);
            for (bg, fg) in Self::pairs_from(&self.base, i) {
                for level in BlendLevel::PARTIAL {
                    out.push(bg.blend(level, fg)?);
                }
            }
        }
        Ok(out)
    }

    /// Every eligible `(background, foreground)` pair.
    fn pairs(base: &[PaletteColor]) -> impl Iterator<Item = (&PaletteColor, &PaletteColor)> {
        (0..base.len()).flat_map(move |i| Self::pairs_from(base, i))
    }

    /// Eligible pairs `(i, j)` for `j > i`, background first.
    fn pairs_from(
        base: &[PaletteColor],
        i: usize,
    ) -> impl Iterator<Item = (&PaletteColor, &PaletteColor)> {
        let first = &base[i];
        let rest: Range<usize> = i + 1..base.len();
        rest.filter_map(move |j| {
            let second = &base[j];
            if first.can_blend() {
                Some((first, second))
            } else if second.can_blend() {
                Some((second, first))
            } else {
                None
            }
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
