// SPDX-License-Identifier: MIT
//
// Nearest palette entry for an arbitrary color, memoized.
//
// The search starts in the bucket containing the query and grows outward in
// octahedral shells: shell `i` holds every bucket offset `(x, y, z)` with
// |x| + |y| + |z| = i. All entries of the visited buckets become candidates
// and the one with the smallest `distance(query, candidate)` wins.
//
// Shells 0 through `SHELL_LIMIT` are always visited unless the whole palette
// has already been collected. Only when that leaves no candidate at all does
// the search keep going, up to the far corner of the cube, so a non-empty
// palette always yields an answer.
//
// Results are memoized in a direct-mapped table with one slot per 24-bit
// color (`0` = not computed, otherwise palette index + 1). The table is
// allocated zeroed, so untouched pages cost nothing until first use.

use crate::cell::PaletteColor;
use crate::color::{Rgb, distance};
use crate::palette::{Buckets, Palette};

/// Candidate count that ends the search early, together with having
/// collected the entire palette.
pub const MIN_CANDIDATES: usize = 256;

/// Outermost shell visited unconditionally.
pub const SHELL_LIMIT: usize = 4;

/// Number of slots in the memo, one per 24-bit color.
const MEMO_SLOTS: usize = 1 << 24;

// ─── Shell Offsets ───────────────────────────────────────────────────────────

/// Every signed offset `(x, y, z)` with `|x| + |y| + |z| == radius`, each
/// exactly once.
fn shell(radius: usize) -> impl Iterator<Item = [isize; 3]> {
    let radius = isize::try_from(radius).unwrap_or(isize::MAX);
    (0..=radius).flat_map(move |x| {
        (0..=radius - x).flat_map(move |y| {
            let z = radius - x - y;
            signs(x)
                .flat_map(move |sx| signs(y).flat_map(move |sy| signs(z).map(move |sz| [sx, sy, sz])))
        })
    })
}

/// `[v, -v]`, or just `[0]` for zero so mirrored offsets are not repeated.
fn signs(v: isize) -> impl Iterator<Item = isize> + Clone {
    let mirrored = if v == 0 { None } else { Some(-v) };
    std::iter::once(v).chain(mirrored)
}

// ─── Approximation Index ─────────────────────────────────────────────────────

/// A palette plus the memo of every approximation computed so far.
pub struct ApproximationIndex {
    palette: Palette,
    memo: Vec<u32>,
    candidates: Vec<u32>,
}

impl ApproximationIndex {
    /// Wrap a palette. Allocates the memo (64 MiB of zeroed, lazily mapped
    /// memory).
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            memo: vec![0; MEMO_SLOTS],
            candidates: Vec::with_capacity(MIN_CANDIDATES * 4),
        }
    }

    #[inline]
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The palette entry closest to `rgb`.
    ///
    /// Deterministic for a given palette; repeated queries hit the memo.
    ///
    /// # Panics
    ///
    /// Panics if the palette is empty.
    pub fn approximate(&mut self, rgb: Rgb) -> PaletteColor {
        let idx = self.approximate_index(rgb);
        *self.palette.get(idx)
    }

    /// Index into [`Palette::colors`] of the entry closest to `rgb`.
    ///
    /// # Panics
    ///
    /// Panics if the palette is empty.
    pub fn approximate_index(&mut self, rgb: Rgb) -> usize {
        let slot = self.memo[rgb.key()];
        if slot != 0 {
            return slot as usize - 1;
        }

        let idx = self.search(rgb);
        // Indices always fit: palettes hold far fewer than u32::MAX entries.
        #[allow(clippy::cast_possible_truncation)]
        let stored = idx as u32 + 1;
        self.memo[rgb.key()] = stored;
        idx
    }

    /// Whether `rgb` already has a memoized answer.
    #[must_use]
    pub fn is_memoized(&self, rgb: Rgb) -> bool {
        self.memo[rgb.key()] != 0
    }

    /// Shell search over the buckets; see the module docs.
    fn search(&mut self, rgb: Rgb) -> usize {
        assert!(!self.palette.is_empty(), "cannot approximate with an empty palette");

        let buckets = self.palette.buckets();
        let total = self.palette.len();
        // Farthest bucket from any origin is at Manhattan distance 3·(side − 1).
        let max_radius = 3 * (buckets.side() - 1);

        self.candidates.clear();
        let origin = buckets.coords(rgb).map(|c| isize::try_from(c).unwrap_or(0));

        for radius in 0..=max_radius {
            collect_shell(buckets, origin, radius, &mut self.candidates);

            let enough = self.candidates.len() >= MIN_CANDIDATES && self.candidates.len() >= total;
            let bounded = radius >= SHELL_LIMIT && !self.candidates.is_empty();
            if enough || bounded {
                break;
            }
        }

        let colors = self.palette.colors();
        let mut best = self.candidates[0] as usize;
        let mut best_dist = distance(rgb, colors[best].rgb());
        for &idx in &self.candidates[1..] {
            let idx = idx as usize;
            let d = distance(rgb, colors[idx].rgb());
            if d < best_dist {
                best = idx;
                best_dist = d;
            }
        }

        log::trace!(
            "approximate {rgb}: {} candidates, best {:?} at {best_dist}",
            self.candidates.len(),
            colors[best]
        );
        best
    }
}

/// Append the entries of every in-range bucket on shell `radius` around
/// `origin`.
fn collect_shell(buckets: &Buckets, origin: [isize; 3], radius: usize, out: &mut Vec<u32>) {
    for [x, y, z] in shell(radius) {
        if let Some(cell) = buckets.get(origin[0] + x, origin[1] + y, origin[2] + z) {
            out.extend_from_slice(cell);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::reference;
    use crate::palette::{ANSI_BUCKET_WIDTH, EXTENDED_BUCKET_WIDTH, PaletteBuilder};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn ansi_index() -> ApproximationIndex {
        let table = &reference::XTERM16;
        let base = (0..8u8).flat_map(|id| {
            [
                PaletteColor::ansi(id, false, Rgb::from_tuple(table[usize::from(id)])),
                PaletteColor::ansi(id, true, Rgb::from_tuple(table[usize::from(id) + 8])),
            ]
        });
        let palette = PaletteBuilder::new(ANSI_BUCKET_WIDTH)
            .with_base(base)
            .build()
            .unwrap();
        ApproximationIndex::new(palette)
    }

    fn extended_index() -> ApproximationIndex {
        let base = (0..=255u8)
            .map(|id| PaletteColor::extended(id, reference::extended_rgb(id, &reference::XTERM16)));
        let palette = PaletteBuilder::new(EXTENDED_BUCKET_WIDTH)
            .with_base(base)
            .build()
            .unwrap();
        ApproximationIndex::new(palette)
    }

    // ── Shells ──────────────────────────────────────────────────────────

    #[test]
    fn shell_zero_is_origin() {
        assert_eq!(shell(0).collect::<Vec<_>>(), vec![[0, 0, 0]]);
    }

    #[test]
    fn shell_one_is_six_faces() {
        let offsets: HashSet<_> = shell(1).collect();
        assert_eq!(offsets.len(), 6);
        assert!(offsets.contains(&[-1, 0, 0]));
        assert!(offsets.contains(&[0, 0, 1]));
    }

    #[test]
    fn shells_have_octahedral_sizes_without_repeats() {
        // 4r² + 2 points on the surface of an L1 ball of radius r ≥ 1.
        for r in 1..=6usize {
            let all: Vec<_> = shell(r).collect();
            let unique: HashSet<_> = all.iter().copied().collect();
            assert_eq!(all.len(), unique.len(), "radius {r} repeats offsets");
            assert_eq!(all.len(), 4 * r * r + 2, "radius {r}");
            #[allow(clippy::cast_possible_wrap)]
            let radius = r as isize;
            assert!(all.iter().all(|o| o.iter().map(|c| c.abs()).sum::<isize>() == radius));
        }
    }

    // ── Exact matches ───────────────────────────────────────────────────

    #[test]
    fn palette_colors_approximate_to_themselves() {
        let mut index = ansi_index();
        let colors: Vec<_> = index.palette().colors().to_vec();
        for (i, color) in colors.iter().enumerate() {
            assert_eq!(index.approximate_index(color.rgb()), i, "{color:?}");
        }
    }

    #[test]
    fn every_extended_entry_is_reachable() {
        let mut index = extended_index();
        let colors: Vec<_> = index.palette().colors().to_vec();
        for (i, color) in colors.iter().enumerate() {
            let found = index.approximate(color.rgb());
            assert_eq!(found.rgb(), color.rgb());
            assert_eq!(index.approximate_index(color.rgb()), i);
        }
    }

    #[test]
    fn pure_primaries_map_to_cube_corners() {
        let mut index = extended_index();
        assert_eq!(index.approximate(Rgb::new(255, 0, 0)).rgb(), Rgb::new(255, 0, 0));
        assert_eq!(index.approximate(Rgb::BLACK).rgb(), Rgb::BLACK);
        assert_eq!(index.approximate(Rgb::WHITE).rgb(), Rgb::WHITE);
    }

    // ── Memo ────────────────────────────────────────────────────────────

    #[test]
    fn memo_is_populated_lazily() {
        let mut index = ansi_index();
        let q = Rgb::new(12, 140, 77);
        assert!(!index.is_memoized(q));
        let first = index.approximate(q);
        assert!(index.is_memoized(q));
        let second = index.approximate(q);
        assert_eq!(first, second);
    }

    #[test]
    fn memo_distinguishes_neighbouring_colors() {
        let mut index = ansi_index();
        index.approximate(Rgb::new(10, 10, 10));
        assert!(!index.is_memoized(Rgb::new(10, 10, 11)));
    }

    // ── Search quality ──────────────────────────────────────────────────

    #[test]
    fn result_beats_every_entry_in_the_searched_neighbourhood() {
        // Whatever the search stops on, nothing within SHELL_LIMIT buckets
        // of the query may be strictly closer than the answer.
        let mut index = ansi_index();
        for rgb in [
            Rgb::new(0, 0, 0),
            Rgb::new(128, 128, 128),
            Rgb::new(200, 40, 40),
            Rgb::new(30, 160, 220),
            Rgb::new(255, 255, 255),
        ] {
            let got = index.approximate(rgb);
            let buckets = index.palette().buckets();
            let origin = buckets.coords(rgb);
            let best = distance(rgb, got.rgb());
            for color in index.palette().colors() {
                let at = buckets.coords(color.rgb());
                let manhattan: usize = origin.iter().zip(at).map(|(a, b)| a.abs_diff(b)).sum();
                if manhattan <= SHELL_LIMIT {
                    assert!(best <= distance(rgb, color.rgb()), "{rgb}: {got:?} vs {color:?}");
                }
            }
        }
    }

    #[test]
    fn search_never_leaves_the_four_shell_neighbourhood_when_it_has_candidates() {
        let mut index = extended_index();
        let q = Rgb::new(100, 100, 100);
        let got = index.approximate(q);
        let buckets = index.palette().buckets();
        let a = buckets.coords(q);
        let b = buckets.coords(got.rgb());
        let manhattan: usize = a.iter().zip(b).map(|(x, y)| x.abs_diff(y)).sum();
        assert!(manhattan <= SHELL_LIMIT);
    }

    #[test]
    fn sparse_palette_still_answers() {
        // One entry in the far corner: every shell up to the cube's diagonal
        // must be searched.
        let palette = PaletteBuilder::new(EXTENDED_BUCKET_WIDTH)
            .with_base([PaletteColor::extended(231, Rgb::WHITE)])
            .build()
            .unwrap();
        let mut index = ApproximationIndex::new(palette);
        assert_eq!(index.approximate(Rgb::BLACK).rgb(), Rgb::WHITE);
    }

    // ── Determinism sweeps ──────────────────────────────────────────────

    fn sweep(index: &mut ApproximationIndex, step: usize) {
        let mut first = Vec::new();
        for r in (0..=255u8).step_by(step) {
            for g in (0..=255u8).step_by(step) {
                for b in (0..=255u8).step_by(step) {
                    first.push(index.approximate_index(Rgb::new(r, g, b)));
                }
            }
        }
        let mut i = 0;
        for r in (0..=255u8).step_by(step) {
            for g in (0..=255u8).step_by(step) {
                for b in (0..=255u8).step_by(step) {
                    assert_eq!(index.approximate_index(Rgb::new(r, g, b)), first[i]);
                    i += 1;
                }
            }
        }
    }

    #[test]
    fn strided_sweep_is_deterministic_ansi() {
        sweep(&mut ansi_index(), 15);
    }

    #[test]
    fn strided_sweep_is_deterministic_extended() {
        sweep(&mut extended_index(), 51);
    }

    #[test]
    fn fresh_index_agrees_with_memoized_one() {
        let mut warm = ansi_index();
        let mut cold = ansi_index();
        for r in (0..=255u8).step_by(85) {
            for g in (0..=255u8).step_by(85) {
                for b in (0..=255u8).step_by(85) {
                    let rgb = Rgb::new(r, g, b);
                    warm.approximate_index(rgb);
                    assert_eq!(warm.approximate_index(rgb), cold.approximate_index(rgb));
                }
            }
        }
    }

    #[test]
    #[ignore = "visits all 2^24 colors; run with --ignored in release mode"]
    fn full_cube_is_deterministic_extended() {
        sweep(&mut extended_index(), 1);
    }

    #[test]
    #[ignore = "visits all 2^24 colors; run with --ignored in release mode"]
    fn full_cube_is_deterministic_ansi() {
        sweep(&mut ansi_index(), 1);
    }
}
