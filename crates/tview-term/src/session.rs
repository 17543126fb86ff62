// SPDX-License-Identifier: MIT
//
// The terminal session: probe once, build the palette once, then answer
// per-pixel approximation queries and hand out escape sequences.
//
// Construction walks ProbingCapabilities → BuildingPalette → Ready. Any
// probing failure is logged as Failed and aborts construction with the
// probe's error; there are no fallback geometries or guessed colors. After
// construction the session never changes state again, apart from the
// approximation memo filling up.
//
// Base colors come from the live registers 0–15 on xterm-type terminals
// and from the Linux console's fixed VGA table on the console. Registers
// 16–255 always come from the fixed 256-color cube and grey ramp.

use std::fmt;

use crate::approx::ApproximationIndex;
use crate::cell::PaletteColor;
use crate::color::{Rgb, reference};
use crate::error::{Error, Result};
use crate::output::OutputBuffer;
use crate::palette::{ANSI_BUCKET_WIDTH, EXTENDED_BUCKET_WIDTH, Palette, PaletteBuilder};
use crate::query;
use crate::terminal::{CellSize, Probe, Size, TtyProbe};

/// Registers read back from the terminal; everything above is fixed.
pub const LIVE_REGISTERS: u8 = 16;

/// Values of registers `0..LIVE_REGISTERS`.
pub type Registers = [Rgb; LIVE_REGISTERS as usize];

// ─── Configuration ───────────────────────────────────────────────────────────

/// Kind of terminal, which decides how capabilities are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    /// The Linux virtual console: font size via ioctl, fixed VGA colors.
    Console,
    /// Anything emulating xterm: font size and colors via escape sequences.
    Xterm,
}

/// Colors the terminal can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Eight colors, each with a bold variant.
    Ansi,
    /// The 256-color palette.
    Extended,
    /// 24-bit color; no palette is built.
    Truecolor,
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ansi => "ansi",
            Self::Extended => "extended",
            Self::Truecolor => "truecolor",
        })
    }
}

/// Construction stages, for logging.
#[derive(Debug, Clone, Copy)]
enum Stage {
    ProbingCapabilities,
    BuildingPalette,
    Ready,
    Failed,
}

// ─── Base Colors ─────────────────────────────────────────────────────────────

/// The first sixteen registers for `term`, read live when the terminal
/// supports it.
///
/// A probe answering with the wrong number of registers is malformed.
fn base_registers(probe: &mut impl Probe, term: TermType) -> Result<Registers> {
    match term {
        TermType::Xterm => {
            let live = probe.color_registers(LIVE_REGISTERS)?;
            Registers::try_from(live).map_err(|live| {
                let reported = format!("{} of {LIVE_REGISTERS} registers", live.len());
                Error::malformed(query::COLOR_REGISTERS, reported.as_bytes())
            })
        }
        TermType::Console => Ok(reference::CONSOLE16.map(Rgb::from_tuple)),
    }
}

/// Base colors of `mode` given registers 0–15. Empty for truecolor.
#[must_use]
pub fn base_colors(mode: ColorMode, registers: &Registers) -> Vec<PaletteColor> {
    let register = |id: u8| registers[usize::from(id)];
    match mode {
        ColorMode::Ansi => (0..8u8)
            .flat_map(|id| {
                [
                    PaletteColor::ansi(id, false, register(id)),
                    PaletteColor::ansi(id, true, register(id + 8)),
                ]
            })
            .collect(),
        ColorMode::Extended => (0..=255u8)
            .map(|id| {
                let rgb = if id < LIVE_REGISTERS {
                    register(id)
                } else {
                    reference::extended_rgb(id, &reference::XTERM16)
                };
                PaletteColor::extended(id, rgb)
            })
            .collect(),
        ColorMode::Truecolor => Vec::new(),
    }
}

/// Build the palette for `mode` from registers 0–15.
///
/// # Errors
///
/// Propagates a blend failure from [`PaletteBuilder::build`].
pub fn build_palette(mode: ColorMode, registers: &Registers) -> Result<Palette> {
    let width = match mode {
        ColorMode::Ansi => ANSI_BUCKET_WIDTH,
        ColorMode::Extended | ColorMode::Truecolor => EXTENDED_BUCKET_WIDTH,
    };
    PaletteBuilder::new(width)
        .with_base(base_colors(mode, registers))
        .build()
}

// ─── Terminal Session ────────────────────────────────────────────────────────

/// A probed terminal plus, outside truecolor mode, its palette and
/// approximation index.
///
/// # Example
///
/// ```no_run
/// use tview_term::{ColorMode, Rgb, TermType, TerminalSession};
///
/// let mut session = TerminalSession::open(TermType::Xterm, ColorMode::Extended)?;
/// let cell = session.approximate(Rgb::new(200, 120, 40));
/// print!("{}{}{}", session.move_to(0, 0), cell.cell_string(), session.reset_color());
/// # Ok::<(), tview_term::Error>(())
/// ```
pub struct TerminalSession {
    term: TermType,
    mode: ColorMode,
    size: Size,
    cell_size: CellSize,
    index: Option<ApproximationIndex>,
}

impl TerminalSession {
    /// Probe the controlling terminal and build the session.
    ///
    /// # Errors
    ///
    /// [`Error::NoControllingTerminal`](crate::Error::NoControllingTerminal),
    /// or whatever probing fails with.
    pub fn open(term: TermType, mode: ColorMode) -> Result<Self> {
        let mut probe = TtyProbe::open()?;
        Self::with_probe(&mut probe, term, mode)
    }

    /// Build the session from an arbitrary capability source.
    ///
    /// # Errors
    ///
    /// The first error returned by `probe`.
    pub fn with_probe(probe: &mut impl Probe, term: TermType, mode: ColorMode) -> Result<Self> {
        Self::construct(probe, term, mode).inspect_err(|err| {
            log::debug!("session {term:?}/{mode}: {:?} ({err})", Stage::Failed);
        })
    }

    fn construct(probe: &mut impl Probe, term: TermType, mode: ColorMode) -> Result<Self> {
        log::debug!("session {term:?}/{mode}: {:?}", Stage::ProbingCapabilities);
        let size = probe.window_size()?;
        let cell_size = probe.cell_size(term, size)?;
        log::debug!(
            "window {}x{} cells, cell {}x{} px",
            size.cols,
            size.rows,
            cell_size.width,
            cell_size.height
        );

        let index = if mode == ColorMode::Truecolor {
            None
        } else {
            let registers = base_registers(probe, term)?;
            log::debug!("session {term:?}/{mode}: {:?}", Stage::BuildingPalette);
            let palette = build_palette(mode, &registers)?;
            log::debug!(
                "palette: {} entries in {}-wide buckets",
                palette.len(),
                palette.buckets().width()
            );
            Some(ApproximationIndex::new(palette))
        };

        log::debug!("session {term:?}/{mode}: {:?}", Stage::Ready);
        Ok(Self {
            term,
            mode,
            size,
            cell_size,
            index,
        })
    }

    #[inline]
    #[must_use]
    pub const fn term_type(&self) -> TermType {
        self.term
    }

    #[inline]
    #[must_use]
    pub const fn color_mode(&self) -> ColorMode {
        self.mode
    }

    /// Window size in cells, as probed at construction.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Cell size in pixels, as probed at construction.
    #[inline]
    #[must_use]
    pub const fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    /// The palette, or `None` in truecolor mode.
    #[must_use]
    pub fn palette(&self) -> Option<&Palette> {
        self.index.as_ref().map(ApproximationIndex::palette)
    }

    /// The closest displayable color to `rgb`; `rgb` itself in truecolor
    /// mode.
    pub fn approximate(&mut self, rgb: Rgb) -> PaletteColor {
        match &mut self.index {
            Some(index) => index.approximate(rgb),
            None => PaletteColor::truecolor(rgb),
        }
    }

    /// Escape sequence moving the cursor to `(x, y)`, 0-indexed.
    #[must_use]
    pub fn move_to(&self, x: u16, y: u16) -> String {
        let mut out = OutputBuffer::with_capacity(16);
        out.move_to(x, y);
        out.into_string()
    }

    /// Escape sequence clearing the screen and homing the cursor.
    #[must_use]
    pub fn clear(&self) -> String {
        let mut out = OutputBuffer::with_capacity(8);
        out.clear_screen();
        out.into_string()
    }

    /// Escape sequence resetting colors to the terminal defaults.
    #[must_use]
    pub fn reset_color(&self) -> String {
        let mut out = OutputBuffer::with_capacity(4);
        out.reset_color();
        out.into_string()
    }

    /// The whole palette as rows of swatches, in bucket order.
    ///
    /// Each entry is drawn `swatch_width` cells wide, and a new line starts
    /// every `line_width / swatch_width` entries. Empty in truecolor mode
    /// apart from the trailing reset.
    #[must_use]
    pub fn render_palette(&self, swatch_width: u16, line_width: u16) -> String {
        let swatch_width = swatch_width.max(1);
        let per_line = usize::from((line_width / swatch_width).max(1));

        let mut out = OutputBuffer::new();
        if let Some(palette) = self.palette() {
            for (i, color) in palette.iter_bucketed().enumerate() {
                if i % per_line == 0 {
                    out.reset_color();
                    out.push_str("\n");
                }
                for _ in 0..swatch_width {
                    out.push_cell(color);
                }
            }
        }
        out.reset_color();
        out.push_str("\n");
        out.into_string()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ColorKind;
    use crate::error::Error;
    use crate::query;
    use pretty_assertions::assert_eq;

    /// Canned capabilities, counting the register queries it answers.
    struct FakeProbe {
        size: Size,
        cell: CellSize,
        registers: Vec<Rgb>,
        fail_cell_size: bool,
        register_queries: usize,
    }

    impl FakeProbe {
        fn new() -> Self {
            Self {
                size: Size { cols: 80, rows: 24 },
                cell: CellSize { width: 8, height: 16 },
                registers: reference::XTERM16.iter().copied().map(Rgb::from_tuple).collect(),
                fail_cell_size: false,
                register_queries: 0,
            }
        }
    }

    impl Probe for FakeProbe {
        fn window_size(&mut self) -> Result<Size> {
            Ok(self.size)
        }

        fn cell_size(&mut self, _term: TermType, _window: Size) -> Result<CellSize> {
            if self.fail_cell_size {
                return Err(Error::CapabilityQueryTimeout { query: query::TEXT_AREA });
            }
            Ok(self.cell)
        }

        fn color_registers(&mut self, count: u8) -> Result<Vec<Rgb>> {
            self.register_queries += 1;
            let count = usize::from(count).min(self.registers.len());
            Ok(self.registers[..count].to_vec())
        }
    }

    fn session(term: TermType, mode: ColorMode) -> (TerminalSession, FakeProbe) {
        let mut probe = FakeProbe::new();
        let session = TerminalSession::with_probe(&mut probe, term, mode).unwrap();
        (session, probe)
    }

    // ── Construction ────────────────────────────────────────────────────

    #[test]
    fn records_probed_geometry() {
        let (s, _) = session(TermType::Xterm, ColorMode::Ansi);
        assert_eq!(s.size(), Size { cols: 80, rows: 24 });
        assert_eq!(s.cell_size(), CellSize { width: 8, height: 16 });
        assert_eq!(s.term_type(), TermType::Xterm);
        assert_eq!(s.color_mode(), ColorMode::Ansi);
    }

    #[test]
    fn xterm_reads_live_registers() {
        let (_, probe) = session(TermType::Xterm, ColorMode::Extended);
        assert_eq!(probe.register_queries, 1);
    }

    #[test]
    fn console_uses_fixed_registers() {
        let (s, probe) = session(TermType::Console, ColorMode::Ansi);
        assert_eq!(probe.register_queries, 0);
        let palette = s.palette().unwrap();
        // Console brown, not xterm yellow.
        assert!(palette.colors().iter().any(|c| c.rgb() == Rgb::new(170, 85, 0)));
        assert!(!palette.colors().iter().any(|c| c.rgb() == Rgb::new(205, 205, 0)));
    }

    #[test]
    fn truecolor_builds_no_palette() {
        let (s, probe) = session(TermType::Xterm, ColorMode::Truecolor);
        assert!(s.palette().is_none());
        assert_eq!(probe.register_queries, 0);
    }

    #[test]
    fn probe_failure_aborts_construction() {
        let mut probe = FakeProbe::new();
        probe.fail_cell_size = true;
        let result = TerminalSession::with_probe(&mut probe, TermType::Xterm, ColorMode::Ansi);
        assert!(matches!(
            result,
            Err(Error::CapabilityQueryTimeout { query: query::TEXT_AREA })
        ));
        assert_eq!(probe.register_queries, 0);
    }

    #[test]
    fn short_register_answer_is_malformed() {
        let mut probe = FakeProbe::new();
        probe.registers.truncate(12);
        let result = TerminalSession::with_probe(&mut probe, TermType::Xterm, ColorMode::Extended);
        assert!(matches!(
            result,
            Err(Error::MalformedCapabilityResponse { query: query::COLOR_REGISTERS, .. })
        ));
    }

    #[test]
    fn live_registers_feed_the_palette() {
        let mut probe = FakeProbe::new();
        probe.registers[1] = Rgb::new(180, 30, 30);
        let s = TerminalSession::with_probe(&mut probe, TermType::Xterm, ColorMode::Ansi).unwrap();
        let palette = s.palette().unwrap();
        assert!(palette.colors().iter().any(|c| {
            c.kind() == ColorKind::Ansi { id: 1, bold: false } && c.rgb() == Rgb::new(180, 30, 30)
        }));
    }

    // ── Base colors ─────────────────────────────────────────────────────

    #[test]
    fn ansi_base_pairs_plain_and_bold() {
        let regs = reference::XTERM16.map(Rgb::from_tuple);
        let base = base_colors(ColorMode::Ansi, &regs);
        assert_eq!(base.len(), 16);
        assert_eq!(base[0].kind(), ColorKind::Ansi { id: 0, bold: false });
        assert_eq!(base[1].kind(), ColorKind::Ansi { id: 0, bold: true });
        assert_eq!(base[1].rgb(), Rgb::new(127, 127, 127));
        assert_eq!(base[15].rgb(), Rgb::WHITE);
    }

    #[test]
    fn extended_base_takes_cube_above_sixteen() {
        let regs = [Rgb::new(1, 2, 3); 16];
        let base = base_colors(ColorMode::Extended, &regs);
        assert_eq!(base.len(), 256);
        assert_eq!(base[15].rgb(), Rgb::new(1, 2, 3));
        assert_eq!(base[16].rgb(), Rgb::BLACK);
        assert_eq!(base[196].rgb(), Rgb::new(255, 0, 0));
        assert_eq!(base[255].rgb(), Rgb::new(238, 238, 238));
    }

    #[test]
    fn truecolor_has_no_base() {
        assert!(base_colors(ColorMode::Truecolor, &[Rgb::BLACK; 16]).is_empty());
    }

    // ── Approximation ───────────────────────────────────────────────────

    #[test]
    fn truecolor_returns_exact_color() {
        let (mut s, _) = session(TermType::Xterm, ColorMode::Truecolor);
        let c = s.approximate(Rgb::new(12, 34, 56));
        assert_eq!(c.kind(), ColorKind::Truecolor);
        assert_eq!(c.cell_string(), "\x1b[38;2;12;34;56m█");
    }

    #[test]
    fn extended_exact_entries_round_trip() {
        let (mut s, _) = session(TermType::Xterm, ColorMode::Extended);
        assert_eq!(s.approximate(Rgb::new(255, 0, 0)).rgb(), Rgb::new(255, 0, 0));
        assert_eq!(s.approximate(Rgb::new(95, 135, 175)).rgb(), Rgb::new(95, 135, 175));
    }

    #[test]
    fn approximation_is_repeatable() {
        let (mut s, _) = session(TermType::Console, ColorMode::Ansi);
        let q = Rgb::new(123, 45, 67);
        assert_eq!(s.approximate(q), s.approximate(q));
    }

    #[test]
    #[ignore = "visits all 2^24 colors; run with --ignored in release mode"]
    fn extended_session_answers_the_whole_cube() {
        let (mut s, _) = session(TermType::Xterm, ColorMode::Extended);
        for key in 0..(1u32 << 24) {
            let [_, r, g, b] = key.to_be_bytes();
            let rgb = Rgb::new(r, g, b);
            let first = s.approximate(rgb);
            assert_eq!(s.approximate(rgb), first);
        }
    }

    // ── Escape sequences ────────────────────────────────────────────────

    #[test]
    fn cursor_and_screen_sequences() {
        let (s, _) = session(TermType::Xterm, ColorMode::Truecolor);
        assert_eq!(s.move_to(0, 0), "\x1b[1;1H");
        assert_eq!(s.move_to(9, 4), "\x1b[5;10H");
        assert_eq!(s.clear(), "\x1b[2J\x1b[H");
        assert_eq!(s.reset_color(), "\x1b[0m");
    }

    // ── Palette dump ────────────────────────────────────────────────────

    #[test]
    fn truecolor_palette_dump_is_just_a_reset() {
        let (s, _) = session(TermType::Xterm, ColorMode::Truecolor);
        assert_eq!(s.render_palette(2, 80), "\x1b[0m\n");
    }

    #[test]
    fn palette_dump_wraps_lines() {
        let (s, _) = session(TermType::Xterm, ColorMode::Ansi);
        let len = s.palette().unwrap().len();
        let dump = s.render_palette(2, 20);
        // Ten entries per line, plus the closing reset line.
        assert_eq!(dump.matches('\n').count(), len.div_ceil(10) + 1);
        assert!(dump.starts_with("\x1b[0m\n"));
        assert!(dump.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn palette_dump_draws_each_entry_swatch_width_times() {
        let (s, _) = session(TermType::Console, ColorMode::Extended);
        let len = s.palette().unwrap().len();
        let dump = s.render_palette(3, 80);
        let glyphs = dump.chars().filter(|c| " ░▒▓█".contains(*c)).count();
        assert_eq!(glyphs, len * 3);
    }

    #[test]
    fn zero_widths_are_clamped() {
        let (s, _) = session(TermType::Xterm, ColorMode::Ansi);
        let len = s.palette().unwrap().len();
        let dump = s.render_palette(0, 0);
        assert_eq!(dump.matches('\n').count(), len + 1);
    }
}
