// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about what to draw; that's the palette's job. This module
// just knows the byte-level encoding of every terminal command we need,
// including the two capability requests sent while probing.
//
// All cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (ANSI standard uses 1-based coordinates).
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to a `Vec<u8>` or `OutputBuffer`.
use std::io::{self, Write};

use crate::color::Rgb;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using the CUP (Cursor Position) sequence.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Move the cursor to the top-left corner.
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// Select one of the eight standard colors as foreground, optionally over
/// one of the eight as background, optionally bold.
///
/// Starts with SGR 0 so no attribute from the previous cell (a background,
/// a bold flag) leaks into this one. Ids are taken modulo 8.
pub fn ansi_colors(w: &mut impl Write, fg: u8, bg: Option<u8>, bold: bool) -> io::Result<()> {
    write!(w, "\x1b[0m\x1b[3{}", fg % 8)?;
    if let Some(bg) = bg {
        write!(w, ";4{}", bg % 8)?;
    }
    if bold {
        w.write_all(b";1")?;
    }
    w.write_all(b"m")
}

/// Set the foreground to a 256-color palette entry (SGR 38;5).
#[inline]
pub fn fg_indexed(w: &mut impl Write, id: u8) -> io::Result<()> {
    write!(w, "\x1b[38;5;{id}m")
}

/// Set the background to a 256-color palette entry (SGR 48;5).
#[inline]
pub fn bg_indexed(w: &mut impl Write, id: u8) -> io::Result<()> {
    write!(w, "\x1b[48;5;{id}m")
}

/// Set the foreground to a 24-bit color (SGR 38;2).
#[inline]
pub fn fg_rgb(w: &mut impl Write, rgb: Rgb) -> io::Result<()> {
    write!(w, "\x1b[38;2;{};{};{}m", rgb.r, rgb.g, rgb.b)
}

// ─── Capability Requests ─────────────────────────────────────────────────────

/// Ask for the current value of color register `id` (OSC 4 query).
///
/// The terminal answers `ESC ] 4 ; id ; rgb:RR/GG/BB BEL`.
#[inline]
pub fn request_color_register(w: &mut impl Write, id: u8) -> io::Result<()> {
    write!(w, "\x1b]4;{id};?\x07")
}

/// Ask for the text area size in pixels (XTWINOPS 14).
///
/// The terminal answers `ESC [ 4 ; height ; width t`.
#[inline]
pub fn request_text_area_pixels(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[14t")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
