// SPDX-License-Identifier: MIT
//
// tview-term — Terminal palette engine for tview.
//
// Turns arbitrary 24-bit colors into something a constrained terminal can
// actually show. On 8/16-color and 256-color terminals the base palette is
// expanded with blended cells (a shade glyph drawn in one color over
// another), deduplicated, bucketed in RGB space, and searched with a
// perceptual distance metric. Truecolor terminals skip all of that.
//
// The crate also owns the small amount of TTY plumbing needed to build a
// palette honestly: window size, font cell size, and live readback of the
// first sixteen color registers, each behind a bounded wait and a raw-mode
// guard that always restores the original termios.

pub mod ansi;
pub mod approx;
pub mod cell;
pub mod color;
pub mod error;
pub mod output;
pub mod palette;
pub mod query;
pub mod session;
pub mod terminal;

pub use approx::ApproximationIndex;
pub use cell::{BlendLevel, ColorKind, PaletteColor};
pub use color::{Hsv, Rgb};
pub use error::{Error, Result};
pub use palette::{Palette, PaletteBuilder};
pub use session::{ColorMode, TermType, TerminalSession};
