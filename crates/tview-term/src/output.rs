// SPDX-License-Identifier: MIT
//
// Frame output buffering.
//
// A rendered picture is thousands of small escape sequences. They are all
// accumulated here and written with one `write()` per frame, which keeps
// other output from interleaving with the frame and bounds syscall overhead.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::PaletteColor;

/// Initial capacity: roughly one 80×24 frame of 256-color cells.
const DEFAULT_CAPACITY: usize = 32_768;

/// Byte buffer holding one frame of terminal output.
///
/// The escape-sequence helpers write into a `Vec`, which cannot fail, so
/// they return nothing.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Buffer sized for `cells` colored cells.
    #[must_use]
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cells),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append text verbatim.
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append one cell drawn in `color`.
    pub fn push_cell(&mut self, color: &PaletteColor) {
        let _ = color.write_cell(&mut self.buf);
    }

    /// Append a cursor move to `(x, y)`, 0-indexed.
    pub fn move_to(&mut self, x: u16, y: u16) {
        let _ = ansi::cursor_to(&mut self.buf, x, y);
    }

    /// Append a screen clear followed by a cursor home.
    pub fn clear_screen(&mut self) {
        let _ = ansi::clear_screen(&mut self.buf);
        let _ = ansi::cursor_home(&mut self.buf);
    }

    /// Append an SGR reset.
    pub fn reset_color(&mut self) {
        let _ = ansi::reset(&mut self.buf);
    }

    /// Drop the contents, keeping the allocation for the next frame.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take the contents as text.
    ///
    /// Everything the crate writes is UTF-8; foreign bytes pushed through
    /// [`Write`] are replaced.
    #[must_use]
    pub fn into_string(self) -> String {
        String::from_utf8(self.buf)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
    }

    /// Write the frame to stdout in one call and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.flush_to(&mut stdout)
    }

    /// Write the frame to `w` in one call and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing goes through flush_stdout() / flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
