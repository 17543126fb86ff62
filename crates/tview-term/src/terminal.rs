// SPDX-License-Identifier: MIT
//
// Controlling terminal access for capability probing.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ, KDFONTOP), isatty and poll. These are the
// standard POSIX interfaces for terminal control; each unsafe block is
// minimal.
#![allow(unsafe_code)]
//
// Queries go to `/dev/tty` rather than stdin/stdout so probing still works
// when the image is piped in or the frame is redirected. Every
// request/response exchange runs inside a `RawMode` guard (no echo, no line
// buffering) which restores the saved termios when dropped, on success and
// on every early error return alike.
//
// Reads are bounded: after a request is written the whole response batch
// must arrive within `RESPONSE_TIMEOUT`. Silence is reported as a timeout,
// a partial or unrecognizable answer as a malformed response. Nothing is
// retried.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::ansi;
use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::query::{self, PixelArea};
use crate::session::TermType;

/// Bounded wait for a complete response batch.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Query name used in errors for the window size.
pub const WINDOW_SIZE: &str = "window size";

/// Query name used in errors for the console font size.
pub const FONT_SIZE: &str = "console font size";

#[cfg(unix)]
const READ_BUF_SIZE: usize = 1024;

#[cfg(unix)]
const TTY_PATH: &str = "/dev/tty";

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

/// Pixel dimensions of one character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl CellSize {
    /// Per-cell size from the text area in pixels and the window in cells.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedCapabilityResponse`] if the area is smaller than
    /// one pixel per cell in either direction.
    pub fn from_text_area(area: PixelArea, window: Size) -> Result<Self> {
        let width = area.width / u32::from(window.cols.max(1));
        let height = area.height / u32::from(window.rows.max(1));
        if width == 0 || height == 0 {
            let reported = format!("{}x{} px over {}x{} cells", area.width, area.height, window.cols, window.rows);
            return Err(Error::malformed(query::TEXT_AREA, reported.as_bytes()));
        }
        Ok(Self { width, height })
    }
}

// ─── Probe ──────────────────────────────────────────────────────────────────

/// Source of terminal capabilities.
///
/// [`TtyProbe`] asks the real terminal; tests substitute canned answers.
pub trait Probe {
    /// Window size in character cells.
    ///
    /// # Errors
    ///
    /// Any failure to determine the size.
    fn window_size(&mut self) -> Result<Size>;

    /// Pixel size of one cell on a terminal of type `term` whose window is
    /// `window` cells large.
    ///
    /// # Errors
    ///
    /// Timeout, malformed response, or an unsupported query.
    fn cell_size(&mut self, term: TermType, window: Size) -> Result<CellSize>;

    /// Live values of color registers `0..count`.
    ///
    /// # Errors
    ///
    /// Timeout, or a batch missing any requested register.
    fn color_registers(&mut self, count: u8) -> Result<Vec<Rgb>>;
}

/// [`Probe`] backed by the controlling terminal.
pub struct TtyProbe {
    tty: Tty,
}

impl TtyProbe {
    /// Open the controlling terminal.
    ///
    /// # Errors
    ///
    /// [`Error::NoControllingTerminal`] if there is none.
    pub fn open() -> Result<Self> {
        Tty::open().map(|tty| Self { tty })
    }
}

impl Probe for TtyProbe {
    fn window_size(&mut self) -> Result<Size> {
        self.tty.window_size()
    }

    fn cell_size(&mut self, term: TermType, window: Size) -> Result<CellSize> {
        match term {
            TermType::Console => self.tty.font_size(),
            TermType::Xterm => {
                let mut request = Vec::new();
                ansi::request_text_area_pixels(&mut request)?;
                let response =
                    self.tty.exchange(&request, query::TEXT_AREA, query::text_area_report_complete)?;
                CellSize::from_text_area(query::parse_text_area_report(&response)?, window)
            }
        }
    }

    fn color_registers(&mut self, count: u8) -> Result<Vec<Rgb>> {
        let mut request = Vec::new();
        for id in 0..count {
            ansi::request_color_register(&mut request, id)?;
        }
        let wanted = usize::from(count);
        let response = self.tty.exchange(&request, query::COLOR_REGISTERS, |bytes| {
            query::color_reports_complete(bytes, wanted)
        })?;
        query::parse_color_registers(&response, wanted)
    }
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// Read/write handle on the controlling terminal.
pub struct Tty {
    file: File,
}

impl Tty {
    /// Open `/dev/tty`.
    ///
    /// # Errors
    ///
    /// [`Error::NoControllingTerminal`] if it cannot be opened or is not a
    /// terminal.
    #[cfg(unix)]
    pub fn open() -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TTY_PATH)
            .map_err(|err| {
                log::debug!("cannot open {TTY_PATH}: {err}");
                Error::NoControllingTerminal
            })?;

        if unsafe { libc::isatty(file.as_raw_fd()) } == 0 {
            return Err(Error::NoControllingTerminal);
        }
        Ok(Self { file })
    }

    #[cfg(not(unix))]
    pub fn open() -> Result<Self> {
        Err(Error::NoControllingTerminal)
    }

    /// Window size via `ioctl(TIOCGWINSZ)`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the ioctl fails, malformed if it reports a zero
    /// dimension.
    #[cfg(unix)]
    pub fn window_size(&self) -> Result<Size> {
        use std::os::unix::io::AsRawFd;

        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), libc::TIOCGWINSZ, &raw mut ws) };
        if result != 0 {
            return Err(io::Error::last_os_error().into());
        }
        if ws.ws_col == 0 || ws.ws_row == 0 {
            let reported = format!("{}x{}", ws.ws_col, ws.ws_row);
            return Err(Error::malformed(WINDOW_SIZE, reported.as_bytes()));
        }
        Ok(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    }

    #[cfg(not(unix))]
    pub fn window_size(&self) -> Result<Size> {
        Err(Error::Unsupported { query: WINDOW_SIZE })
    }

    /// Console font cell size via `ioctl(KDFONTOP, KD_FONT_OP_GET)`.
    ///
    /// Passing no data buffer makes the kernel report the font's
    /// dimensions without copying glyphs.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the ioctl fails (e.g. not a virtual console),
    /// [`Error::Unsupported`] off Linux.
    #[cfg(target_os = "linux")]
    pub fn font_size(&self) -> Result<CellSize> {
        use std::os::unix::io::AsRawFd;

        // <linux/kd.h>
        const KDFONTOP: libc::c_ulong = 0x4B72;
        const KD_FONT_OP_GET: libc::c_uint = 1;

        #[repr(C)]
        struct ConsoleFontOp {
            op: libc::c_uint,
            flags: libc::c_uint,
            width: libc::c_uint,
            height: libc::c_uint,
            charcount: libc::c_uint,
            data: *mut libc::c_uchar,
        }

        // Upper bounds the kernel checks the current font against.
        let mut op = ConsoleFontOp {
            op: KD_FONT_OP_GET,
            flags: 0,
            width: 64,
            height: 128,
            charcount: 512,
            data: std::ptr::null_mut(),
        };
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), KDFONTOP as _, &raw mut op) };
        if result != 0 {
            return Err(io::Error::last_os_error().into());
        }
        if op.width == 0 || op.height == 0 {
            let reported = format!("{}x{}", op.width, op.height);
            return Err(Error::malformed(FONT_SIZE, reported.as_bytes()));
        }
        log::trace!("console font {}x{}, {} glyphs", op.width, op.height, op.charcount);
        Ok(CellSize {
            width: op.width,
            height: op.height,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn font_size(&self) -> Result<CellSize> {
        Err(Error::Unsupported { query: FONT_SIZE })
    }

    /// Put the terminal in raw mode until the guard is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the termios cannot be read or written.
    pub fn raw_mode(&self) -> Result<RawMode<'_>> {
        RawMode::enter(self)
    }

    /// Write `request`, then read until `complete` accepts the bytes
    /// collected so far or [`RESPONSE_TIMEOUT`] elapses.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityQueryTimeout`] if nothing arrived,
    /// [`Error::MalformedCapabilityResponse`] if something arrived but never
    /// completed, [`Error::Io`] on read/write failure.
    pub fn exchange(
        &self,
        request: &[u8],
        query: &'static str,
        complete: impl Fn(&[u8]) -> bool,
    ) -> Result<Vec<u8>> {
        let _raw = self.raw_mode()?;

        (&self.file).write_all(request)?;
        (&self.file).flush()?;

        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        let mut response = Vec::new();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if !self.read_some(&mut response, remaining)? {
                break;
            }
            if complete(&response) {
                log::trace!("{query} response: {:?}", String::from_utf8_lossy(&response));
                return Ok(response);
            }
        }

        if response.is_empty() {
            Err(Error::CapabilityQueryTimeout { query })
        } else {
            Err(Error::malformed(query, &response))
        }
    }

    /// Wait up to `timeout` for input and append whatever is available.
    /// Returns `false` on timeout or end of file.
    #[cfg(unix)]
    fn read_some(&self, out: &mut Vec<u8>, timeout: Duration) -> Result<bool> {
        use std::os::unix::io::AsRawFd;

        let fd = self.file.as_raw_fd();
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);

        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, timeout_ms)
        };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(true);
            }
            return Err(err.into());
        }
        if ready == 0 {
            return Ok(false);
        }

        let mut buf = [0u8; READ_BUF_SIZE];
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }
        if n == 0 {
            return Ok(false);
        }
        #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
        out.extend_from_slice(&buf[..n as usize]);
        Ok(true)
    }

    #[cfg(not(unix))]
    fn read_some(&self, _out: &mut Vec<u8>, _timeout: Duration) -> Result<bool> {
        Ok(false)
    }
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// Scoped raw mode on a [`Tty`]. Restores the saved termios on drop.
pub struct RawMode<'a> {
    tty: &'a Tty,
    #[cfg(unix)]
    original: libc::termios,
}

impl<'a> RawMode<'a> {
    #[cfg(unix)]
    fn enter(tty: &'a Tty) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let fd = tty.file.as_raw_fd();
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &raw mut termios) } != 0 {
            return Err(io::Error::last_os_error().into());
        }
        let original = termios;
        make_raw(&mut termios);
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) } != 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(Self { tty, original })
    }

    #[cfg(not(unix))]
    fn enter(tty: &'a Tty) -> Result<Self> {
        Ok(Self { tty })
    }
}

impl Drop for RawMode<'_> {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = self.tty.file.as_raw_fd();
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw const self.original) } != 0 {
                log::warn!("failed to restore terminal mode: {}", io::Error::last_os_error());
            }
        }
    }
}

/// `cfmakeraw` equivalent: no echo, no line discipline, 8-bit bytes.
#[cfg(unix)]
fn make_raw(termios: &mut libc::termios) {
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    // Reads are paced by poll(); read() just returns what is there.
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
