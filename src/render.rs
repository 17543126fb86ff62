// SPDX-License-Identifier: MIT
//
// Frame rendering and animation playback.
//
// A frame is the downscaled picture, centred in the window, one
// approximated cell per pixel. Every frame is built in a single
// `OutputBuffer` and written with one flush. The session is shared by all
// frames so its approximation memo keeps paying off across an animation.

use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tview_term::TerminalSession;
use tview_term::output::OutputBuffer;

use crate::picture::{Frame, Picture};

/// Delay between frames that carry no timing of their own.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

fn clamp_u16(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

/// Append one full frame: clear, rows of cells, cursor parked below.
pub fn render_frame(session: &mut TerminalSession, picture: &Picture, out: &mut OutputBuffer) {
    let window = session.size();
    let start_col = window.cols.saturating_sub(clamp_u16(picture.width())) / 2;
    let start_row = window.rows.saturating_sub(clamp_u16(picture.height())) / 2;

    out.push_str(&session.clear());
    for (y, row) in (0u16..).zip(picture.rows()) {
        out.push_str(&session.move_to(start_col, start_row.saturating_add(y)));
        for &rgb in row {
            out.push_cell(&session.approximate(rgb));
        }
        out.push_str(&session.reset_color());
    }
    out.push_str(&session.move_to(0, start_row.saturating_add(clamp_u16(picture.height()))));
}

/// Fit every frame to the session's window.
pub fn fit_frames(session: &TerminalSession, frames: &mut [Frame]) {
    for frame in frames {
        frame.picture.downscale(session.size(), session.cell_size());
    }
}

/// Show the frames in order, pausing between them, forever if `repeat`.
///
/// A single still picture is drawn once without any pause.
pub fn play(
    session: &mut TerminalSession,
    frames: &[Frame],
    interval: Option<Duration>,
    repeat: bool,
    w: &mut impl Write,
) -> Result<()> {
    let mut out = OutputBuffer::new();
    let animated = frames.len() > 1;

    loop {
        for frame in frames {
            render_frame(session, &frame.picture, &mut out);
            out.flush_to(w).context("cannot write frame")?;
            if animated {
                thread::sleep(interval.or(frame.delay).unwrap_or(DEFAULT_INTERVAL));
            }
        }
        if !(repeat && animated) {
            return Ok(());
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
