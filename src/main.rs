// SPDX-License-Identifier: MIT
//
// tview — show images in the terminal.
//
// This is the driver around tview-term:
//
//   cli     → flags, plus TERM/COLORTERM detection for whatever is missing
//   picture → decoding (image crate) and the box-filter downscale
//   render  → frame assembly into one buffer, animation pacing
//
// Files are decoded before the terminal is probed, so a bad path fails
// without touching the terminal. Logs go to stderr; frames go to stdout.

mod cli;
mod picture;
mod render;

use std::env;
use std::io;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use tview_term::TerminalSession;
use tview_term::output::OutputBuffer;

use crate::cli::Args;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    if let Err(err) = run(&Args::parse()) {
        eprintln!("tview: {err:#}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let term = env::var("TERM").ok();
    let colorterm = env::var("COLORTERM").ok();
    let (term_type, mode) = args.resolve(term.as_deref(), colorterm.as_deref())?;

    let mut frames = if args.palette {
        Vec::new()
    } else {
        picture::load_all(&args.images)?
    };

    let mut session = TerminalSession::open(term_type, mode).context("cannot probe the terminal")?;

    if args.palette {
        let mut out = OutputBuffer::new();
        out.push_str(&session.render_palette(2, session.size().cols));
        return out.flush_stdout().context("cannot write palette");
    }

    render::fit_frames(&session, &mut frames);
    render::play(&mut session, &frames, args.interval(), args.repeat, &mut io::stdout().lock())
}
