// SPDX-License-Identifier: MIT
//
// Command line, and terminal type / color mode detection.
//
// Flags win. Whatever is not given on the command line is derived from
// TERM and COLORTERM here, in the binary; the library only ever receives
// resolved values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{ArgGroup, Parser};
use tview_term::{ColorMode, TermType};

/// Show images in the terminal, approximated against its color palette.
///
/// Several files, or an animated GIF, play as an animation.
#[derive(Parser, Debug)]
#[command(name = "tview", version, about)]
#[command(group(ArgGroup::new("term").args(["console", "xterm"])))]
#[command(group(ArgGroup::new("colors").args(["ansi", "extended", "truecolor"])))]
pub struct Args {
    /// Image files to show
    #[arg(value_name = "IMAGE", required_unless_present = "palette")]
    pub images: Vec<PathBuf>,

    /// Treat the terminal as the Linux console
    #[arg(long)]
    pub console: bool,

    /// Treat the terminal as an xterm-compatible emulator
    #[arg(long)]
    pub xterm: bool,

    /// Use the 8 ANSI colors (and their bold variants)
    #[arg(long)]
    pub ansi: bool,

    /// Use the 256-color palette
    #[arg(long)]
    pub extended: bool,

    /// Use 24-bit color
    #[arg(long)]
    pub truecolor: bool,

    /// Delay between animation frames, overriding the GIF's own timing
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Repeat the animation until interrupted
    #[arg(long = "loop")]
    pub repeat: bool,

    /// Print the terminal palette instead of showing images
    #[arg(long)]
    pub palette: bool,
}

impl Args {
    /// Frame interval override, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.interval.map(Duration::from_millis)
    }

    /// Terminal type and color mode, from flags first, then from the
    /// given `TERM` and `COLORTERM` values.
    pub fn resolve(&self, term: Option<&str>, colorterm: Option<&str>) -> Result<(TermType, ColorMode)> {
        let term_type = if self.console {
            TermType::Console
        } else if self.xterm {
            TermType::Xterm
        } else {
            detect_term_type(term)?
        };

        let mode = if self.ansi {
            ColorMode::Ansi
        } else if self.extended {
            ColorMode::Extended
        } else if self.truecolor {
            ColorMode::Truecolor
        } else {
            detect_color_mode(term, colorterm)?
        };

        log::debug!("terminal {term_type:?}, colors {mode}");
        Ok((term_type, mode))
    }
}

// ─── Detection ──────────────────────────────────────────────────────────────

fn known_term(term: Option<&str>) -> Result<&str> {
    match term {
        None => bail!("unknown terminal type: TERM is not set"),
        Some(t @ ("xterm" | "xterm-256color" | "linux")) => Ok(t),
        Some(other) => bail!("unknown terminal type {other:?}"),
    }
}

/// `xterm` and `xterm-256color` are xterms, `linux` is the console.
pub fn detect_term_type(term: Option<&str>) -> Result<TermType> {
    Ok(match known_term(term)? {
        "linux" => TermType::Console,
        _ => TermType::Xterm,
    })
}

/// Truecolor if an xterm advertises `COLORTERM=truecolor`, 256 colors for
/// `xterm-256color`, ANSI otherwise.
pub fn detect_color_mode(term: Option<&str>, colorterm: Option<&str>) -> Result<ColorMode> {
    Ok(match known_term(term)? {
        "linux" => ColorMode::Ansi,
        _ if colorterm == Some("truecolor") => ColorMode::Truecolor,
        "xterm-256color" => ColorMode::Extended,
        _ => ColorMode::Ansi,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tview").chain(args.iter().copied())).unwrap()
    }

    // ── Parsing ─────────────────────────────────────────────────────────

    #[test]
    fn images_are_positional() {
        let args = parse(&["a.png", "b.png"]);
        assert_eq!(args.images, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert!(!args.palette);
    }

    #[test]
    fn image_required_without_palette() {
        assert!(Args::try_parse_from(["tview"]).is_err());
        assert!(parse(&["--palette"]).images.is_empty());
    }

    #[test]
    fn term_flags_are_exclusive() {
        assert!(Args::try_parse_from(["tview", "--console", "--xterm", "a.png"]).is_err());
    }

    #[test]
    fn color_flags_are_exclusive() {
        assert!(Args::try_parse_from(["tview", "--ansi", "--truecolor", "a.png"]).is_err());
        assert!(Args::try_parse_from(["tview", "--extended", "--ansi", "a.png"]).is_err());
    }

    #[test]
    fn interval_and_loop() {
        let args = parse(&["--interval", "40", "--loop", "a.gif"]);
        assert_eq!(args.interval(), Some(Duration::from_millis(40)));
        assert!(args.repeat);
    }

    // ── Resolution ──────────────────────────────────────────────────────

    #[test]
    fn flags_need_no_environment() {
        let args = parse(&["--console", "--extended", "a.png"]);
        assert_eq!(args.resolve(None, None).unwrap(), (TermType::Console, ColorMode::Extended));
    }

    #[test]
    fn missing_flags_are_detected() {
        let args = parse(&["--truecolor", "a.png"]);
        assert_eq!(
            args.resolve(Some("linux"), None).unwrap(),
            (TermType::Console, ColorMode::Truecolor)
        );
    }

    #[test]
    fn unset_term_is_an_error() {
        let args = parse(&["a.png"]);
        let err = args.resolve(None, None).unwrap_err();
        assert!(err.to_string().contains("TERM is not set"));
    }

    // ── Detection ───────────────────────────────────────────────────────

    #[test]
    fn term_types() {
        assert_eq!(detect_term_type(Some("xterm")).unwrap(), TermType::Xterm);
        assert_eq!(detect_term_type(Some("xterm-256color")).unwrap(), TermType::Xterm);
        assert_eq!(detect_term_type(Some("linux")).unwrap(), TermType::Console);
        assert!(detect_term_type(Some("screen")).is_err());
    }

    #[test]
    fn color_modes() {
        assert_eq!(detect_color_mode(Some("xterm"), None).unwrap(), ColorMode::Ansi);
        assert_eq!(detect_color_mode(Some("xterm-256color"), None).unwrap(), ColorMode::Extended);
        assert_eq!(
            detect_color_mode(Some("xterm"), Some("truecolor")).unwrap(),
            ColorMode::Truecolor
        );
        assert_eq!(
            detect_color_mode(Some("xterm-256color"), Some("24bit")).unwrap(),
            ColorMode::Extended
        );
    }

    #[test]
    fn console_ignores_colorterm() {
        assert_eq!(detect_color_mode(Some("linux"), Some("truecolor")).unwrap(), ColorMode::Ansi);
    }

    #[test]
    fn unknown_term_is_named_in_the_error() {
        let err = detect_color_mode(Some("vt100"), None).unwrap_err();
        assert!(err.to_string().contains("vt100"));
    }
}
