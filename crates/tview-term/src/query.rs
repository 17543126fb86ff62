// SPDX-License-Identifier: MIT
//
// Parsers for the terminal's answers to capability requests.
//
// These are pure functions over byte slices so they can be tested without a
// terminal. The TTY side (`terminal.rs`) keeps reading until one of the
// `*_complete` predicates says the batch is whole, then hands the bytes here.
//
// Two responses are understood:
//
//   ESC ] 4 ; <id> ; rgb:<r>/<g>/<b> BEL       color register readback
//   ESC [ 4 ; <height> ; <width> t              text area size in pixels
//
// Color channels may be 2 or 4 hex digits (xterm answers with 4); a 4-digit
// channel keeps its high byte. OSC replies may end in BEL or ST (`ESC \`).
// Bytes outside a recognized report are ignored.

use crate::color::Rgb;
use crate::error::{Error, Result};

/// Query name used in errors for register readback.
pub const COLOR_REGISTERS: &str = "color register";

/// Query name used in errors for the text area size.
pub const TEXT_AREA: &str = "text area size";

const OSC_COLOR: &[u8] = b"\x1b]4;";
const CSI_TEXT_AREA: &[u8] = b"\x1b[4;";
const BEL: u8 = 0x07;
const ESC: u8 = 0x1b;

/// Size of the terminal's text area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelArea {
    pub width: u32,
    pub height: u32,
}

// ─── Scanning ────────────────────────────────────────────────────────────────

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// End of an OSC body: `(body_len, consumed)` where `consumed` includes the
/// terminator.
fn osc_terminator(bytes: &[u8]) -> Option<(usize, usize)> {
    bytes.iter().enumerate().find_map(|(i, &b)| match b {
        BEL => Some((i, i + 1)),
        ESC if bytes.get(i + 1) == Some(&b'\\') => Some((i, i + 2)),
        _ => None,
    })
}

/// Iterator over complete OSC 4 reports: `(report bytes, body bytes)`.
/// Stops at the first report that has not been terminated yet.
fn color_reports(bytes: &[u8]) -> impl Iterator<Item = (&[u8], &[u8])> {
    let mut rest = bytes;
    std::iter::from_fn(move || {
        let start = find(rest, OSC_COLOR)?;
        let body = &rest[start + OSC_COLOR.len()..];
        let (len, consumed) = osc_terminator(body)?;
        let report = &rest[start..start + OSC_COLOR.len() + consumed];
        rest = &body[consumed..];
        Some((report, &body[..len]))
    })
}

// ─── Color Registers ─────────────────────────────────────────────────────────

/// Whether `bytes` holds at least `count` complete register reports.
#[must_use]
pub fn color_reports_complete(bytes: &[u8], count: usize) -> bool {
    color_reports(bytes).count() >= count
}

/// Parse every complete register report in `bytes` as `(id, color)`, in
/// arrival order.
///
/// # Errors
///
/// [`Error::MalformedCapabilityResponse`] if a terminated report does not
/// have the `<id>;rgb:<r>/<g>/<b>` shape.
pub fn parse_color_reports(bytes: &[u8]) -> Result<Vec<(u8, Rgb)>> {
    color_reports(bytes)
        .map(|(report, body)| {
            parse_color_body(body).ok_or_else(|| Error::malformed(COLOR_REGISTERS, report))
        })
        .collect()
}

/// Resolve registers `0..count` from a readback batch.
///
/// Reports for other ids, and repeats, are logged and ignored (the first
/// report for an id wins).
///
/// # Errors
///
/// [`Error::MalformedCapabilityResponse`] if a report is malformed or any
/// register in `0..count` is missing from the batch.
pub fn parse_color_registers(bytes: &[u8], count: usize) -> Result<Vec<Rgb>> {
    let mut registers: Vec<Option<Rgb>> = vec![None; count];
    for (id, rgb) in parse_color_reports(bytes)? {
        match registers.get_mut(usize::from(id)) {
            Some(slot) if slot.is_none() => *slot = Some(rgb),
            Some(_) => log::warn!("duplicate report for color register {id}, ignored"),
            None => log::warn!("unrequested report for color register {id}, ignored"),
        }
    }
    registers
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::malformed(COLOR_REGISTERS, bytes))
}

fn parse_color_body(body: &[u8]) -> Option<(u8, Rgb)> {
    let body = std::str::from_utf8(body).ok()?;
    let (id, value) = body.split_once(';')?;
    let id = parse_decimal(id)?;
    let id = u8::try_from(id).ok()?;

    let mut channels = value.strip_prefix("rgb:")?.split('/');
    let r = parse_channel(channels.next()?)?;
    let g = parse_channel(channels.next()?)?;
    let b = parse_channel(channels.next()?)?;
    if channels.next().is_some() {
        return None;
    }
    Some((id, Rgb::new(r, g, b)))
}

/// One color channel: 2 hex digits as-is, 4 hex digits scaled to 8 bits.
fn parse_channel(hex: &str) -> Option<u8> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u16::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        2 => u8::try_from(value).ok(),
        4 => u8::try_from(value >> 8).ok(),
        _ => None,
    }
}

fn parse_decimal(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ─── Text Area ───────────────────────────────────────────────────────────────

/// Whether `bytes` contains a terminated text area report.
#[must_use]
pub fn text_area_report_complete(bytes: &[u8]) -> bool {
    find(bytes, CSI_TEXT_AREA)
        .is_some_and(|start| bytes[start + CSI_TEXT_AREA.len()..].contains(&b't'))
}

/// Parse `ESC [ 4 ; <height> ; <width> t`.
///
/// # Errors
///
/// [`Error::MalformedCapabilityResponse`] if no well-formed report is found.
pub fn parse_text_area_report(bytes: &[u8]) -> Result<PixelArea> {
    let malformed = || Error::malformed(TEXT_AREA, bytes);

    let start = find(bytes, CSI_TEXT_AREA).ok_or_else(malformed)?;
    let params = &bytes[start + CSI_TEXT_AREA.len()..];
    let end = params.iter().position(|&b| b == b't').ok_or_else(malformed)?;
    let params = std::str::from_utf8(&params[..end]).map_err(|_| malformed())?;

    let (height, width) = params.split_once(';').ok_or_else(malformed)?;
    let height = parse_decimal(height).ok_or_else(malformed)?;
    let width = parse_decimal(width).ok_or_else(malformed)?;
    Ok(PixelArea { width, height })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
