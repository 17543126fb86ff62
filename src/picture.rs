// SPDX-License-Identifier: MIT
//
// Decoded pictures and the box filter that shrinks them to the window.
//
// After `downscale` a picture holds one pixel per terminal cell. Each cell
// covers `ppc_col × ppc_row` source pixels, chosen so that the picture
// fills the window in the limiting direction while keeping its aspect
// ratio on screen (cells are taller than wide).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbImage};
use tview_term::Rgb;
use tview_term::terminal::{CellSize, Size};

/// Packed RGB pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Picture {
    /// A picture from row-major pixels.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Self {
        assert_eq!(pixels.len(), width as usize * height as usize, "pixel count");
        Self { width, height, pixels }
    }

    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let pixels = img.pixels().map(|p| Rgb::new(p[0], p[1], p[2])).collect();
        Self::new(img.width(), img.height(), pixels)
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Rows of pixels, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Rgb]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }

    /// Shrink to at most `window` pixels, one per cell, averaging the
    /// source pixels each cell covers.
    ///
    /// No-op when a cell would cover less than one source pixel.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn downscale(&mut self, window: Size, cell: CellSize) {
        if self.pixels.is_empty() || window.area() == 0 || cell.width == 0 || cell.height == 0 {
            return;
        }
        let (src_w, src_h) = (f64::from(self.width), f64::from(self.height));
        let (pw, ph) = (f64::from(cell.width), f64::from(cell.height));

        let ppc_row = (src_w / (pw * f64::from(window.cols))).max(src_h / (ph * f64::from(window.rows))) * ph;
        let ppc_col = ppc_row * pw / ph;
        if ppc_row < 1.0 || ppc_col < 1.0 {
            return;
        }

        // Source index range `[ceil(i·ppc), ceil((i+1)·ppc))`, clipped.
        let span = |i: u32, ppc: f64, limit: u32| {
            let start = (f64::from(i) * ppc).ceil() as u32;
            let end = ((f64::from(i + 1) * ppc).ceil() as u32).min(limit);
            start..end
        };
        let out_w = (0..u32::from(window.cols))
            .take_while(|&x| !span(x, ppc_col, self.width).is_empty())
            .count() as u32;
        let out_h = (0..u32::from(window.rows))
            .take_while(|&y| !span(y, ppc_row, self.height).is_empty())
            .count() as u32;

        let mut pixels = Vec::with_capacity(out_w as usize * out_h as usize);
        for y in 0..out_h {
            let rows = span(y, ppc_row, self.height);
            for x in 0..out_w {
                let cols = span(x, ppc_col, self.width);
                pixels.push(self.mean(cols, rows.clone()));
            }
        }

        log::debug!(
            "downscaled {}x{} to {out_w}x{out_h} ({ppc_col:.2}x{ppc_row:.2} px per cell)",
            self.width,
            self.height
        );
        *self = Self::new(out_w, out_h, pixels);
    }

    /// Integer mean over a non-empty block.
    #[allow(clippy::cast_possible_truncation)]
    fn mean(&self, cols: std::ops::Range<u32>, rows: std::ops::Range<u32>) -> Rgb {
        let mut sum = [0u64; 3];
        let mut count = 0u64;
        for y in rows {
            for x in cols.clone() {
                let p = self.pixel(x, y);
                for (s, c) in sum.iter_mut().zip(p.channels()) {
                    *s += u64::from(c);
                }
                count += 1;
            }
        }
        let [r, g, b] = sum.map(|s| (s / count.max(1)) as u8);
        Rgb::new(r, g, b)
    }
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// One picture of an animation, with its own delay if the file had one.
#[derive(Debug, Clone)]
pub struct Frame {
    pub picture: Picture,
    pub delay: Option<Duration>,
}

/// Decode a file: every frame of a GIF, or the single image of anything
/// else.
pub fn load(path: &Path) -> Result<Vec<Frame>> {
    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .with_context(|| format!("cannot open {}", path.display()))?;

    if reader.format() == Some(ImageFormat::Gif) {
        return load_gif(path);
    }

    let img = reader
        .decode()
        .with_context(|| format!("cannot decode {}", path.display()))?;
    Ok(vec![Frame {
        picture: Picture::from_rgb_image(&img.to_rgb8()),
        delay: None,
    }])
}

fn load_gif(path: &Path) -> Result<Vec<Frame>> {
    let context = || format!("cannot decode {}", path.display());
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let frames = GifDecoder::new(BufReader::new(file))
        .with_context(context)?
        .into_frames()
        .collect_frames()
        .with_context(context)?;

    log::debug!("{}: {} gif frames", path.display(), frames.len());
    Ok(frames
        .into_iter()
        .map(|frame| {
            let delay = Duration::from(frame.delay());
            let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            Frame {
                picture: Picture::from_rgb_image(&rgb),
                delay: Some(delay),
            }
        })
        .collect())
}

/// Decode every file, in order.
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for path in paths {
        frames.extend(load(path)?);
    }
    Ok(frames)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: u32, height: u32, rgb: Rgb) -> Picture {
        Picture::new(width, height, vec![rgb; width as usize * height as usize])
    }

    /// Left half black, right half white.
    fn split(width: u32, height: u32) -> Picture {
        let pixels = (0..height)
            .flat_map(|_| (0..width).map(move |x| if x < width / 2 { Rgb::BLACK } else { Rgb::WHITE }))
            .collect();
        Picture::new(width, height, pixels)
    }

    const WINDOW: Size = Size { cols: 10, rows: 5 };
    const SQUARE_CELL: CellSize = CellSize { width: 1, height: 1 };

    // ── Construction ────────────────────────────────────────────────────

    #[test]
    fn from_rgb_image_keeps_layout() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, image::Rgb([1, 2, 3]));
        let pic = Picture::from_rgb_image(&img);
        assert_eq!(pic.width(), 2);
        assert_eq!(pic.pixel(0, 0), Rgb::BLACK);
        assert_eq!(pic.pixel(1, 0), Rgb::new(1, 2, 3));
    }

    #[test]
    #[should_panic(expected = "pixel count")]
    fn new_checks_pixel_count() {
        let _ = Picture::new(2, 2, vec![Rgb::BLACK; 3]);
    }

    #[test]
    fn rows_iterate_top_down() {
        let pic = Picture::new(2, 2, vec![Rgb::BLACK, Rgb::BLACK, Rgb::WHITE, Rgb::WHITE]);
        let rows: Vec<_> = pic.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], &[Rgb::WHITE, Rgb::WHITE][..]);
    }

    // ── Downscale ───────────────────────────────────────────────────────

    #[test]
    fn small_picture_is_left_alone() {
        let mut pic = solid(4, 2, Rgb::WHITE);
        let before = pic.clone();
        pic.downscale(WINDOW, SQUARE_CELL);
        assert_eq!(pic, before);
    }

    #[test]
    fn exact_halving() {
        // 20×10 into 10×5 square cells: 2×2 pixels per cell.
        let mut pic = split(20, 10);
        pic.downscale(WINDOW, SQUARE_CELL);
        assert_eq!((pic.width(), pic.height()), (10, 5));
        assert_eq!(pic.pixel(0, 0), Rgb::BLACK);
        assert_eq!(pic.pixel(9, 4), Rgb::WHITE);
    }

    #[test]
    fn blocks_are_averaged() {
        // Two columns per cell straddling the black/white edge at x = 3.
        let mut pic = split(6, 2);
        pic.downscale(Size { cols: 3, rows: 1 }, SQUARE_CELL);
        assert_eq!((pic.width(), pic.height()), (3, 1));
        assert_eq!(pic.pixel(0, 0), Rgb::BLACK);
        assert_eq!(pic.pixel(1, 0), Rgb::new(127, 127, 127));
        assert_eq!(pic.pixel(2, 0), Rgb::WHITE);
    }

    #[test]
    fn limiting_direction_fills_the_window() {
        // Wide picture: width limits, height shrinks proportionally.
        let mut pic = solid(100, 10, Rgb::WHITE);
        pic.downscale(WINDOW, SQUARE_CELL);
        assert_eq!(pic.width(), 10);
        assert_eq!(pic.height(), 1);
    }

    #[test]
    fn tall_cells_keep_aspect_ratio() {
        // 8×16 px cells: a square picture becomes twice as many columns as rows.
        let mut pic = solid(160, 160, Rgb::WHITE);
        pic.downscale(Size { cols: 80, rows: 10 }, CellSize { width: 8, height: 16 });
        assert_eq!((pic.width(), pic.height()), (20, 10));
    }

    #[test]
    fn never_exceeds_the_window() {
        let mut pic = solid(333, 177, Rgb::BLACK);
        pic.downscale(Size { cols: 37, rows: 11 }, CellSize { width: 7, height: 15 });
        assert!(pic.width() <= 37);
        assert!(pic.height() <= 11);
        assert!(pic.width() > 0 && pic.height() > 0);
    }

    #[test]
    fn degenerate_geometry_is_ignored() {
        let mut pic = solid(20, 10, Rgb::WHITE);
        let before = pic.clone();
        pic.downscale(Size { cols: 0, rows: 5 }, SQUARE_CELL);
        pic.downscale(WINDOW, CellSize { width: 0, height: 1 });
        assert_eq!(pic, before);
    }

    // ── Loading ─────────────────────────────────────────────────────────

    #[test]
    fn load_png_from_disk() {
        let dir = std::env::temp_dir().join(format!("tview-png-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dot.png");
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let frames = load(&path).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].delay, None);
        assert_eq!(frames[0].picture.pixel(2, 1), Rgb::new(10, 20, 30));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load(Path::new("/nonexistent/tview.png")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tview.png"));
    }
}
