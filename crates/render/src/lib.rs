mod colormap;
mod font;

use std::path::{Path, PathBuf};

use spectra_audio::{Spectrogram, DB_FLOOR};

pub use colormap::magma;

const MARGIN_LEFT: u32 = 66;
const MARGIN_RIGHT: u32 = 78;
const MARGIN_TOP: u32 = 28;
const MARGIN_BOTTOM: u32 = 42;
const COLORBAR_GAP: u32 = 12;
const COLORBAR_WIDTH: u32 = 18;
const TICK_LEN: u32 = 4;
const MIN_PLOT: u32 = 16;

const BG: [u8; 3] = [255, 255, 255];
const FG: [u8; 3] = [20, 20, 20];

/// Output size and dynamic range of a rendered spectrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Bottom of the color scale in dB; values below clamp to the darkest color.
    pub floor_db: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            floor_db: DB_FLOOR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("spectrogram has no data to render")]
    EmptyMatrix,

    #[error("image dimensions {width}x{height} leave no room for the plot")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("failed to write image to '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// An RGB8 raster of a rendered spectrogram, ready to display as a texture
/// or to encode to a file with [`export`].
#[derive(Clone, PartialEq)]
pub struct RenderedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderedImage {
    fn blank(width: u32, height: u32) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&BG);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw interleaved RGB8 pixel data, row-major from the top-left.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Color of the pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * self.width + x) * 3) as usize;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    fn put(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y * self.width + x) * 3) as usize;
        self.pixels[i..i + 3].copy_from_slice(&color);
    }

    fn hline(&mut self, x0: u32, x1: u32, y: u32, color: [u8; 3]) {
        for x in x0..=x1 {
            self.put(x, y, color);
        }
    }

    fn vline(&mut self, x: u32, y0: u32, y1: u32, color: [u8; 3]) {
        for y in y0..=y1 {
            self.put(x, y, color);
        }
    }

    fn text(&mut self, x: u32, y: u32, text: &str, color: [u8; 3]) {
        let mut cx = x;
        for c in text.chars() {
            let rows = font::glyph(c);
            for (dy, row) in rows.iter().enumerate() {
                for dx in 0..font::GLYPH_WIDTH {
                    if row & (1 << (font::GLYPH_WIDTH - 1 - dx)) != 0 {
                        self.put(cx + dx as u32, y + dy as u32, color);
                    }
                }
            }
            cx += font::ADVANCE as u32;
        }
    }
}

impl std::fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Render a spectrogram into an image with a time axis in seconds, a
/// log-scaled frequency axis in Hz, a title and a dB colorbar.
///
/// The frequency axis spans the first non-DC bin up to Nyquist; bin 0
/// cannot sit on a log scale and is pinned below the axis floor. Output is
/// fully determined by the spectrogram and options.
pub fn render(
    spectrogram: &Spectrogram,
    title: &str,
    options: &RenderOptions,
) -> Result<RenderedImage, RenderError> {
    // A log frequency axis needs at least one non-DC bin
    if spectrogram.num_frames() == 0 || spectrogram.num_bins() < 2 {
        return Err(RenderError::EmptyMatrix);
    }

    let width = options.width;
    let height = options.height;
    if width < MARGIN_LEFT + MARGIN_RIGHT + MIN_PLOT
        || height < MARGIN_TOP + MARGIN_BOTTOM + MIN_PLOT
    {
        return Err(RenderError::InvalidDimensions { width, height });
    }

    let plot_w = width - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = height - MARGIN_TOP - MARGIN_BOTTOM;
    let floor_db = options.floor_db.min(-1.0);

    let mut img = RenderedImage::blank(width, height);

    let bin_hz = spectrogram.bin_frequency(1);
    let log_min = bin_hz.ln();
    let log_max = spectrogram.max_frequency().ln();
    let num_bins = spectrogram.num_bins();
    let num_frames = spectrogram.num_frames();
    let duration = spectrogram.duration_secs();

    // Spectrogram cells, nearest bin/frame per pixel
    for py in 0..plot_h {
        let frac = 1.0 - (py as f32 + 0.5) / plot_h as f32;
        let freq = (log_min + frac * (log_max - log_min)).exp();
        let bin = ((freq / bin_hz).round() as usize).clamp(1, num_bins - 1);
        for px in 0..plot_w {
            let frame = (((px as f32 + 0.5) / plot_w as f32) * num_frames as f32) as usize;
            let frame = frame.min(num_frames - 1);
            let value = spectrogram.value(bin, frame);
            let norm = (value - floor_db) / -floor_db;
            img.put(MARGIN_LEFT + px, MARGIN_TOP + py, magma(norm));
        }
    }

    // Plot frame
    img.hline(MARGIN_LEFT - 1, MARGIN_LEFT + plot_w, MARGIN_TOP - 1, FG);
    img.hline(MARGIN_LEFT - 1, MARGIN_LEFT + plot_w, MARGIN_TOP + plot_h, FG);
    img.vline(MARGIN_LEFT - 1, MARGIN_TOP - 1, MARGIN_TOP + plot_h, FG);
    img.vline(MARGIN_LEFT + plot_w, MARGIN_TOP - 1, MARGIN_TOP + plot_h, FG);

    draw_time_axis(&mut img, duration, plot_w, plot_h);
    draw_frequency_axis(&mut img, spectrogram, plot_h);
    draw_colorbar(&mut img, floor_db, plot_w, plot_h);

    // Title, centered
    let title_w = font::text_width(title) as u32;
    let title_x = (width.saturating_sub(title_w)) / 2;
    img.text(title_x, 8, title, FG);

    log::debug!(
        "rendered {}x{} spectrogram image ({} bins x {} frames)",
        width,
        height,
        num_bins,
        num_frames
    );

    Ok(img)
}

/// Encode a rendered image to `path`. The format is inferred from the file
/// extension; an unknown or missing extension falls back to PNG. Writing
/// the same image to the same destination twice produces identical bytes.
pub fn export(image: &RenderedImage, path: &Path) -> Result<(), RenderError> {
    let raster = image::RgbImage::from_raw(image.width, image.height, image.pixels.clone())
        .expect("pixel buffer matches dimensions");

    let format = image::ImageFormat::from_path(path).unwrap_or(image::ImageFormat::Png);
    raster
        .save_with_format(path, format)
        .map_err(|source| RenderError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    log::info!("exported spectrogram image to '{}'", path.display());
    Ok(())
}

fn nice_time_step(duration: f32) -> f32 {
    const STEPS: [f32; 12] = [
        0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0,
    ];
    for step in STEPS {
        if duration / step <= 8.0 {
            return step;
        }
    }
    600.0
}

fn draw_time_axis(img: &mut RenderedImage, duration: f32, plot_w: u32, plot_h: u32) {
    let axis_y = MARGIN_TOP + plot_h;
    let step = nice_time_step(duration);

    let mut t = 0.0f32;
    while t <= duration + step * 1e-3 {
        let px = MARGIN_LEFT + ((t / duration) * plot_w as f32).min(plot_w as f32) as u32;
        img.vline(px, axis_y + 1, axis_y + TICK_LEN, FG);

        let label = if step < 1.0 {
            format!("{t:.1}")
        } else {
            format!("{t:.0}")
        };
        let label_w = font::text_width(&label) as u32;
        img.text(px.saturating_sub(label_w / 2), axis_y + TICK_LEN + 3, &label, FG);
        t += step;
    }

    let caption = "Time (s)";
    let caption_w = font::text_width(caption) as u32;
    img.text(
        MARGIN_LEFT + (plot_w.saturating_sub(caption_w)) / 2,
        img.height() - 11,
        caption,
        FG,
    );
}

fn draw_frequency_axis(img: &mut RenderedImage, spectrogram: &Spectrogram, plot_h: u32) {
    const TICKS: [f32; 13] = [
        10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0,
        100000.0,
    ];

    let f_min = spectrogram.bin_frequency(1);
    let f_max = spectrogram.max_frequency();
    let log_min = f_min.ln();
    let log_max = f_max.ln();

    for freq in TICKS {
        if freq < f_min * 0.999 || freq > f_max * 1.001 {
            continue;
        }
        let frac = (freq.ln() - log_min) / (log_max - log_min);
        let py = MARGIN_TOP + (((1.0 - frac) * plot_h as f32) as u32).min(plot_h - 1);
        img.hline(MARGIN_LEFT - 1 - TICK_LEN, MARGIN_LEFT - 2, py, FG);

        let label = if freq >= 1000.0 {
            format!("{:.0}k", freq / 1000.0)
        } else {
            format!("{freq:.0}")
        };
        let label_w = font::text_width(&label) as u32;
        img.text(
            (MARGIN_LEFT - TICK_LEN - 4).saturating_sub(label_w),
            py.saturating_sub(3),
            &label,
            FG,
        );
    }

    img.text(6, MARGIN_TOP - 12, "Hz", FG);
}

fn draw_colorbar(img: &mut RenderedImage, floor_db: f32, plot_w: u32, plot_h: u32) {
    let bar_x = MARGIN_LEFT + plot_w + COLORBAR_GAP;

    for py in 0..plot_h {
        let frac = 1.0 - (py as f32 + 0.5) / plot_h as f32;
        let color = magma(frac);
        for dx in 0..COLORBAR_WIDTH {
            img.put(bar_x + dx, MARGIN_TOP + py, color);
        }
    }

    // Bar frame
    img.hline(bar_x - 1, bar_x + COLORBAR_WIDTH, MARGIN_TOP - 1, FG);
    img.hline(bar_x - 1, bar_x + COLORBAR_WIDTH, MARGIN_TOP + plot_h, FG);
    img.vline(bar_x - 1, MARGIN_TOP - 1, MARGIN_TOP + plot_h, FG);
    img.vline(bar_x + COLORBAR_WIDTH, MARGIN_TOP - 1, MARGIN_TOP + plot_h, FG);

    let tick_step = if -floor_db > 120.0 { 40.0 } else { 20.0 };
    let mut level = 0.0f32;
    while level >= floor_db - 1e-3 {
        let norm = (level - floor_db) / -floor_db;
        let py = MARGIN_TOP + (((1.0 - norm) * plot_h as f32) as u32).min(plot_h - 1);
        img.hline(bar_x + COLORBAR_WIDTH + 1, bar_x + COLORBAR_WIDTH + 2, py, FG);
        img.text(
            bar_x + COLORBAR_WIDTH + 5,
            py.saturating_sub(3),
            &format!("{level:+.0}"),
            FG,
        );
        level -= tick_step;
    }

    img.text(bar_x + 2, MARGIN_TOP - 12, "dB", FG);
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_audio::StftConfig;

    fn test_config() -> StftConfig {
        StftConfig {
            window_size: 8,
            hop_size: 4,
            ..Default::default()
        }
    }

    // 5 bins x 4 frames ramp ending exactly at 0 dB
    fn small_spectrogram() -> Spectrogram {
        let n = 5 * 4;
        let values: Vec<f32> = (0..n)
            .map(|i| DB_FLOOR + (0.0 - DB_FLOOR) * i as f32 / (n - 1) as f32)
            .collect();
        Spectrogram::from_values(values, 5, 4, 8000, test_config())
    }

    #[test]
    fn test_render_dimensions() {
        let options = RenderOptions {
            width: 400,
            height: 300,
            ..Default::default()
        };
        let img = render(&small_spectrogram(), "test", &options).expect("render");
        assert_eq!(img.width(), 400);
        assert_eq!(img.height(), 300);
        assert_eq!(img.pixels().len(), 400 * 300 * 3);
    }

    #[test]
    fn test_render_deterministic() {
        let spec = small_spectrogram();
        let options = RenderOptions::default();
        let a = render(&spec, "tone", &options).expect("render");
        let b = render(&spec, "tone", &options).expect("render");
        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn test_plot_area_is_colormapped() {
        let img = render(&small_spectrogram(), "t", &RenderOptions::default()).expect("render");
        // Center of the plot area holds a colormap color, not background
        let x = MARGIN_LEFT + (img.width() - MARGIN_LEFT - MARGIN_RIGHT) / 2;
        let y = MARGIN_TOP + (img.height() - MARGIN_TOP - MARGIN_BOTTOM) / 2;
        assert_ne!(img.pixel(x, y), BG);
    }

    #[test]
    fn test_colorbar_present() {
        let img = render(&small_spectrogram(), "t", &RenderOptions::default()).expect("render");
        let plot_w = img.width() - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = img.height() - MARGIN_TOP - MARGIN_BOTTOM;
        let bar_x = MARGIN_LEFT + plot_w + COLORBAR_GAP + COLORBAR_WIDTH / 2;
        let top = img.pixel(bar_x, MARGIN_TOP);
        let bottom = img.pixel(bar_x, MARGIN_TOP + plot_h - 1);
        assert_ne!(top, BG);
        assert_ne!(bottom, BG);
        // Bright end of the map on top, dark end at the floor
        let luminance = |c: [u8; 3]| c[0] as u32 + c[1] as u32 + c[2] as u32;
        assert!(luminance(top) > luminance(bottom));
    }

    #[test]
    fn test_zero_frames_rejected() {
        let spec = Spectrogram::from_values(Vec::new(), 5, 0, 8000, test_config());
        assert!(matches!(
            render(&spec, "t", &RenderOptions::default()),
            Err(RenderError::EmptyMatrix)
        ));
    }

    #[test]
    fn test_zero_bins_rejected() {
        let spec = Spectrogram::from_values(Vec::new(), 0, 7, 8000, test_config());
        assert!(matches!(
            render(&spec, "t", &RenderOptions::default()),
            Err(RenderError::EmptyMatrix)
        ));
    }

    #[test]
    fn test_undersized_canvas_rejected() {
        let options = RenderOptions {
            width: 50,
            height: 50,
            ..Default::default()
        };
        assert!(matches!(
            render(&small_spectrogram(), "t", &options),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_export_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spectrogram.png");

        let img = render(&small_spectrogram(), "tone", &RenderOptions::default()).expect("render");
        export(&img, &path).expect("export");

        let reread = image::open(&path).expect("reopen");
        assert_eq!(reread.width(), img.width());
        assert_eq!(reread.height(), img.height());
    }

    #[test]
    fn test_export_twice_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.png");

        let img = render(&small_spectrogram(), "tone", &RenderOptions::default()).expect("render");
        export(&img, &path).expect("first export");
        let first = std::fs::read(&path).expect("read");
        export(&img, &path).expect("second export");
        let second = std::fs::read(&path).expect("read");
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_unknown_extension_falls_back_to_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.spectro");

        let img = render(&small_spectrogram(), "t", &RenderOptions::default()).expect("render");
        export(&img, &path).expect("export");

        let reread = image::ImageReader::open(&path)
            .expect("open")
            .with_guessed_format()
            .expect("guess");
        assert_eq!(reread.format(), Some(image::ImageFormat::Png));
    }

    #[test]
    fn test_export_unwritable_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.png");

        let img = render(&small_spectrogram(), "t", &RenderOptions::default()).expect("render");
        assert!(matches!(
            export(&img, &path),
            Err(RenderError::Encode { .. })
        ));
    }
}
