use crate::config::{AlphaMode, PadConfig, DEFAULT_PADDING_RATIO};
use crate::error::PadError;
use image::{
    codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder},
    imageops, DynamicImage, ImageEncoder, ImageResult, Rgb, RgbImage, Rgba, RgbaImage,
};
use log::{debug, info};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Largest canvas buffer the compositor will allocate, matching the
/// default allocation limit of the `image` decoders.
pub const MAX_CANVAS_BYTES: u64 = 512 * 1024 * 1024;

/// Validated compositing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadOptions {
    pub padding_ratio: f64,
    pub background: Rgb<u8>,
    pub alpha_mode: AlphaMode,
}

impl PadOptions {
    pub fn new(
        padding_ratio: f64,
        background: Rgb<u8>,
        alpha_mode: AlphaMode,
    ) -> Result<Self, PadError> {
        validate_padding_ratio(padding_ratio)?;
        Ok(Self {
            padding_ratio,
            background,
            alpha_mode,
        })
    }

    fn background_rgba(&self) -> Rgba<u8> {
        let Rgb([r, g, b]) = self.background;
        Rgba([r, g, b, 255])
    }
}

impl Default for PadOptions {
    fn default() -> Self {
        Self {
            padding_ratio: DEFAULT_PADDING_RATIO,
            background: Rgb([255, 255, 255]),
            alpha_mode: AlphaMode::default(),
        }
    }
}

/// Where the source lands on the padded canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub source_width: u32,
    pub source_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Layout {
    /// Whether a canvas coordinate falls inside the pasted source.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.offset_x
            && x < self.offset_x + self.source_width
            && y >= self.offset_y
            && y < self.offset_y + self.source_height
    }
}

/// Outcome of a successful `generate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadReport {
    pub layout: Layout,
    pub destination: PathBuf,
}

fn validate_padding_ratio(padding_ratio: f64) -> Result<(), PadError> {
    // Also rejects NaN.
    if padding_ratio > 0.0 && padding_ratio < 0.5 {
        Ok(())
    } else {
        Err(PadError::InvalidPaddingRatio(padding_ratio))
    }
}

/// Compute the canvas size and paste offset for a source of the given size.
///
/// Each canvas dimension is `round(source / (1 - 2 * padding_ratio))`, and the
/// source is centered with the offsets truncated toward the top-left.
pub fn compute_layout(width: u32, height: u32, padding_ratio: f64) -> Result<Layout, PadError> {
    validate_padding_ratio(padding_ratio)?;

    if width == 0 || height == 0 {
        return Err(PadError::EmptySource { width, height });
    }

    let visible = 1.0 - 2.0 * padding_ratio;
    let canvas_width = (f64::from(width) / visible).round();
    let canvas_height = (f64::from(height) / visible).round();

    // Sized for the widest (RGBA) canvas.
    let canvas_bytes = canvas_width * canvas_height * 4.0;
    if canvas_width > f64::from(u32::MAX)
        || canvas_height > f64::from(u32::MAX)
        || canvas_bytes > MAX_CANVAS_BYTES as f64
    {
        return Err(PadError::CanvasTooLarge {
            width: canvas_width,
            height: canvas_height,
            limit: MAX_CANVAS_BYTES,
        });
    }

    let canvas_width = canvas_width as u32;
    let canvas_height = canvas_height as u32;

    Ok(Layout {
        source_width: width,
        source_height: height,
        canvas_width,
        canvas_height,
        offset_x: (canvas_width - width) / 2,
        offset_y: (canvas_height - height) / 2,
    })
}

/// Pad an in-memory image. Does not touch the filesystem.
pub fn pad_image(source: &DynamicImage, options: &PadOptions) -> Result<DynamicImage, PadError> {
    let layout = compute_layout(source.width(), source.height(), options.padding_ratio)?;
    Ok(compose(source, &layout, options))
}

fn compose(source: &DynamicImage, layout: &Layout, options: &PadOptions) -> DynamicImage {
    let x = i64::from(layout.offset_x);
    let y = i64::from(layout.offset_y);

    match options.alpha_mode {
        AlphaMode::Discard => {
            let mut canvas = RgbImage::from_pixel(
                layout.canvas_width,
                layout.canvas_height,
                options.background,
            );
            imageops::replace(&mut canvas, &source.to_rgb8(), x, y);
            DynamicImage::ImageRgb8(canvas)
        }
        AlphaMode::Flatten => {
            let mut canvas = RgbaImage::from_pixel(
                layout.canvas_width,
                layout.canvas_height,
                options.background_rgba(),
            );
            imageops::overlay(&mut canvas, &source.to_rgba8(), x, y);
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
        }
        AlphaMode::Preserve => {
            let mut canvas = RgbaImage::from_pixel(
                layout.canvas_width,
                layout.canvas_height,
                options.background_rgba(),
            );
            imageops::replace(&mut canvas, &source.to_rgba8(), x, y);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

/// Encode an image as PNG into any writer.
///
/// Uses fixed compression settings, so the same image always produces the
/// same bytes.
pub fn encode_png<W: Write>(image: &DynamicImage, w: W) -> ImageResult<()> {
    let encoder = PngEncoder::new_with_quality(w, CompressionType::Best, PngFilterType::Adaptive);
    encoder.write_image(image.as_bytes(), image.width(), image.height(), image.color())
}

/// Run the whole routine: read the source, pad it and write the PNG.
pub fn generate(config: &PadConfig) -> Result<PadReport, PadError> {
    let options = config.options()?;
    let source = load_source(&config.source_path)?;
    write_padded(&source, &options, &config.destination_path)
}

/// Pad an already loaded source and write it to `destination` as PNG.
pub fn write_padded(
    source: &DynamicImage,
    options: &PadOptions,
    destination: &Path,
) -> Result<PadReport, PadError> {
    let layout = compute_layout(source.width(), source.height(), options.padding_ratio)?;
    debug!(
        "Padding {}x{} to {}x{} at offset ({}, {})",
        layout.source_width,
        layout.source_height,
        layout.canvas_width,
        layout.canvas_height,
        layout.offset_x,
        layout.offset_y
    );

    let padded = compose(source, &layout, options);
    save_png(&padded, destination)?;

    Ok(PadReport {
        layout,
        destination: destination.to_path_buf(),
    })
}

/// Open and decode the source image.
pub fn load_source(path: &Path) -> Result<DynamicImage, PadError> {
    let source = image::open(path).map_err(|source| PadError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        source.width(),
        source.height(),
        source.color()
    );
    Ok(source)
}

fn save_png(image: &DynamicImage, path: &Path) -> Result<(), PadError> {
    // Encode fully before touching the destination so a failure never leaves
    // a truncated file behind.
    let mut buf = Vec::new();
    encode_png(image, &mut buf).map_err(|source| PadError::DestinationEncode {
        path: path.to_path_buf(),
        source,
    })?;

    let write_err = |source: std::io::Error| PadError::DestinationWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, &buf).map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), buf.len());
    Ok(())
}

/// Result of comparing a padded output against its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCheck {
    pub expected: Layout,
    pub actual_width: u32,
    pub actual_height: u32,
    /// Pixels inside the pasted region that differ from the source.
    pub source_mismatches: u64,
    /// Pixels outside the pasted region that are not the background.
    pub background_mismatches: u64,
}

impl LayoutCheck {
    pub fn dimensions_match(&self) -> bool {
        self.actual_width == self.expected.canvas_width
            && self.actual_height == self.expected.canvas_height
    }

    pub fn is_ok(&self) -> bool {
        self.dimensions_match() && self.source_mismatches == 0 && self.background_mismatches == 0
    }
}

/// Check that `output` is `source` padded with `options`.
///
/// `tolerance` is the largest per-channel difference accepted, which lets a
/// lossy round trip or blending rounding through.
pub fn verify_layout(
    source: &DynamicImage,
    output: &DynamicImage,
    options: &PadOptions,
    tolerance: u8,
) -> Result<LayoutCheck, PadError> {
    let expected = compute_layout(source.width(), source.height(), options.padding_ratio)?;
    let mut check = LayoutCheck {
        expected,
        actual_width: output.width(),
        actual_height: output.height(),
        source_mismatches: 0,
        background_mismatches: 0,
    };

    if !check.dimensions_match() {
        return Ok(check);
    }

    let source = source.to_rgba8();
    let output = output.to_rgba8();
    let background = options.background_rgba();

    for (x, y, pixel) in output.enumerate_pixels() {
        if expected.contains(x, y) {
            let src = source.get_pixel(x - expected.offset_x, y - expected.offset_y);
            let want = expected_source_pixel(*src, background, options.alpha_mode);
            if !pixels_close(*pixel, want, tolerance) {
                check.source_mismatches += 1;
            }
        } else if !pixels_close(*pixel, background, tolerance) {
            check.background_mismatches += 1;
        }
    }

    debug!("{check:?}");
    Ok(check)
}

fn expected_source_pixel(src: Rgba<u8>, background: Rgba<u8>, mode: AlphaMode) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = src;
    match mode {
        AlphaMode::Discard => Rgba([r, g, b, 255]),
        AlphaMode::Preserve => src,
        AlphaMode::Flatten => {
            let blend = |s: u8, d: u8| {
                let alpha = f32::from(a) / 255.0;
                (f32::from(s) * alpha + f32::from(d) * (1.0 - alpha)).round() as u8
            };
            Rgba([
                blend(r, background[0]),
                blend(g, background[1]),
                blend(b, background[2]),
                255,
            ])
        }
    }
}

fn pixels_close(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .all(|(x, y)| x.abs_diff(*y) <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_layout_for_100x50() {
        let layout = compute_layout(100, 50, 0.20).unwrap();

        assert_eq!(layout.canvas_width, 167);
        assert_eq!(layout.canvas_height, 83);
        assert_eq!((layout.offset_x, layout.offset_y), (33, 16));
    }

    #[test]
    fn test_layout_rounds_to_nearest() {
        for (w, h) in [(1, 1), (3, 7), (60, 60), (512, 512), (1000, 333)] {
            let layout = compute_layout(w, h, 0.20).unwrap();
            assert_eq!(layout.canvas_width, (f64::from(w) / 0.6).round() as u32);
            assert_eq!(layout.canvas_height, (f64::from(h) / 0.6).round() as u32);
            assert!(layout.offset_x + w <= layout.canvas_width);
            assert!(layout.offset_y + h <= layout.canvas_height);
        }
    }

    #[test]
    fn test_layout_rejects_bad_ratio() {
        for ratio in [0.0, -0.1, 0.5, 0.75, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                compute_layout(10, 10, ratio),
                Err(PadError::InvalidPaddingRatio(_))
            ));
        }
    }

    #[test]
    fn test_layout_rejects_empty_source() {
        assert!(matches!(
            compute_layout(0, 10, 0.2),
            Err(PadError::EmptySource {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn test_layout_rejects_overflowing_canvas() {
        assert!(matches!(
            compute_layout(u32::MAX, 1, 0.49),
            Err(PadError::CanvasTooLarge { .. })
        ));
    }

    #[test]
    fn test_layout_rejects_canvas_over_byte_budget() {
        // Fits in u32 per side, but is far beyond what can be allocated.
        let err = compute_layout(10, 10, 0.4999999).unwrap_err();
        assert!(matches!(
            err,
            PadError::CanvasTooLarge {
                limit: MAX_CANVAS_BYTES,
                ..
            }
        ));

        let options = PadOptions {
            padding_ratio: 0.4999999,
            ..PadOptions::default()
        };
        assert!(pad_image(&gradient(10, 10), &options).is_err());
    }

    #[test]
    fn test_layout_accepts_large_canvas_within_budget() {
        let layout = compute_layout(4096, 4096, 0.20).unwrap();
        assert_eq!((layout.canvas_width, layout.canvas_height), (6827, 6827));
    }

    #[test]
    fn test_pad_image_centers_source_on_white() {
        let source = gradient(100, 50);
        let padded = pad_image(&source, &PadOptions::default()).unwrap();

        assert_eq!(padded.dimensions(), (167, 83));
        assert_eq!(padded.color(), image::ColorType::Rgb8);

        let padded = padded.to_rgb8();
        let source = source.to_rgb8();
        for (x, y, pixel) in padded.enumerate_pixels() {
            let inside = (33..133).contains(&x) && (16..66).contains(&y);
            if inside {
                assert_eq!(pixel, source.get_pixel(x - 33, y - 16), "at ({x}, {y})");
            } else {
                assert_eq!(*pixel, Rgb([255, 255, 255]), "at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_custom_background_and_ratio() {
        let options = PadOptions::new(0.25, Rgb([10, 20, 30]), AlphaMode::Discard).unwrap();
        let padded = pad_image(&gradient(10, 10), &options).unwrap().to_rgb8();

        assert_eq!(padded.dimensions(), (20, 20));
        assert_eq!(*padded.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*padded.get_pixel(19, 19), Rgb([10, 20, 30]));
        assert_eq!(*padded.get_pixel(5, 5), Rgb([0, 0, 128]));
    }

    fn half_transparent() -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([255, 0, 0, 255])
            }
        }))
    }

    #[test]
    fn test_discard_drops_alpha_without_blending() {
        let padded = pad_image(&half_transparent(), &PadOptions::default()).unwrap();
        let layout = compute_layout(4, 4, 0.2).unwrap();
        let rgb = padded.to_rgb8();

        assert_eq!(padded.color(), image::ColorType::Rgb8);
        // Fully transparent black shows up as black.
        assert_eq!(*rgb.get_pixel(layout.offset_x, layout.offset_y), Rgb([0, 0, 0]));
        assert_eq!(
            *rgb.get_pixel(layout.offset_x + 3, layout.offset_y),
            Rgb([255, 0, 0])
        );
    }

    #[test]
    fn test_flatten_blends_onto_background() {
        let options = PadOptions {
            alpha_mode: AlphaMode::Flatten,
            ..PadOptions::default()
        };
        let padded = pad_image(&half_transparent(), &options).unwrap();
        let layout = compute_layout(4, 4, 0.2).unwrap();
        let rgb = padded.to_rgb8();

        assert_eq!(padded.color(), image::ColorType::Rgb8);
        assert_eq!(
            *rgb.get_pixel(layout.offset_x, layout.offset_y),
            Rgb([255, 255, 255])
        );
        assert_eq!(
            *rgb.get_pixel(layout.offset_x + 3, layout.offset_y),
            Rgb([255, 0, 0])
        );
    }

    #[test]
    fn test_preserve_keeps_alpha() {
        let options = PadOptions {
            alpha_mode: AlphaMode::Preserve,
            ..PadOptions::default()
        };
        let padded = pad_image(&half_transparent(), &options).unwrap();
        let layout = compute_layout(4, 4, 0.2).unwrap();
        let rgba = padded.to_rgba8();

        assert_eq!(padded.color(), image::ColorType::Rgba8);
        assert_eq!(
            *rgba.get_pixel(layout.offset_x, layout.offset_y),
            Rgba([0, 0, 0, 0])
        );
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_encode_png_is_deterministic_and_lossless() {
        let padded = pad_image(&gradient(30, 20), &PadOptions::default()).unwrap();

        let mut first = Vec::new();
        let mut second = Vec::new();
        encode_png(&padded, &mut first).unwrap();
        encode_png(&padded, &mut second).unwrap();
        assert_eq!(first, second);

        let decoded = image::load_from_memory(&first).unwrap();
        assert_eq!(decoded.to_rgb8(), padded.to_rgb8());
    }

    #[test]
    fn test_verify_layout_accepts_padded_output() {
        for mode in [AlphaMode::Discard, AlphaMode::Flatten, AlphaMode::Preserve] {
            let options = PadOptions {
                alpha_mode: mode,
                ..PadOptions::default()
            };
            let source = half_transparent();
            let padded = pad_image(&source, &options).unwrap();
            let check = verify_layout(&source, &padded, &options, 1).unwrap();
            assert!(check.is_ok(), "{mode:?}: {check:?}");
        }
    }

    #[test]
    fn test_verify_layout_reports_mismatches() {
        let source = gradient(10, 10);
        let options = PadOptions::default();

        let wrong_size = gradient(10, 10);
        let check = verify_layout(&source, &wrong_size, &options, 0).unwrap();
        assert!(!check.dimensions_match());
        assert!(!check.is_ok());

        let mut padded = pad_image(&source, &options).unwrap().to_rgb8();
        padded.put_pixel(0, 0, Rgb([0, 0, 0]));
        padded.put_pixel(5, 5, Rgb([1, 2, 3]));
        let check =
            verify_layout(&source, &DynamicImage::ImageRgb8(padded), &options, 0).unwrap();
        assert!(check.dimensions_match());
        assert_eq!(check.background_mismatches, 1);
        assert_eq!(check.source_mismatches, 1);
    }

    #[test]
    fn test_generate_writes_png_and_creates_parent() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let source_path = temp_dir.path().join("logo.png");
        gradient(100, 50).save(&source_path).unwrap();

        let config = PadConfig {
            source_path: source_path.clone(),
            destination_path: temp_dir.path().join("out").join("logo_padded.png"),
            ..PadConfig::default()
        };
        let report = generate(&config).unwrap();

        assert_eq!(report.layout, compute_layout(100, 50, 0.2).unwrap());
        let written = image::open(&report.destination).unwrap();
        assert_eq!(written.dimensions(), (167, 83));
    }

    #[test]
    fn test_generate_missing_source_writes_nothing() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let config = PadConfig {
            source_path: temp_dir.path().join("missing.jpeg"),
            destination_path: temp_dir.path().join("logo_padded.png"),
            ..PadConfig::default()
        };

        let err = generate(&config).unwrap_err();
        assert!(err.is_missing());
        assert!(!config.destination_path.exists());
    }

    #[test]
    fn test_generate_undecodable_source() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let source_path = temp_dir.path().join("logo.jpeg");
        std::fs::write(&source_path, b"definitely not a jpeg").unwrap();

        let config = PadConfig {
            source_path,
            destination_path: temp_dir.path().join("logo_padded.png"),
            ..PadConfig::default()
        };

        let err = generate(&config).unwrap_err();
        assert!(matches!(err, PadError::SourceRead { .. }));
        assert!(!err.is_missing());
        assert!(!config.destination_path.exists());
    }
}
