//! # Optimization Engine Module
//!
//! Dispatches a file buffer to the codec appropriate for its format and
//! returns the recompressed bytes. All work happens in memory; no
//! external tools are spawned and no temp files are written.
//!
//! ## Routing:
//! A file is routed to exactly one codec, determined by its extension
//! (case-insensitive). `.svg` goes to the vector cleanup and bypasses
//! the raster path entirely; everything else is decoded and re-encoded
//! through the matching `image` codec with the per-format parameters
//! from configuration.
//!
//! | Extension    | Codec                                    |
//! |--------------|------------------------------------------|
//! | jpg, jpeg    | JPEG, quality from `jpeg.quality`        |
//! | png          | PNG, level from `png.compression`        |
//! | gif          | GIF, animation preserved when configured |
//! | tiff         | TIFF (no parameters)                     |
//! | webp         | WebP, lossless only                      |
//! | avif         | AVIF, `avif.quality` / `avif.speed`      |
//! | svg          | vector cleanup (see `svg` module)        |
//!
//! Failures (malformed input, unsupported parameter, unknown extension)
//! propagate to the caller; the engine never silently produces empty
//! output.

use crate::config::{OptimizerOptions, PngCompression};
use crate::error::OptimizeError;
use crate::svg;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{AnimationDecoder, ColorType, ImageEncoder};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Format-dispatching recompression engine
#[derive(Debug, Clone)]
pub struct OptimizationEngine {
    options: Arc<OptimizerOptions>,
}

impl OptimizationEngine {
    pub fn new(options: Arc<OptimizerOptions>) -> Self {
        Self { options }
    }

    /// Recompress a buffer through the codec its extension selects.
    pub fn optimize(&self, path: &str, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let ext = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .ok_or_else(|| {
                OptimizeError::UnsupportedFormat(format!("no file extension: {}", path))
            })?;

        debug!("optimizing {} ({} bytes, format {})", path, buffer.len(), ext);

        match ext.as_str() {
            "svg" => svg::optimize_svg(buffer, &self.options.svg),
            "jpg" | "jpeg" => self.encode_jpeg(buffer),
            "png" => self.encode_png(buffer),
            "gif" => self.encode_gif(buffer),
            "tiff" => self.encode_tiff(buffer),
            "webp" => self.encode_webp(buffer),
            "avif" => self.encode_avif(buffer),
            other => Err(OptimizeError::UnsupportedFormat(format!(
                "no codec for extension '{}': {}",
                other, path
            ))),
        }
    }

    fn encode_jpeg(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let img = image::load_from_memory(buffer)?;
        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, self.options.jpeg.quality);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        Ok(out)
    }

    fn encode_png(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let img = image::load_from_memory(buffer)?;
        let rgba = img.to_rgba8();
        let compression = match self.options.png.compression {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        };
        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive);
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(out)
    }

    fn encode_gif(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let mut out = Vec::new();
        if self.options.gif.animated {
            let decoder = GifDecoder::new(Cursor::new(buffer))?;
            let frames = decoder.into_frames().collect_frames()?;
            if frames.len() > 1 {
                let mut encoder = GifEncoder::new_with_speed(&mut out, self.options.gif.speed);
                encoder.set_repeat(Repeat::Infinite)?;
                encoder.encode_frames(frames)?;
                drop(encoder);
                return Ok(out);
            }
        }
        let img = image::load_from_memory(buffer)?;
        let rgba = img.to_rgba8();
        let mut encoder = GifEncoder::new_with_speed(&mut out, self.options.gif.speed);
        encoder.encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        drop(encoder);
        Ok(out)
    }

    fn encode_tiff(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let img = image::load_from_memory(buffer)?;
        let rgba = img.to_rgba8();
        let mut cursor = Cursor::new(Vec::new());
        let encoder = TiffEncoder::new(&mut cursor);
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(cursor.into_inner())
    }

    fn encode_webp(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        if !self.options.webp.lossless {
            // The in-process encoder cannot do lossy WebP; reject the
            // parameter instead of quietly encoding something else.
            return Err(OptimizeError::UnsupportedParameter(
                "lossy WebP encoding is not supported; set webp.lossless = true".to_string(),
            ));
        }
        let img = image::load_from_memory(buffer)?;
        let rgba = img.to_rgba8();
        let mut out = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut out);
        encoder.encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(out)
    }

    fn encode_avif(&self, buffer: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let img = image::load_from_memory(buffer)?;
        let rgba = img.to_rgba8();
        let mut out = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(
            &mut out,
            self.options.avif.speed,
            self.options.avif.quality,
        );
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};

    fn engine() -> OptimizationEngine {
        OptimizationEngine::new(Arc::new(OptimizerOptions::default()))
    }

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([180, 40, 90, 255]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_reencode_produces_decodable_output() {
        let input = sample_png(16, 16);
        let output = engine().optimize("assets/a.png", &input).unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn test_jpeg_routing_by_extension() {
        let input = sample_png(8, 8);
        // Buffer content detection is irrelevant; the extension routes
        for path in ["a.jpg", "a.JPEG"] {
            let output = engine().optimize(path, &input).unwrap();
            assert_eq!(image::guess_format(&output).unwrap(), image::ImageFormat::Jpeg);
        }
    }

    #[test]
    fn test_svg_bypasses_raster_codecs() {
        let svg = br#"<svg viewBox="0 0 1 1"><rect width="1" height="1"/></svg>"#;
        let output = engine().optimize("icon.svg", svg).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with("<svg"));
    }

    #[test]
    fn test_malformed_input_propagates_error() {
        let result = engine().optimize("broken.png", b"definitely not a png");
        assert!(matches!(result, Err(OptimizeError::Image(_))));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let result = engine().optimize("styles.css", b"body{}");
        assert!(matches!(result, Err(OptimizeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_lossy_webp_parameter_rejected() {
        let mut options = OptimizerOptions::default();
        options.webp.lossless = false;
        let engine = OptimizationEngine::new(Arc::new(options));
        let result = engine.optimize("a.webp", &sample_png(4, 4));
        assert!(matches!(result, Err(OptimizeError::UnsupportedParameter(_))));
    }
}
