//! Raster Export - Card Document to Image
//!
//! The rasterizer is the seam to the external renderer. Options coming from
//! users are range-checked before they reach it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use resvg::{tiny_skia, usvg};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::render::CardDocument;

pub const DEFAULT_SCALE: f32 = 2.0;
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 4.0;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Scale must be between 0.5 and 4, got {0}")]
    InvalidScale(f32),

    #[error("Invalid background color: {0}")]
    InvalidColor(String),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    #[error("Card document could not be parsed: {0}")]
    Parse(String),

    #[error("Card has no drawable area at this scale")]
    EmptyCanvas,

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Svg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            other => Err(RasterError::UnknownFormat(other.to_string())),
        }
    }
}

/// Capture settings: pixel scale and background (`None` keeps transparency).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub scale: f32,
    pub background: Option<[u8; 4]>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            background: None,
        }
    }
}

impl RasterOptions {
    /// Create from user input with validation
    pub fn from_user(scale: f32, background: Option<&str>) -> Result<Self, RasterError> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(RasterError::InvalidScale(scale));
        }
        let background = background.map(parse_hex_color).transpose()?;
        Ok(Self { scale, background })
    }
}

/// `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Result<[u8; 4], RasterError> {
    let invalid = || RasterError::InvalidColor(text.to_string());
    let hex = text.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}

/// The exported image payload.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl RasterImage {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    /// `data:<mime>;base64,...`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(&self.bytes))
    }
}

/// Rasterizer trait - renders a card document to an image
pub trait Rasterizer {
    fn format(&self) -> ExportFormat;
    fn rasterize(&self, document: &CardDocument, options: &RasterOptions) -> Result<RasterImage, RasterError>;
}

// --- Concrete Rasterizers ---

/// PNG through resvg, text shaped with the system fonts.
pub struct ResvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl ResvgRasterizer {
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Self { fontdb: Arc::new(fontdb) }
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for ResvgRasterizer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Png
    }

    fn rasterize(&self, document: &CardDocument, options: &RasterOptions) -> Result<RasterImage, RasterError> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&self.fontdb);

        let tree = usvg::Tree::from_str(&document.svg, &opt)
            .map_err(|e| RasterError::Parse(e.to_string()))?;
        let size = tree
            .size()
            .to_int_size()
            .scale_by(options.scale)
            .ok_or(RasterError::EmptyCanvas)?;

        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or(RasterError::EmptyCanvas)?;
        if let Some([r, g, b, a]) = options.background {
            pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
        }

        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(options.scale, options.scale),
            &mut pixmap.as_mut(),
        );

        let bytes = pixmap.encode_png().map_err(|e| RasterError::Encode(e.to_string()))?;
        Ok(RasterImage {
            format: ExportFormat::Png,
            width: size.width(),
            height: size.height(),
            bytes,
        })
    }
}

/// Exports the SVG master itself.
pub struct SvgPassthrough;

impl Rasterizer for SvgPassthrough {
    fn format(&self) -> ExportFormat {
        ExportFormat::Svg
    }

    fn rasterize(&self, document: &CardDocument, _options: &RasterOptions) -> Result<RasterImage, RasterError> {
        Ok(RasterImage {
            format: ExportFormat::Svg,
            width: document.width,
            height: document.height,
            bytes: document.svg.clone().into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_document() -> CardDocument {
        CardDocument {
            element_id: "test-card".to_string(),
            width: 40,
            height: 30,
            svg: r##"<svg xmlns="http://www.w3.org/2000/svg" id="test-card" width="40" height="30" viewBox="0 0 40 30"><rect x="5" y="5" width="30" height="20" fill="#ff0000"/></svg>"##.to_string(),
            lines: vec![],
        }
    }

    #[test]
    fn test_user_options_validated() {
        assert!(RasterOptions::from_user(2.0, None).is_ok());
        assert!(matches!(RasterOptions::from_user(0.1, None), Err(RasterError::InvalidScale(_))));
        assert!(matches!(RasterOptions::from_user(8.0, None), Err(RasterError::InvalidScale(_))));
        assert!(matches!(
            RasterOptions::from_user(2.0, Some("pink")),
            Err(RasterError::InvalidColor(_))
        ));
        assert_eq!(
            RasterOptions::from_user(1.0, Some("#ff8000")).unwrap().background,
            Some([255, 128, 0, 255])
        );
    }

    #[test]
    fn test_parse_hex_color_alpha() {
        assert_eq!(parse_hex_color("#00000080").unwrap(), [0, 0, 0, 128]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("123456").is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("svg".parse::<ExportFormat>().unwrap(), ExportFormat::Svg);
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_resvg_png_is_scaled() {
        let image = ResvgRasterizer::new()
            .rasterize(&plain_document(), &RasterOptions::default())
            .unwrap();

        assert_eq!(image.format, ExportFormat::Png);
        assert_eq!((image.width, image.height), (80, 60));
        assert_eq!(&image.bytes[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert!(image.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_svg_passthrough() {
        let doc = plain_document();
        let image = SvgPassthrough.rasterize(&doc, &RasterOptions::default()).unwrap();
        assert_eq!(image.mime(), "image/svg+xml");
        assert_eq!(image.bytes, doc.svg.as_bytes());
    }
}
