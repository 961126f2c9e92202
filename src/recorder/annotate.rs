//! Frame annotation
//!
//! Stamps the camera label and the wall-clock time onto a frame in place.
//! Text is rasterized with imageproc from a TrueType font; DejaVu Sans Bold
//! is bundled so no system font is required.

use crate::capture::traits::Frame;
use crate::utils::error::ConfigError;
use ab_glyph::{FontArc, PxScale};
use chrono::{DateTime, TimeZone};
use image::Rgb;
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;

/// Overlay timestamp format
pub const OVERLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Load the overlay font from `path`, or the bundled one
pub fn load_font(path: Option<&Path>) -> Result<FontArc, ConfigError> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            FontArc::try_from_vec(bytes).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
        None => FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| ConfigError::Invalid(format!("bundled font: {e}"))),
    }
}

/// Format a wall-clock instant the way the overlay shows it
pub fn overlay_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(OVERLAY_TIME_FORMAT).to_string()
}

/// Placement and look of one line of overlay text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Left edge of the text
    pub x: i32,
    /// Top edge of the text line
    pub y: i32,
    /// Line height in pixels
    pub scale: f32,
    pub color: Rgb<u8>,
}

impl TextStyle {
    /// Pixel rectangle `(x0, y0, x1, y1)` the text may touch, end-exclusive
    pub fn bounds(&self, font: &FontArc, text: &str) -> (i64, i64, i64, i64) {
        let (width, _) = text_size(PxScale::from(self.scale), font, text);
        let pad = self.scale.ceil() as i64;
        let (x, y) = (self.x as i64, self.y as i64);
        (x - 2, y - 2, x + width as i64 + pad, y + 2 * pad)
    }

    pub fn draw(&self, frame: &mut Frame, font: &FontArc, text: &str) {
        draw_text_mut(frame, self.color, self.x, self.y, PxScale::from(self.scale), font, text);
    }
}

/// Draws the two fixed overlays for one camera
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
    caption: String,
    caption_style: TextStyle,
    clock_scale: f32,
    clock_color: Rgb<u8>,
}

impl Annotator {
    pub fn new(label: u32, font: FontArc) -> Self {
        Self {
            font,
            caption: format!("Recording - Camera {label}"),
            caption_style: TextStyle {
                x: 10,
                y: 22,
                scale: 30.0,
                color: Rgb([0, 255, 0]),
            },
            clock_scale: 22.0,
            clock_color: Rgb([255, 255, 255]),
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn caption_style(&self) -> TextStyle {
        self.caption_style
    }

    /// Timestamp placement, anchored 20 px above the bottom edge
    pub fn clock_style(&self, frame_height: u32) -> TextStyle {
        TextStyle {
            x: 10,
            y: frame_height as i32 - 20 - self.clock_scale as i32,
            scale: self.clock_scale,
            color: self.clock_color,
        }
    }

    /// Stamp `frame` in place. Dimensions never change.
    pub fn annotate(&self, frame: &mut Frame, timestamp_text: &str) {
        self.caption_style.draw(frame, &self.font, &self.caption);
        let clock = self.clock_style(frame.height());
        clock.draw(frame, &self.font, timestamp_text);
    }
}
