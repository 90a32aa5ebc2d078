//! # Easel Canvas
//!
//! The drawing surface behind the paint app, and the save action that hands
//! finished images to the offline worker.
//!
//! ## Features
//!
//! - **Canvas**: white-initialised RGBA surface, colour picker, freehand strokes
//! - **Camera frames**: a captured frame is drawn scaled to the full canvas
//! - **PNG export**: `canvas_image.png`
//! - **Save action**: direct write online, deferred `"save-image"` task offline
//!
//! ## Architecture
//!
//! ```text
//! Canvas
//!    ├── Stroke state (colour, width, pen position)
//!    └── Pixel buffer (ImageData)
//! SaveAction
//!    ├── online  → PNG written to the download directory
//!    └── offline → DeferredPngWrite stash + SyncManager::register
//! ```

use std::fmt;
use std::str::FromStr;

use easel_common::EaselError;
use thiserror::Error;

pub mod save;
pub mod surface;
pub mod ui;

pub use save::{DeferredPngWrite, SaveAction, SaveOutcome, DEFAULT_FILE_NAME, OFFLINE_MESSAGE};
pub use surface::{Canvas, DisplayRect};
pub use ui::{Control, Mode, UiState};

// ==================== Errors ====================

/// Errors that can occur in canvas operations.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid image data")]
    InvalidImageData,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CanvasError> for EaselError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::Io(e) => EaselError::Io(e),
            other => EaselError::canvas(other.to_string()),
        }
    }
}

pub type CanvasResult<T> = Result<T, CanvasError>;

// ==================== Colour ====================

/// An opaque or translucent sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` (the colour picker's format) or `#rgb`.
    pub fn from_hex(s: &str) -> CanvasResult<Self> {
        let invalid = || CanvasError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: &str| u8::from_str_radix(range, 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Self::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl FromStr for Rgba {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ==================== Image Data ====================

/// Raw pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA format
}

impl ImageData {
    /// Create new image data with all pixels transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: vec![0; size],
        }
    }

    /// Create from existing RGBA data.
    pub fn from_data(width: u32, height: u32, data: Vec<u8>) -> CanvasResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(CanvasError::InvalidImageData);
        }
        Ok(Self { width, height, data })
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let idx = self.index(x, y)?;
        Some(Rgba {
            r: self.data[idx],
            g: self.data[idx + 1],
            b: self.data[idx + 2],
            a: self.data[idx + 3],
        })
    }

    /// Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if let Some(idx) = self.index(x, y) {
            self.data[idx..idx + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    pub fn fill(&mut self, color: Rgba) {
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Clear to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::from_hex("#ff8000").unwrap(), Rgba::rgb(255, 128, 0));
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::rgb(0, 16, 255).to_string(), "#0010ff");
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        for bad in ["000000", "#12345", "#gg0000", "#ééé", ""] {
            assert!(matches!(Rgba::from_hex(bad), Err(CanvasError::InvalidColor(_))), "{bad}");
        }
    }

    #[test]
    fn test_image_data_bounds() {
        let mut image = ImageData::new(2, 2);
        image.set_pixel(5, 5, Rgba::BLACK);
        assert_eq!(image.get_pixel(5, 5), None);
        image.set_pixel(1, 1, Rgba::BLACK);
        assert_eq!(image.get_pixel(1, 1), Some(Rgba::BLACK));
        assert_eq!(image.get_pixel(0, 0), Some(Rgba { r: 0, g: 0, b: 0, a: 0 }));
    }

    #[test]
    fn test_from_data_checks_length() {
        assert!(ImageData::from_data(2, 2, vec![0; 15]).is_err());
        assert!(ImageData::from_data(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_io_error_converts_to_io() {
        let err: EaselError = CanvasError::Io(std::io::Error::other("disk")).into();
        assert!(matches!(err, EaselError::Io(_)));
        let err: EaselError = CanvasError::InvalidImageData.into();
        assert_eq!(err.category(), "canvas");
    }
}
