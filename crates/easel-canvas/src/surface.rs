//! The drawing surface.

use std::io::Cursor;

use tracing::{debug, trace};

use crate::{CanvasError, CanvasResult, ImageData, Rgba};

/// Where the canvas is laid out on screen, in client coordinates.
///
/// The displayed size can differ from the pixel size, so pointer positions
/// are scaled before they reach the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// A paintable RGBA surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: ImageData,
    color: Rgba,
    line_width: f32,
    pen: Option<(f32, f32)>,
}

impl Canvas {
    /// Create a white canvas drawing in black.
    pub fn new(width: u32, height: u32) -> CanvasResult<Self> {
        if width == 0 || height == 0 {
            return Err(CanvasError::InvalidDimensions { width, height });
        }
        let mut canvas = Self {
            image: ImageData::new(width, height),
            color: Rgba::BLACK,
            line_width: 1.0,
            pen: None,
        };
        canvas.initialize();
        Ok(canvas)
    }

    /// Size the canvas to 90% x 80% of a viewport.
    pub fn for_viewport(viewport_width: u32, viewport_height: u32) -> CanvasResult<Self> {
        let width = (viewport_width as f32 * 0.9) as u32;
        let height = (viewport_height as f32 * 0.8) as u32;
        Self::new(width, height)
    }

    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn image_data(&self) -> &ImageData {
        &self.image
    }

    /// Wipe to white. Used for "new drawing" too.
    pub fn initialize(&mut self) {
        self.image.clear();
        self.image.fill(Rgba::WHITE);
        self.pen = None;
        debug!(width = self.image.width, height = self.image.height, "Canvas initialized");
    }

    /// Set stroke and fill colour from the picker's `#rrggbb` value.
    pub fn set_color(&mut self, hex: &str) -> CanvasResult<()> {
        self.color = Rgba::from_hex(hex)?;
        Ok(())
    }

    /// Brush size in pixels, capped at the canvas's longer side.
    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.line_width = width.min(self.image.width.max(self.image.height) as f32);
        }
    }

    /// Start a new stroke. The next `line_to` only positions the pen.
    pub fn begin_path(&mut self) {
        self.pen = None;
    }

    /// Extend the current stroke to `(x, y)` in canvas pixels.
    ///
    /// Non-finite points are ignored and leave the pen where it was.
    pub fn line_to(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let (px, py) = self.pen.unwrap_or((x, y));
        self.stroke_segment(px, py, x, y);
        self.pen = Some((x, y));
    }

    /// Map a client-space pointer position onto canvas pixels.
    ///
    /// `None` while the canvas has no usable on-screen size (hidden or collapsed).
    pub fn client_to_canvas(
        &self,
        rect: &DisplayRect,
        client_x: f32,
        client_y: f32,
    ) -> Option<(f32, f32)> {
        let usable = |extent: f32| extent.is_finite() && extent > 0.0;
        if !usable(rect.width) || !usable(rect.height) {
            return None;
        }
        let scale_x = self.image.width as f32 / rect.width;
        let scale_y = self.image.height as f32 / rect.height;
        let point = ((client_x - rect.left) * scale_x, (client_y - rect.top) * scale_y);
        (point.0.is_finite() && point.1.is_finite()).then_some(point)
    }

    /// Pointer moved while drawing.
    pub fn pointer_move(&mut self, rect: &DisplayRect, client_x: f32, client_y: f32) {
        match self.client_to_canvas(rect, client_x, client_y) {
            Some((x, y)) => self.line_to(x, y),
            None => trace!(?rect, "Pointer ignored, canvas not laid out"),
        }
    }

    /// Draw a camera frame stretched over the whole canvas.
    pub fn draw_frame(&mut self, frame: &ImageData) -> CanvasResult<()> {
        if frame.width == 0 || frame.height == 0 {
            return Err(CanvasError::InvalidImageData);
        }
        let (w, h) = (self.image.width, self.image.height);
        for y in 0..h {
            let sy = (y as u64 * frame.height as u64 / h as u64) as u32;
            for x in 0..w {
                let sx = (x as u64 * frame.width as u64 / w as u64) as u32;
                if let Some(pixel) = frame.get_pixel(sx, sy) {
                    self.image.set_pixel(x, y, pixel);
                }
            }
        }
        debug!(
            frame_width = frame.width,
            frame_height = frame.height,
            "Camera frame drawn"
        );
        Ok(())
    }

    /// Encode the current pixels as PNG.
    pub fn to_png(&self) -> CanvasResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        {
            let mut encoder = png::Encoder::new(&mut out, self.image.width, self.image.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| CanvasError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.image.data)
                .map_err(|e| CanvasError::Encode(e.to_string()))?;
        }
        Ok(out.into_inner())
    }

    fn brush_half(&self) -> i64 {
        ((self.line_width - 1.0) / 2.0).max(0.0).round() as i64
    }

    fn stroke_segment(&mut self, x0: f32, y0: f32, x1: f32, y1: f32) {
        trace!(x0, y0, x1, y1, "Stroke segment");
        // Only the part that can touch a pixel is rasterized.
        let margin = (self.brush_half() + 1) as f64;
        let bounds = (
            -margin,
            -margin,
            self.image.width as f64 - 1.0 + margin,
            self.image.height as f64 - 1.0 + margin,
        );
        let Some((x0, y0, x1, y1)) = clip_segment(
            (x0 as f64, y0 as f64),
            (x1 as f64, y1 as f64),
            bounds,
        ) else {
            return;
        };

        let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
        let (x1, y1) = (x1.round() as i64, y1.round() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.stamp(x, y);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Paint a square brush of `line_width` centred on `(cx, cy)`.
    fn stamp(&mut self, cx: i64, cy: i64) {
        let half = self.brush_half();
        let (max_x, max_y) = (self.image.width as i64 - 1, self.image.height as i64 - 1);
        for y in (cy - half).max(0)..=(cy + half).min(max_y) {
            for x in (cx - half).max(0)..=(cx + half).min(max_x) {
                self.image.set_pixel(x as u32, y as u32, self.color);
            }
        }
    }
}

/// Liang-Barsky clip of a segment to `(min_x, min_y, max_x, max_y)`.
fn clip_segment(
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
) -> Option<(f64, f64, f64, f64)> {
    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [
        (-dx, x0 - min_x),
        (dx, max_x - x0),
        (-dy, y0 - min_y),
        (dy, max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((x0 + t0 * dx, y0 + t0 * dy, x0 + t1 * dx, y0 + t1 * dy))
}
