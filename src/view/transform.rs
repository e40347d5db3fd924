use crate::error::ViewError;
use crate::models::{Point, Rect};

/// Zoom moves in steps of 1/20 (0.05) of the fit-to-view size.
const ZOOM_STEPS: u32 = 20;

pub const ZOOM_STEP: f64 = 1.0 / ZOOM_STEPS as f64;
pub const MIN_SCALE: f64 = ZOOM_STEP;
pub const MAX_SCALE: f64 = 1.0;

/// Size of the fit-to-view canvas, in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

/// Ratio between native image pixels and fit-to-view canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitScale {
    factor: f64,
    canvas: CanvasSize,
}

impl FitScale {
    /// Fit an image of `width`x`height` into a square of `max_dim` canvas
    /// pixels, preserving aspect ratio. The longer side lands on `max_dim`.
    pub fn compute(width: u32, height: u32, max_dim: f64) -> Result<Self, ViewError> {
        if width == 0 || height == 0 || !(max_dim > 0.0) {
            return Err(ViewError::EmptyImage { width, height });
        }

        let (w, h) = (width as f64, height as f64);
        let ratio = h / w;
        let (factor, canvas) = if width > height {
            (
                w / max_dim,
                CanvasSize {
                    width: max_dim,
                    height: max_dim * ratio,
                },
            )
        } else {
            (
                h / max_dim,
                CanvasSize {
                    width: max_dim / ratio,
                    height: max_dim,
                },
            )
        };

        Ok(Self { factor, canvas })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }
}

/// Pan and zoom of the view relative to the fit-to-view canvas.
///
/// A view pixel `v` sits at canvas pixel `pan + v * scale`. Values are
/// immutable; every interaction produces a new transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pan_x: f64,
    pan_y: f64,
    scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            scale: MAX_SCALE,
        }
    }
}

impl ViewTransform {
    /// Build a transform, clamping the pan into the canvas bounds for `scale`
    pub fn new(pan_x: f64, pan_y: f64, scale: f64, canvas: CanvasSize) -> Result<Self, ViewError> {
        if !(scale > 0.0 && scale <= MAX_SCALE) {
            return Err(ViewError::InvalidScale(scale));
        }
        Ok(Self::clamped(pan_x, pan_y, scale, canvas))
    }

    fn clamped(pan_x: f64, pan_y: f64, scale: f64, canvas: CanvasSize) -> Self {
        let max_x = (canvas.width * (1.0 - scale)).max(0.0);
        let max_y = (canvas.height * (1.0 - scale)).max(0.0);
        Self {
            pan_x: pan_x.clamp(0.0, max_x),
            pan_y: pan_y.clamp(0.0, max_y),
            scale,
        }
    }

    pub fn pan_x(&self) -> f64 {
        self.pan_x
    }

    pub fn pan_y(&self) -> f64 {
        self.pan_y
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> Point {
        Point::new(self.pan_x, self.pan_y)
    }

    /// Drag the view by a screen delta. The image follows the pointer, so the
    /// pan moves the opposite way, converted to canvas pixels.
    pub fn panned(&self, dx: f64, dy: f64, canvas: CanvasSize) -> Self {
        if dx == 0.0 && dy == 0.0 {
            return *self;
        }
        Self::clamped(
            self.pan_x - dx * self.scale,
            self.pan_y - dy * self.scale,
            self.scale,
            canvas,
        )
    }

    /// Zoom one step in or out while keeping the view point `anchor` over the
    /// same canvas location. Off-grid scales move by exactly one step. Returns
    /// an unchanged transform when the clamped step would not move the scale
    /// in the requested direction.
    pub fn zoomed_at(&self, zoom_in: bool, anchor: Point, canvas: CanvasSize) -> Self {
        let step = if zoom_in { -ZOOM_STEP } else { ZOOM_STEP };
        let scale = snap_to_grid((self.scale + step).clamp(MIN_SCALE, MAX_SCALE));
        let moved = if zoom_in { scale < self.scale } else { scale > self.scale };
        if !moved {
            return *self;
        }

        let delta = self.scale - scale;
        Self::clamped(
            self.pan_x + anchor.x * delta,
            self.pan_y + anchor.y * delta,
            scale,
            canvas,
        )
    }

    pub fn point_to_canvas(&self, view: Point) -> Point {
        self.pan() + view.scale(self.scale)
    }

    pub fn point_from_canvas(&self, canvas: Point) -> Point {
        (canvas - self.pan()).scale(1.0 / self.scale)
    }

    pub fn rect_to_canvas(&self, view: &Rect) -> Rect {
        view.scale(self.scale).translate(self.pan())
    }

    pub fn rect_from_canvas(&self, canvas: &Rect) -> Rect {
        canvas.translate(Point::new(-self.pan_x, -self.pan_y)).scale(1.0 / self.scale)
    }
}

/// Remove float drift so repeated steps from a grid scale stay on the grid.
fn snap_to_grid(scale: f64) -> f64 {
    let steps = scale * ZOOM_STEPS as f64;
    if (steps - steps.round()).abs() < 1e-9 {
        steps.round() / ZOOM_STEPS as f64
    } else {
        scale
    }
}
