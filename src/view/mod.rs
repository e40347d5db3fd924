//! Mapping between original-image pixels and on-screen view pixels.
//!
//! The chain is: image ÷ fit scale → fit-to-view canvas → pan/zoom → view.
//! Pointer positions arrive in view pixels on a canvas the size of the
//! fit-to-view canvas.

mod selection;
mod transform;

pub use selection::Selection;
pub use transform::{CanvasSize, FitScale, MAX_SCALE, MIN_SCALE, ViewTransform, ZOOM_STEP};

use crate::error::ViewError;
use crate::models::{Point, Rect};

/// Longest on-screen side of a freshly loaded image, in canvas pixels
pub const DEFAULT_MAX_DIM: f64 = 800.0;

/// Transform state of one image-viewing session.
#[derive(Debug, Clone)]
pub struct CoordinateFrameStack {
    max_dim: f64,
    fit: Option<FitScale>,
    transform: ViewTransform,
}

impl CoordinateFrameStack {
    pub fn new(max_dim: f64) -> Self {
        Self {
            max_dim,
            fit: None,
            transform: ViewTransform::default(),
        }
    }

    /// Compute the fit scale for a newly loaded image and reset pan/zoom
    pub fn load_image(&mut self, width: u32, height: u32) -> Result<FitScale, ViewError> {
        let fit = FitScale::compute(width, height, self.max_dim)?;
        self.fit = Some(fit);
        self.transform = ViewTransform::default();
        Ok(fit)
    }

    pub fn is_loaded(&self) -> bool {
        self.fit.is_some()
    }

    pub fn reset(&mut self) {
        self.transform = ViewTransform::default();
    }

    fn fit(&self) -> Result<FitScale, ViewError> {
        self.fit.ok_or(ViewError::NoImage)
    }

    pub fn fit_scale(&self) -> Result<f64, ViewError> {
        Ok(self.fit()?.factor())
    }

    pub fn canvas_size(&self) -> Result<CanvasSize, ViewError> {
        Ok(self.fit()?.canvas())
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    /// Replace the transform wholesale, e.g. when restoring a saved view
    pub fn set_transform(&mut self, pan_x: f64, pan_y: f64, scale: f64) -> Result<(), ViewError> {
        let canvas = self.canvas_size()?;
        self.transform = ViewTransform::new(pan_x, pan_y, scale, canvas)?;
        Ok(())
    }

    pub fn to_view_space(&self, image_rect: &Rect) -> Result<Rect, ViewError> {
        let fit = self.fit()?;
        Ok(self
            .transform
            .rect_from_canvas(&image_rect.scale(1.0 / fit.factor())))
    }

    pub fn to_image_space(&self, view_rect: &Rect) -> Result<Rect, ViewError> {
        let fit = self.fit()?;
        Ok(self
            .transform
            .rect_to_canvas(view_rect)
            .scale(fit.factor()))
    }

    pub fn point_to_view(&self, image_point: Point) -> Result<Point, ViewError> {
        let fit = self.fit()?;
        Ok(self
            .transform
            .point_from_canvas(image_point.scale(1.0 / fit.factor())))
    }

    pub fn point_to_image(&self, view_point: Point) -> Result<Point, ViewError> {
        let fit = self.fit()?;
        Ok(self
            .transform
            .point_to_canvas(view_point)
            .scale(fit.factor()))
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<ViewTransform, ViewError> {
        let canvas = self.canvas_size()?;
        self.transform = self.transform.panned(dx, dy, canvas);
        Ok(self.transform)
    }

    pub fn zoom_at(&mut self, zoom_in: bool, anchor: Point) -> Result<ViewTransform, ViewError> {
        let canvas = self.canvas_size()?;
        let anchor = anchor.clamped(canvas.width, canvas.height);
        self.transform = self.transform.zoomed_at(zoom_in, anchor, canvas);
        Ok(self.transform)
    }

    /// Start a drag selection. Fails until an image has been loaded.
    pub fn begin_selection(&self, start: Point) -> Result<Selection, ViewError> {
        let canvas = self.canvas_size()?;
        Ok(Selection::new(start, canvas))
    }

    /// Sign-correct a dragged rectangle and map it into image pixels
    pub fn finalize_selection(&self, rect: &Rect) -> Result<Rect, ViewError> {
        self.to_image_space(&rect.normalized())
    }
}

impl Default for CoordinateFrameStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIM)
    }
}
