//! State of one interactive viewing session: the image, its view transform,
//! the selected zone, the last detections and which classes are shown.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info};

use crate::detection::{DetectionPipeline, InferenceBackend, Model};
use crate::error::{BackendError, SessionError, ViewError};
use crate::models::{Detection, Point, Rect};
use crate::view::{CoordinateFrameStack, FitScale, Selection, ViewTransform};

/// Boxes of a single class, in view pixels
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayGroup {
    pub class_id: usize,
    pub boxes: Vec<OverlayBox>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayBox {
    pub rect: Rect,
    pub score: f32,
}

#[derive(Debug, Default)]
pub struct ViewingSession {
    image: Option<DynamicImage>,
    frames: CoordinateFrameStack,
    selection: Option<Selection>,
    zone: Option<Rect>,
    detections: Vec<Detection>,
    hidden_classes: BTreeSet<usize>,
}

impl ViewingSession {
    pub fn new(max_dim: f64) -> Self {
        Self {
            frames: CoordinateFrameStack::new(max_dim),
            ..Self::default()
        }
    }

    /// Show a new image. Clears the zone, detections and pan/zoom.
    pub fn load_image(&mut self, image: DynamicImage) -> Result<FitScale, ViewError> {
        let fit = self.frames.load_image(image.width(), image.height())?;
        info!(
            width = image.width(),
            height = image.height(),
            fit_scale = fit.factor(),
            "image loaded"
        );
        self.image = Some(image);
        self.selection = None;
        self.zone = None;
        self.detections.clear();
        Ok(fit)
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn frames(&self) -> &CoordinateFrameStack {
        &self.frames
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<ViewTransform, ViewError> {
        self.frames.pan(dx, dy)
    }

    pub fn zoom_at(&mut self, zoom_in: bool, anchor: Point) -> Result<ViewTransform, ViewError> {
        self.frames.zoom_at(zoom_in, anchor)
    }

    pub fn reset_view(&mut self) {
        self.frames.reset();
    }

    pub fn begin_selection(&mut self, start: Point) -> Result<(), ViewError> {
        self.selection = Some(self.frames.begin_selection(start)?);
        Ok(())
    }

    /// Live drag rectangle in view pixels, if a drag is in progress
    pub fn update_selection(&self, current: Point) -> Option<Rect> {
        self.selection.map(|s| s.update(current))
    }

    /// Finish the drag and make it the detection zone. Previous detections
    /// are dropped since they belong to the old zone.
    pub fn finish_selection(&mut self, end: Point) -> Result<Rect, ViewError> {
        let selection = self.selection.take().ok_or(ViewError::NoSelection)?;
        let zone = self.frames.finalize_selection(&selection.update(end))?;
        debug!(zone = ?zone, "zone selected");
        self.set_zone(zone);
        Ok(zone)
    }

    /// Set the zone directly, in image pixels
    pub fn set_zone(&mut self, zone: Rect) {
        self.zone = Some(zone.normalized());
        self.detections.clear();
    }

    pub fn zone(&self) -> Option<Rect> {
        self.zone
    }

    pub fn zone_in_view(&self) -> Result<Option<Rect>, ViewError> {
        self.zone.map(|z| self.frames.to_view_space(&z)).transpose()
    }

    /// Run detection on the current zone and cache the result
    pub async fn detect<B: InferenceBackend>(
        &mut self,
        pipeline: &DetectionPipeline,
        model: &Model<B>,
    ) -> Result<&[Detection], SessionError> {
        let image = self.image.as_ref().ok_or(ViewError::NoImage)?;
        let zone = self.zone.ok_or(SessionError::NoZone)?;
        self.detections = pipeline.detect(image, &zone, model).await?;
        Ok(&self.detections)
    }

    pub fn set_detections(&mut self, detections: Vec<Detection>) {
        self.detections = detections;
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn clear_detections(&mut self) {
        self.detections.clear();
    }

    pub fn set_class_visible(&mut self, class_id: usize, visible: bool) {
        if visible {
            self.hidden_classes.remove(&class_id);
        } else {
            self.hidden_classes.insert(class_id);
        }
    }

    /// Flip a class's visibility, returning the new state
    pub fn toggle_class(&mut self, class_id: usize) -> bool {
        let visible = !self.is_class_visible(class_id);
        self.set_class_visible(class_id, visible);
        visible
    }

    pub fn is_class_visible(&self, class_id: usize) -> bool {
        !self.hidden_classes.contains(&class_id)
    }

    /// Classes present in the cached detections, ascending
    pub fn detected_classes(&self) -> Vec<usize> {
        self.detections
            .iter()
            .map(|d| d.class_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Visible detections grouped by class and mapped into view pixels
    pub fn visible_overlay(&self) -> Result<Vec<OverlayGroup>, ViewError> {
        self.group_visible(|r| self.frames.to_view_space(r))
    }

    /// Same grouping as [`Self::visible_overlay`], left in image pixels
    pub fn visible_overlay_in_image(&self) -> Vec<OverlayGroup> {
        self.group_visible(|r| Ok(*r)).unwrap_or_default()
    }

    fn group_visible<F>(&self, map: F) -> Result<Vec<OverlayGroup>, ViewError>
    where
        F: Fn(&Rect) -> Result<Rect, ViewError>,
    {
        let mut groups: BTreeMap<usize, Vec<OverlayBox>> = BTreeMap::new();
        for d in &self.detections {
            if !self.is_class_visible(d.class_id) {
                continue;
            }
            groups.entry(d.class_id).or_default().push(OverlayBox {
                rect: map(&d.bbox)?,
                score: d.score,
            });
        }
        Ok(groups
            .into_iter()
            .map(|(class_id, boxes)| OverlayGroup { class_id, boxes })
            .collect())
    }
}

/// The one model a session has loaded. Selecting another model unloads the
/// previous one first.
pub struct ModelSlot<B: InferenceBackend> {
    active: Option<Arc<Model<B>>>,
}

impl<B: InferenceBackend> ModelSlot<B> {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn active(&self) -> Option<&Arc<Model<B>>> {
        self.active.as_ref()
    }

    pub fn require(&self) -> Result<&Arc<Model<B>>, SessionError> {
        self.active.as_ref().ok_or(SessionError::NoModel)
    }

    pub async fn select(&mut self, model: Arc<Model<B>>) -> Result<(), BackendError> {
        if let Some(current) = self.active.take() {
            if !Arc::ptr_eq(&current, &model) {
                current.unload().await?;
                info!(from = %current.title(), to = %model.title(), "switching model");
            }
        }
        model.load().await?;
        self.active = Some(model);
        Ok(())
    }

    pub async fn release(&mut self) -> Result<(), BackendError> {
        if let Some(current) = self.active.take() {
            current.unload().await?;
        }
        Ok(())
    }
}

impl<B: InferenceBackend> Default for ModelSlot<B> {
    fn default() -> Self {
        Self::new()
    }
}
