use crate::models::{Point, Rect};
use crate::view::CanvasSize;

/// An in-progress drag selection, anchored where the pointer went down.
///
/// Positions are clamped to the canvas so a drag that leaves it still
/// yields a usable rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    start: Point,
    canvas: CanvasSize,
}

impl Selection {
    pub(crate) fn new(start: Point, canvas: CanvasSize) -> Self {
        Self {
            start: start.clamped(canvas.width, canvas.height),
            canvas,
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    /// Live rectangle from the drag start to `current`. Extents keep their
    /// sign so callers can render the drag direction as-is.
    pub fn update(&self, current: Point) -> Rect {
        let end = current.clamped(self.canvas.width, self.canvas.height);
        Rect::new(
            self.start.x,
            self.start.y,
            end.x - self.start.x,
            end.y - self.start.y,
        )
    }
}
