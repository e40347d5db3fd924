use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, width] x [0, height]`
    pub fn clamped(&self, width: f64, height: f64) -> Self {
        Self {
            x: self.x.clamp(0.0, width.max(0.0)),
            y: self.y.clamp(0.0, height.max(0.0)),
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle.
///
/// Width and height may be negative while a selection is being dragged;
/// call [`Rect::normalized`] before using it as a region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_corners(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// (left, top, right, bottom)
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.left, self.top, self.right(), self.bottom())
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True when the rectangle covers no area (zero, negative or NaN extents)
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Flip negative extents so width and height are non-negative
    pub fn normalized(&self) -> Self {
        let (mut left, mut width) = (self.left, self.width);
        let (mut top, mut height) = (self.top, self.height);
        if width < 0.0 {
            left += width;
            width = -width;
        }
        if height < 0.0 {
            top += height;
            height = -height;
        }
        Self::new(left, top, width, height)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.scale_vec(factor, factor)
    }

    /// Scale vertical components by `sy` and horizontal ones by `sx`
    pub fn scale_vec(&self, sy: f64, sx: f64) -> Self {
        Self::new(
            self.left * sx,
            self.top * sy,
            self.width * sx,
            self.height * sy,
        )
    }

    pub fn translate(&self, vector: Point) -> Self {
        Self::new(
            self.left + vector.x,
            self.top + vector.y,
            self.width,
            self.height,
        )
    }

    /// Clamp all four edges into `[0, width] x [0, height]`. Corners are
    /// clamped one by one, and NaN corners land on the lower bound.
    pub fn clamp_to(&self, width: f64, height: f64) -> Self {
        let (left, top, right, bottom) = self.normalized().corners();
        let fit = |v: f64, max: f64| v.max(0.0).min(max);
        let (left, right) = (fit(left, width), fit(right, width));
        let (top, bottom) = (fit(top, height), fit(bottom, height));
        Self::from_corners(left, top, right.max(left), bottom.max(top))
    }

    /// Overlap area, floored at zero when the boxes are disjoint on either axis
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }

    pub fn iou(&self, other: &Rect) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// Pixel dimensions of a model's input image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoded box in model-input pixel coordinates, before suppression
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub bbox: Rect,
    pub class_id: usize,
    pub score: f32,
}

/// Final detection, always in original-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: Rect,
    pub class_id: usize,
    pub score: f32,
}
