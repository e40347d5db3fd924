//! Drawing zones and detection overlays onto a target surface.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};

use crate::models::Rect;
use crate::session::OverlayGroup;

/// Something overlays can be drawn on, in view pixels
pub trait Surface {
    fn clear(&mut self);

    fn draw_rect(&mut self, rect: &Rect, color: Rgba<u8>);

    /// Box with a label tab on its top edge
    fn draw_labeled_rect(&mut self, rect: &Rect, label: &str, color: Rgba<u8>);

    /// Dim everything outside `rect`
    fn shade_outside(&mut self, rect: &Rect);
}

const SHADE: Rgba<u8> = Rgba([0, 0, 0, 96]);
const TAB_HEIGHT: u32 = 12;
const TAB_CHAR_WIDTH: u32 = 6;

const PALETTE: [Rgba<u8>; 8] = [
    Rgba([230, 25, 75, 255]),
    Rgba([60, 180, 75, 255]),
    Rgba([0, 130, 200, 255]),
    Rgba([245, 130, 48, 255]),
    Rgba([145, 30, 180, 255]),
    Rgba([70, 240, 240, 255]),
    Rgba([240, 50, 230, 255]),
    Rgba([255, 225, 25, 255]),
];

/// Stable color per class id
pub fn class_color(class_id: usize) -> Rgba<u8> {
    PALETTE[class_id % PALETTE.len()]
}

/// Surface backed by an RGBA image. Draws over a copy of a base frame so
/// overlays can be redrawn after each pan or zoom.
pub struct ImageSurface {
    base: RgbaImage,
    frame: RgbaImage,
}

impl ImageSurface {
    pub fn new(base: RgbaImage) -> Self {
        Self {
            frame: base.clone(),
            base,
        }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::new(width, height))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn into_image(self) -> RgbaImage {
        self.frame
    }

    /// Pixel-aligned rect clipped to the frame, or `None` when nothing is
    /// left to draw
    fn pixel_rect(&self, rect: &Rect) -> Option<imageproc::rect::Rect> {
        let clipped = rect
            .normalized()
            .clamp_to(self.frame.width() as f64, self.frame.height() as f64);
        let (left, top) = (clipped.left.round(), clipped.top.round());
        let width = (clipped.right().round() - left) as u32;
        let height = (clipped.bottom().round() - top) as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some(imageproc::rect::Rect::at(left as i32, top as i32).of_size(width, height))
    }
}

impl Surface for ImageSurface {
    fn clear(&mut self) {
        self.frame.clone_from(&self.base);
    }

    fn draw_rect(&mut self, rect: &Rect, color: Rgba<u8>) {
        if let Some(r) = self.pixel_rect(rect) {
            draw_hollow_rect_mut(&mut self.frame, r, color);
        }
    }

    fn draw_labeled_rect(&mut self, rect: &Rect, label: &str, color: Rgba<u8>) {
        let Some(r) = self.pixel_rect(rect) else {
            return;
        };
        draw_hollow_rect_mut(&mut self.frame, r, color);

        let tab_width = (label.chars().count() as u32 * TAB_CHAR_WIDTH).clamp(1, r.width());
        let tab_top = (r.top() - TAB_HEIGHT as i32).max(0);
        draw_filled_rect_mut(
            &mut self.frame,
            imageproc::rect::Rect::at(r.left(), tab_top).of_size(tab_width, TAB_HEIGHT),
            color,
        );
    }

    fn shade_outside(&mut self, rect: &Rect) {
        let keep = self.pixel_rect(rect);
        let alpha = SHADE[3] as u32;
        for (x, y, px) in self.frame.enumerate_pixels_mut() {
            let inside = keep.is_some_and(|r| {
                (x as i32) >= r.left()
                    && (x as i32) <= r.right()
                    && (y as i32) >= r.top()
                    && (y as i32) <= r.bottom()
            });
            if inside {
                continue;
            }
            for c in 0..3 {
                let v = px[c] as u32;
                px[c] = ((v * (255 - alpha) + SHADE[c] as u32 * alpha) / 255) as u8;
            }
        }
    }
}

/// Redraw the zone and every visible group. `label` turns a class id and
/// score into tab text.
pub fn render_detections<S, F>(
    surface: &mut S,
    zone: Option<&Rect>,
    groups: &[OverlayGroup],
    label: F,
) where
    S: Surface,
    F: Fn(usize, f32) -> String,
{
    surface.clear();
    if let Some(zone) = zone {
        surface.shade_outside(zone);
    }
    for group in groups {
        let color = class_color(group.class_id);
        for b in &group.boxes {
            surface.draw_labeled_rect(&b.rect, &label(group.class_id, b.score), color);
        }
    }
}
