use egui::{Pos2, Rect, Vec2};

use crate::annotation::Point;

/// Mapping between viewport (pointer) coordinates and image space for one
/// frame's canvas placement.
///
/// `screen_rect` is where the image is drawn this frame, `image_size` is the
/// intrinsic pixel size of the bitmap, `scroll` is the scroll offset of the
/// surrounding scroll area.
#[derive(Clone, Copy, Debug)]
pub struct CanvasView {
    pub screen_rect: Rect,
    pub image_size: Vec2,
    pub scroll: Vec2,
}

impl CanvasView {
    pub fn new(screen_rect: Rect, image_size: Vec2, scroll: Vec2) -> Self {
        Self {
            screen_rect,
            image_size,
            scroll,
        }
    }

    fn degenerate(&self) -> bool {
        self.screen_rect.width() <= 0.0 || self.screen_rect.height() <= 0.0
    }

    /// Direct-scale mapping: offset from the drawn rect's corner, scaled by
    /// the image-to-rect ratio. Used by the drawing tools, whose pointer
    /// positions already account for scrolling.
    pub fn to_image(&self, viewport: Pos2) -> Point {
        if self.degenerate() {
            return Point::new(0.0, 0.0);
        }
        let offset = viewport - self.screen_rect.min;
        Point::new(
            offset.x * self.image_size.x / self.screen_rect.width(),
            offset.y * self.image_size.y / self.screen_rect.height(),
        )
    }

    /// Fractional mapping: position as a fraction of the scrolled viewport,
    /// clamped into the image. Tolerates pointer positions slightly outside
    /// the canvas, so gestures that end off-canvas still land on the edge.
    pub fn to_image_clamped(&self, viewport: Pos2) -> Point {
        if self.degenerate() {
            return Point::new(0.0, 0.0);
        }
        let offset = viewport - self.screen_rect.min + self.scroll;
        let fx = offset.x / self.screen_rect.width();
        let fy = offset.y / self.screen_rect.height();
        Point::new(
            (fx * self.image_size.x).clamp(0.0, self.image_size.x),
            (fy * self.image_size.y).clamp(0.0, self.image_size.y),
        )
    }

    /// Inverse of `to_image`.
    pub fn to_screen(&self, point: Point) -> Pos2 {
        if self.image_size.x <= 0.0 || self.image_size.y <= 0.0 {
            return self.screen_rect.min;
        }
        Pos2::new(
            self.screen_rect.min.x + point.x * self.screen_rect.width() / self.image_size.x,
            self.screen_rect.min.y + point.y * self.screen_rect.height() / self.image_size.y,
        )
    }

    pub fn to_screen_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_max(
            self.to_screen(Point::from_pos2(rect.min)),
            self.to_screen(Point::from_pos2(rect.max)),
        )
    }

    /// Scale factor from image space to screen space, for stroke widths.
    pub fn zoom(&self) -> f32 {
        if self.image_size.x <= 0.0 {
            1.0
        } else {
            self.screen_rect.width() / self.image_size.x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_view() -> CanvasView {
        CanvasView::new(
            Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(640.0, 480.0)),
            Vec2::new(640.0, 480.0),
            Vec2::ZERO,
        )
    }

    #[test]
    fn strategies_agree_at_identity_scale() {
        let view = unit_view();
        let pointer = Pos2::new(180.0, 90.0);
        let direct = view.to_image(pointer);
        let fractional = view.to_image_clamped(pointer);
        assert_eq!(direct, fractional);
        assert_eq!(direct, Point::new(80.0, 40.0));
    }

    #[test]
    fn round_trip_is_exact_at_identity_scale() {
        let view = unit_view();
        let pointer = Pos2::new(333.0, 217.0);
        let image = view.to_image(pointer);
        assert_eq!(view.to_screen(image), pointer);
    }

    #[test]
    fn direct_mapping_accounts_for_zoom() {
        let view = CanvasView::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(320.0, 240.0)),
            Vec2::new(640.0, 480.0),
            Vec2::ZERO,
        );
        let image = view.to_image(Pos2::new(160.0, 120.0));
        assert_eq!(image, Point::new(320.0, 240.0));
        assert_eq!(view.zoom(), 0.5);
    }

    #[test]
    fn clamped_mapping_applies_scroll_and_clamps() {
        let view = CanvasView::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(640.0, 480.0)),
            Vec2::new(640.0, 480.0),
            Vec2::new(100.0, 0.0),
        );
        let image = view.to_image_clamped(Pos2::new(10.0, 10.0));
        assert_eq!(image, Point::new(110.0, 10.0));

        let out = view.to_image_clamped(Pos2::new(10_000.0, -50.0));
        assert_eq!(out, Point::new(640.0, 0.0));
    }

    #[test]
    fn zero_size_rect_degrades_to_origin() {
        let view = CanvasView::new(
            Rect::from_min_size(Pos2::new(10.0, 10.0), Vec2::ZERO),
            Vec2::new(640.0, 480.0),
            Vec2::ZERO,
        );
        assert_eq!(view.to_image(Pos2::new(50.0, 50.0)), Point::new(0.0, 0.0));
        assert_eq!(
            view.to_image_clamped(Pos2::new(50.0, 50.0)),
            Point::new(0.0, 0.0)
        );
    }
}
