use egui::epaint::{Mesh, Vertex};
use egui::{Color32, ColorImage, Context as EguiContext, Pos2, Rect, TextureHandle, TextureId, TextureOptions};
use image::RgbaImage;
use tracing::debug;

use crate::annotation::Point;

/// Segments in the textured fan used for live spot stamps.
const SPOT_FAN_SEGMENTS: usize = 24;

struct BlurCache {
    strength: f32,
    image: RgbaImage,
    texture: Option<TextureHandle>,
}

/// Owns the fully blurred copy of the background, keyed by blur strength.
/// Both blur modes draw from the same copy; it is regenerated only when the
/// strength changes or the image is replaced, never mutated in place.
#[derive(Default)]
pub struct BlurCompositor {
    cache: Option<BlurCache>,
}

impl BlurCompositor {
    /// Drops the cache; call when a new image is loaded.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn cached_strength(&self) -> Option<f32> {
        self.cache.as_ref().map(|cache| cache.strength)
    }

    /// Blurred copy of `base` at `strength`, regenerating on a miss.
    pub fn blurred(&mut self, base: &RgbaImage, strength: f32) -> &RgbaImage {
        let stale = self
            .cache
            .as_ref()
            .is_none_or(|cache| cache.strength != strength);
        if stale {
            debug!(strength, "regenerating blurred background");
            self.cache = Some(BlurCache {
                strength,
                image: blurred_copy(base, strength),
                texture: None,
            });
        }
        &self.cache.as_ref().unwrap().image
    }

    /// Same copy as an egui texture, uploaded lazily.
    pub fn texture(
        &mut self,
        ctx: &EguiContext,
        base: &RgbaImage,
        strength: f32,
    ) -> TextureId {
        self.blurred(base, strength);
        let cache = self.cache.as_mut().unwrap();
        if cache.texture.is_none() {
            let size = [cache.image.width() as usize, cache.image.height() as usize];
            let color = ColorImage::from_rgba_unmultiplied(size, cache.image.as_raw());
            cache.texture = Some(ctx.load_texture("blurred-background", color, TextureOptions::LINEAR));
        }
        cache.texture.as_ref().unwrap().id()
    }
}

/// Full-image Gaussian blur; `strength` is the sigma.
pub fn blurred_copy(base: &RgbaImage, strength: f32) -> RgbaImage {
    image::imageops::blur(base, strength.max(0.1))
}

/// Copies a filled circle of `radius` around `center` from `blurred` into
/// `dst`. Both images must share dimensions.
pub fn stamp_spot(dst: &mut RgbaImage, blurred: &RgbaImage, center: Point, radius: f32) {
    let (width, height) = dst.dimensions();
    let r_sq = radius * radius;
    let x0 = (center.x - radius).floor().max(0.0) as u32;
    let x1 = ((center.x + radius).ceil() as i64).clamp(0, width as i64) as u32;
    let y0 = (center.y - radius).floor().max(0.0) as u32;
    let y1 = ((center.y + radius).ceil() as i64).clamp(0, height as i64) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            if dx * dx + dy * dy <= r_sq {
                dst.put_pixel(x, y, *blurred.get_pixel(x, y));
            }
        }
    }
}

/// Stamps one circle per recorded stroke point.
pub fn stamp_spot_stroke(dst: &mut RgbaImage, blurred: &RgbaImage, points: &[Point], radius: f32) {
    for point in points {
        stamp_spot(dst, blurred, *point, radius);
    }
}

/// Focus composite: the blurred copy everywhere, with the original showing
/// through the union of the focus windows.
pub fn focus_composite(base: &RgbaImage, blurred: &RgbaImage, windows: &[Rect]) -> RgbaImage {
    let mut out = blurred.clone();
    let (width, height) = out.dimensions();
    for window in windows {
        let x0 = window.min.x.floor().max(0.0) as u32;
        let y0 = window.min.y.floor().max(0.0) as u32;
        let x1 = (window.max.x.ceil() as i64).clamp(0, width as i64) as u32;
        let y1 = (window.max.y.ceil() as i64).clamp(0, height as i64) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                out.put_pixel(x, y, *base.get_pixel(x, y));
            }
        }
    }
    out
}

/// Circle fan textured with the blurred background, for live spot stamps on
/// the egui painter. `screen_center`/`screen_radius` are in screen space,
/// `uv_center`/`uv_radius` in normalized texture coordinates.
pub fn spot_mesh(
    texture: TextureId,
    screen_center: Pos2,
    screen_radius: f32,
    uv_center: Pos2,
    uv_radius: egui::Vec2,
) -> Mesh {
    let mut mesh = Mesh::with_texture(texture);
    mesh.vertices.push(Vertex {
        pos: screen_center,
        uv: uv_center,
        color: Color32::WHITE,
    });
    for i in 0..=SPOT_FAN_SEGMENTS {
        let angle = i as f32 / SPOT_FAN_SEGMENTS as f32 * std::f32::consts::TAU;
        let (sin, cos) = angle.sin_cos();
        mesh.vertices.push(Vertex {
            pos: screen_center + egui::Vec2::new(cos, sin) * screen_radius,
            uv: uv_center + egui::Vec2::new(cos * uv_radius.x, sin * uv_radius.y),
            color: Color32::WHITE,
        });
    }
    for i in 0..SPOT_FAN_SEGMENTS as u32 {
        mesh.indices.extend_from_slice(&[0, i + 1, i + 2]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn cache_regenerates_only_on_strength_change() {
        let base = checkerboard(32);
        let mut compositor = BlurCompositor::default();
        assert!(compositor.cached_strength().is_none());

        compositor.blurred(&base, 5.0);
        assert_eq!(compositor.cached_strength(), Some(5.0));

        // Same strength keeps the cache.
        compositor.blurred(&base, 5.0);
        assert_eq!(compositor.cached_strength(), Some(5.0));

        compositor.blurred(&base, 9.0);
        assert_eq!(compositor.cached_strength(), Some(9.0));

        compositor.invalidate();
        assert!(compositor.cached_strength().is_none());
    }

    #[test]
    fn spot_stamp_is_idempotent() {
        let base = checkerboard(32);
        let blurred = blurred_copy(&base, 4.0);

        let mut first = base.clone();
        stamp_spot(&mut first, &blurred, Point::new(16.0, 16.0), 6.0);
        let mut second = first.clone();
        stamp_spot(&mut second, &blurred, Point::new(16.0, 16.0), 6.0);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn spot_stamp_changes_inside_circle_only() {
        let base = checkerboard(32);
        let blurred = blurred_copy(&base, 4.0);
        let mut out = base.clone();
        stamp_spot(&mut out, &blurred, Point::new(16.0, 16.0), 5.0);

        assert_eq!(out.get_pixel(16, 16), blurred.get_pixel(16, 16));
        // Far corner untouched.
        assert_eq!(out.get_pixel(0, 0), base.get_pixel(0, 0));
        assert_eq!(out.get_pixel(31, 31), base.get_pixel(31, 31));
    }

    #[test]
    fn spot_stamp_clamps_at_image_edges() {
        let base = checkerboard(16);
        let blurred = blurred_copy(&base, 2.0);
        let mut out = base.clone();
        stamp_spot(&mut out, &blurred, Point::new(0.0, 0.0), 10.0);
        stamp_spot(&mut out, &blurred, Point::new(15.5, 15.5), 10.0);
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn focus_composite_keeps_windows_sharp() {
        let base = checkerboard(32);
        let blurred = blurred_copy(&base, 6.0);
        let window = Rect::from_min_max(Pos2::new(8.0, 8.0), Pos2::new(16.0, 16.0));
        let out = focus_composite(&base, &blurred, &[window]);

        assert_eq!(out.get_pixel(10, 10), base.get_pixel(10, 10));
        assert_eq!(out.get_pixel(30, 30), blurred.get_pixel(30, 30));
        assert_eq!(out.dimensions(), base.dimensions());
    }

    #[test]
    fn spot_mesh_has_closed_fan_topology() {
        let mesh = spot_mesh(
            TextureId::default(),
            Pos2::new(100.0, 100.0),
            20.0,
            Pos2::new(0.5, 0.5),
            egui::Vec2::new(0.05, 0.05),
        );
        assert_eq!(mesh.vertices.len(), SPOT_FAN_SEGMENTS + 2);
        assert_eq!(mesh.indices.len(), SPOT_FAN_SEGMENTS * 3);
    }
}
