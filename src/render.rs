use egui::epaint::PathShape;
use egui::{vec2, Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, TextureId};

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, Point};
use crate::blur::spot_mesh;
use crate::coords::CanvasView;

const ELLIPSE_SEGMENTS: usize = 56;
/// Selection highlight stroke, dashed 4 on 4 off, around bounds padded by 3.
const SELECTION_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 100, 255, 178);
const SELECTION_PADDING: f32 = 3.0;
/// Caret phase length; on for one phase, off for the next.
const CARET_PHASE: f64 = 0.5;

pub fn caret_visible(now: f64) -> bool {
    (now / CARET_PHASE) as i64 % 2 == 0
}

/// All committed focus windows, in store order.
pub fn focus_rects(items: &[Annotation]) -> Vec<Rect> {
    items
        .iter()
        .filter_map(|annotation| annotation.focus_rect())
        .collect()
}

/// Whether an annotation takes part in the render pass. With focus windows
/// present, ordinary annotations must sit fully inside at least one window;
/// anything outside would float over blurred content. Blur annotations are
/// exempt from their own filter.
pub fn annotation_visible(annotation: &Annotation, items: &[Annotation]) -> bool {
    if annotation.is_blur() {
        return true;
    }
    let windows = focus_rects(items);
    if windows.is_empty() {
        return true;
    }
    match annotation.bounds() {
        Some(bounds) => windows.iter().any(|window| window.contains_rect(bounds)),
        None => false,
    }
}

/// Splits the scene into the ordinary pass and the spot pass. Focus windows
/// appear in neither; they only shape the background.
pub fn partition(items: &[Annotation]) -> (Vec<&Annotation>, Vec<&Annotation>) {
    let mut ordinary = Vec::new();
    let mut spots = Vec::new();
    for annotation in items {
        match &annotation.kind {
            AnnotationKind::FocusRect { .. } => {}
            AnnotationKind::SpotBlur { .. } => spots.push(annotation),
            _ => ordinary.push(annotation),
        }
    }
    (ordinary, spots)
}

/// Texture handles for one frame. `blurred` is only present when the scene
/// actually contains blur annotations; without it both blur passes are
/// skipped.
#[derive(Clone, Copy)]
pub struct SceneTextures {
    pub base: TextureId,
    pub blurred: Option<TextureId>,
}

/// Caret/selection context for one frame.
#[derive(Clone, Copy, Default)]
pub struct SceneOverlay {
    pub selection: Option<AnnotationId>,
    pub editing_text: Option<AnnotationId>,
    /// Live spot stroke: annotation id and the committed point prefix that
    /// gets the full composite; the tail gets a light outline until the next
    /// throttle tick.
    pub live_spot: Option<(AnnotationId, usize)>,
    pub now: f64,
}

/// Full scene draw in render order: background (focus-composited when focus
/// windows exist), ordinary annotations, spot blurs, selection highlight.
pub fn draw_scene(
    painter: &Painter,
    view: &CanvasView,
    items: &[Annotation],
    textures: SceneTextures,
    overlay: &SceneOverlay,
) {
    draw_background(painter, view, items, textures);

    let (ordinary, spots) = partition(items);
    for annotation in ordinary {
        if !annotation_visible(annotation, items) {
            continue;
        }
        let editing = overlay.editing_text == Some(annotation.id);
        draw_annotation(painter, annotation, view, false, editing, overlay.now);
    }

    if let Some(blurred) = textures.blurred {
        for annotation in spots {
            let committed = match overlay.live_spot {
                Some((id, committed)) if id == annotation.id => Some(committed),
                _ => None,
            };
            draw_spot_annotation(painter, annotation, view, blurred, committed);
        }
    }

    draw_selection_highlight(painter, view, items, overlay);
}

fn draw_background(
    painter: &Painter,
    view: &CanvasView,
    items: &[Annotation],
    textures: SceneTextures,
) {
    let full_uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
    let windows = focus_rects(items);
    match (textures.blurred, windows.is_empty()) {
        (Some(blurred), false) => {
            painter.image(blurred, view.screen_rect, full_uv, Color32::WHITE);
            // Sharp windows punched through the blur; overlap draws the
            // same pixels twice, which is harmless.
            for window in windows {
                let uv = Rect::from_min_max(
                    Pos2::new(
                        window.min.x / view.image_size.x,
                        window.min.y / view.image_size.y,
                    ),
                    Pos2::new(
                        window.max.x / view.image_size.x,
                        window.max.y / view.image_size.y,
                    ),
                );
                painter.image(textures.base, view.to_screen_rect(window), uv, Color32::WHITE);
            }
        }
        _ => {
            painter.image(textures.base, view.screen_rect, full_uv, Color32::WHITE);
        }
    }
}

pub fn draw_annotation(
    painter: &Painter,
    annotation: &Annotation,
    view: &CanvasView,
    preview: bool,
    editing: bool,
    now: f64,
) {
    let zoom = view.zoom();
    match &annotation.kind {
        AnnotationKind::Pen {
            points,
            color,
            width,
        } => {
            let stroke = Stroke::new((width * zoom).max(1.0), annotation_color(*color, preview));
            draw_polyline(painter, points, view, stroke);
        }
        AnnotationKind::Highlighter {
            points,
            color,
            width,
        } => {
            // Reduced alpha; butt caps are approximated by the plain path.
            let mut color = *color;
            color[3] = (color[3] as f32 * 0.4) as u8;
            let stroke = Stroke::new((width * zoom).max(1.0), annotation_color(color, preview));
            draw_polyline(painter, points, view, stroke);
        }
        AnnotationKind::Arrow {
            from,
            to,
            color,
            width,
        } => {
            let stroke = Stroke::new((width * zoom).max(1.0), annotation_color(*color, preview));
            draw_arrow(painter, *from, *to, *width, view, stroke);
        }
        AnnotationKind::Rectangle {
            rect,
            color,
            line_width,
        } => {
            let stroke = Stroke::new(
                (line_width * zoom).max(1.0),
                annotation_color(*color, preview),
            );
            painter.rect_stroke(view.to_screen_rect(rect.to_rect()), 0.0, stroke);
        }
        AnnotationKind::Ellipse {
            center,
            rx,
            ry,
            color,
            line_width,
        } => {
            let stroke = Stroke::new(
                (line_width * zoom).max(1.0),
                annotation_color(*color, preview),
            );
            let screen_center = view.to_screen(*center);
            let points = ellipse_polyline(screen_center, rx * zoom, ry * zoom);
            painter.add(Shape::closed_line(points, stroke));
        }
        AnnotationKind::Text {
            pos,
            content,
            color,
            font_px,
        } => {
            draw_text(
                painter, view, *pos, content, *color, *font_px, editing, now,
            );
        }
        AnnotationKind::Step {
            center,
            radius,
            number,
            color,
            font_px,
        } => {
            let screen_center = view.to_screen(*center);
            painter.circle_filled(screen_center, radius * zoom, annotation_color(*color, preview));
            painter.text(
                screen_center,
                Align2::CENTER_CENTER,
                number.to_string(),
                FontId::proportional(font_px * zoom),
                Color32::WHITE,
            );
        }
        // Drawn by the dedicated blur passes.
        AnnotationKind::SpotBlur { .. } | AnnotationKind::FocusRect { .. } => {}
    }
}

/// Stamps the spot stroke with the blurred texture. For the live stroke,
/// points past `committed` get a brush outline instead of the composite.
fn draw_spot_annotation(
    painter: &Painter,
    annotation: &Annotation,
    view: &CanvasView,
    blurred: TextureId,
    committed: Option<usize>,
) {
    let AnnotationKind::SpotBlur {
        points,
        brush_radius,
    } = &annotation.kind
    else {
        return;
    };
    if points.len() < 2 {
        return;
    }
    let zoom = view.zoom();
    let cutoff = committed.unwrap_or(points.len()).min(points.len());
    for point in &points[..cutoff] {
        let uv_center = Pos2::new(point.x / view.image_size.x, point.y / view.image_size.y);
        let uv_radius = vec2(
            brush_radius / view.image_size.x,
            brush_radius / view.image_size.y,
        );
        painter.add(spot_mesh(
            blurred,
            view.to_screen(*point),
            brush_radius * zoom,
            uv_center,
            uv_radius,
        ));
    }
    for point in &points[cutoff..] {
        painter.circle_stroke(
            view.to_screen(*point),
            brush_radius * zoom,
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(255, 255, 255, 120)),
        );
    }
}

fn draw_selection_highlight(
    painter: &Painter,
    view: &CanvasView,
    items: &[Annotation],
    overlay: &SceneOverlay,
) {
    let Some(selected_id) = overlay.selection else {
        return;
    };
    // No highlight under an open caret.
    if overlay.editing_text == Some(selected_id) {
        return;
    }
    let Some(annotation) = items.iter().find(|item| item.id == selected_id) else {
        return;
    };
    // Text bounds use real glyph metrics here; the character-count estimate
    // is only for contexts without a font system.
    let measure = |text: &str, font_px: f32| {
        painter
            .layout_no_wrap(
                text.to_owned(),
                FontId::proportional(font_px),
                Color32::PLACEHOLDER,
            )
            .rect
            .size()
    };
    let Some(bounds) = annotation.bounds_with(Some(&measure)) else {
        return;
    };

    let rect = view
        .to_screen_rect(bounds)
        .expand(SELECTION_PADDING * view.zoom());
    let stroke = Stroke::new(2.0, SELECTION_COLOR);
    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
        rect.left_top(),
    ];
    painter.extend(Shape::dashed_line(&corners, stroke, 4.0, 4.0));
}

fn draw_text(
    painter: &Painter,
    view: &CanvasView,
    pos: Point,
    content: &str,
    color: [u8; 4],
    font_px: f32,
    editing: bool,
    now: f64,
) {
    let zoom = view.zoom();
    let font = FontId::proportional(font_px * zoom);
    // Anchor approximates the baseline; egui positions by the glyph box.
    let anchor = view.to_screen(pos) + vec2(0.0, font_px * 0.25 * zoom);

    let galley_rect = if content.is_empty() && editing {
        painter.text(
            anchor,
            Align2::LEFT_BOTTOM,
            "Text",
            font.clone(),
            Color32::from_rgba_unmultiplied(color[0], color[1], color[2], 90),
        )
    } else {
        painter.text(
            anchor,
            Align2::LEFT_BOTTOM,
            content,
            font.clone(),
            annotation_color(color, false),
        )
    };

    if editing && caret_visible(now) {
        let caret_x = if content.is_empty() {
            anchor.x
        } else {
            galley_rect.max.x + 2.0
        };
        painter.line_segment(
            [
                Pos2::new(caret_x, galley_rect.min.y),
                Pos2::new(caret_x, galley_rect.max.y),
            ],
            Stroke::new(1.5, annotation_color(color, false)),
        );
    }
}

fn draw_polyline(painter: &Painter, points: &[Point], view: &CanvasView, stroke: Stroke) {
    if points.len() < 2 {
        return;
    }
    let screen: Vec<Pos2> = points.iter().map(|point| view.to_screen(*point)).collect();
    painter.add(Shape::Path(PathShape::line(screen, stroke)));
}

fn draw_arrow(
    painter: &Painter,
    from: Point,
    to: Point,
    width: f32,
    view: &CanvasView,
    stroke: Stroke,
) {
    let from_screen = view.to_screen(from);
    let to_screen = view.to_screen(to);
    painter.line_segment([from_screen, to_screen], stroke);

    let direction = to_screen - from_screen;
    let len = direction.length().max(1.0);
    let unit = direction / len;
    // Head grows with the stroke, half-angle 30 degrees.
    let head_len = (8.0 + 2.0 * width) * view.zoom();
    let angle = std::f32::consts::FRAC_PI_6;
    let (sin, cos) = angle.sin_cos();
    let left = to_screen - vec2(unit.x * cos - unit.y * sin, unit.x * sin + unit.y * cos) * head_len;
    let right =
        to_screen - vec2(unit.x * cos + unit.y * sin, -unit.x * sin + unit.y * cos) * head_len;
    painter.add(Shape::convex_polygon(
        vec![to_screen, left, right],
        stroke.color,
        Stroke::NONE,
    ));
}

fn ellipse_polyline(center: Pos2, rx: f32, ry: f32) -> Vec<Pos2> {
    let mut points = Vec::with_capacity(ELLIPSE_SEGMENTS);
    for i in 0..ELLIPSE_SEGMENTS {
        let t = (i as f32 / ELLIPSE_SEGMENTS as f32) * std::f32::consts::TAU;
        points.push(Pos2::new(center.x + rx * t.cos(), center.y + ry * t.sin()));
    }
    points
}

fn annotation_color(color: [u8; 4], preview: bool) -> Color32 {
    let color = Color32::from_rgba_unmultiplied(color[0], color[1], color[2], color[3]);
    if preview {
        color.linear_multiply(0.7)
    } else {
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RectData;

    fn pen(id: AnnotationId, a: Point, b: Point) -> Annotation {
        Annotation {
            id,
            kind: AnnotationKind::Pen {
                points: vec![a, b],
                color: [255, 0, 0, 255],
                width: 5.0,
            },
        }
    }

    fn focus(id: AnnotationId, min: Point, max: Point) -> Annotation {
        Annotation {
            id,
            kind: AnnotationKind::FocusRect {
                rect: RectData::from_points(min, max),
            },
        }
    }

    #[test]
    fn focus_filter_keeps_inside_drops_outside() {
        let items = vec![
            pen(1, Point::new(10.0, 10.0), Point::new(20.0, 20.0)),
            pen(2, Point::new(150.0, 150.0), Point::new(160.0, 160.0)),
            focus(3, Point::new(0.0, 0.0), Point::new(100.0, 100.0)),
        ];
        assert!(annotation_visible(&items[0], &items));
        assert!(!annotation_visible(&items[1], &items));
        // The focus window itself stays interactable.
        assert!(annotation_visible(&items[2], &items));
    }

    #[test]
    fn everything_visible_without_focus_windows() {
        let items = vec![pen(1, Point::new(500.0, 500.0), Point::new(600.0, 600.0))];
        assert!(annotation_visible(&items[0], &items));
    }

    #[test]
    fn partition_orders_spots_after_ordinary() {
        let items = vec![
            Annotation {
                id: 1,
                kind: AnnotationKind::SpotBlur {
                    points: vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
                    brush_radius: 5.0,
                },
            },
            pen(2, Point::new(10.0, 10.0), Point::new(20.0, 20.0)),
            focus(3, Point::new(0.0, 0.0), Point::new(50.0, 50.0)),
        ];
        let (ordinary, spots) = partition(&items);
        assert_eq!(ordinary.len(), 1);
        assert_eq!(ordinary[0].id, 2);
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].id, 1);
    }

    #[test]
    fn caret_blinks_in_half_second_phases() {
        assert!(caret_visible(0.0));
        assert!(caret_visible(0.49));
        assert!(!caret_visible(0.51));
        assert!(caret_visible(1.01));
    }
}
