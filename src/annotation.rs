use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

pub type AnnotationId = u64;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tool {
    Select,
    Pen,
    Highlighter,
    Arrow,
    Rectangle,
    Ellipse,
    Text,
    Step,
    Blur,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlurMode {
    Spot,
    Focus,
}

/// Abstract S/M/L size shared by every tool; each tool maps it to its own
/// pixel value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarkSize {
    S,
    M,
    L,
}

impl MarkSize {
    pub fn pen_px(self) -> f32 {
        match self {
            Self::S => 2.0,
            Self::M => 5.0,
            Self::L => 10.0,
        }
    }

    pub fn highlighter_px(self) -> f32 {
        match self {
            Self::S => 8.0,
            Self::M => 16.0,
            Self::L => 24.0,
        }
    }

    pub fn font_px(self) -> f32 {
        match self {
            Self::S => 12.0,
            Self::M => 16.0,
            Self::L => 24.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
        }
    }
}

/// A point in image space, i.e. the pixel grid of the captured bitmap.
/// Annotations never store screen coordinates, which keeps them invariant
/// under zoom and scroll.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_pos2(self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    pub fn from_pos2(value: Pos2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }

    pub fn delta(self, other: Point) -> Vec2 {
        Vec2::new(other.x - self.x, other.y - self.y)
    }

    pub fn translated(self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RectData {
    pub min: Point,
    pub max: Point,
}

impl RectData {
    pub fn from_points(a: Point, b: Point) -> Self {
        Self { min: a, max: b }.normalize()
    }

    pub fn normalize(self) -> Self {
        Self {
            min: Point::new(self.min.x.min(self.max.x), self.min.y.min(self.max.y)),
            max: Point::new(self.min.x.max(self.max.x), self.min.y.max(self.max.y)),
        }
    }

    pub fn to_rect(self) -> Rect {
        let norm = self.normalize();
        Rect::from_min_max(norm.min.to_pos2(), norm.max.to_pos2())
    }

    pub fn width(self) -> f32 {
        (self.max.x - self.min.x).abs()
    }

    pub fn height(self) -> f32 {
        (self.max.y - self.min.y).abs()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AnnotationKind {
    Pen {
        points: Vec<Point>,
        color: [u8; 4],
        width: f32,
    },
    Highlighter {
        points: Vec<Point>,
        color: [u8; 4],
        width: f32,
    },
    Arrow {
        from: Point,
        to: Point,
        color: [u8; 4],
        width: f32,
    },
    Rectangle {
        rect: RectData,
        color: [u8; 4],
        line_width: f32,
    },
    Ellipse {
        center: Point,
        rx: f32,
        ry: f32,
        color: [u8; 4],
        line_width: f32,
    },
    Text {
        /// Baseline-left anchor of the first line.
        pos: Point,
        content: String,
        color: [u8; 4],
        font_px: f32,
    },
    Step {
        center: Point,
        radius: f32,
        number: u32,
        color: [u8; 4],
        font_px: f32,
    },
    SpotBlur {
        points: Vec<Point>,
        brush_radius: f32,
    },
    /// Window that stays sharp while the rest of the image is blurred.
    /// Has no visible stroke of its own.
    FocusRect { rect: RectData },
}

impl Annotation {
    /// Axis-aligned bounding box in image space, padded by half the stroke
    /// width so the selection outline encloses the visible stroke. `None`
    /// only for degenerate geometry (an empty point list).
    ///
    /// `measure` supplies real font metrics for text, returning the size of a
    /// single rendered line; without it a character-count heuristic is used.
    pub fn bounds_with(&self, measure: Option<&dyn Fn(&str, f32) -> Vec2>) -> Option<Rect> {
        match &self.kind {
            AnnotationKind::Pen { points, width, .. }
            | AnnotationKind::Highlighter { points, width, .. } => {
                points_bounds(points).map(|rect| rect.expand(width / 2.0))
            }
            AnnotationKind::Arrow {
                from, to, width, ..
            } => Some(Rect::from_two_pos(from.to_pos2(), to.to_pos2()).expand(width / 2.0)),
            AnnotationKind::Rectangle {
                rect, line_width, ..
            } => Some(rect.to_rect().expand(line_width / 2.0)),
            AnnotationKind::Ellipse {
                center,
                rx,
                ry,
                line_width,
                ..
            } => Some(
                Rect::from_center_size(center.to_pos2(), Vec2::new(rx * 2.0, ry * 2.0))
                    .expand(line_width / 2.0),
            ),
            AnnotationKind::Text {
                pos,
                content,
                font_px,
                ..
            } => Some(text_bounds(*pos, content, *font_px, measure)),
            AnnotationKind::Step { center, radius, .. } => Some(Rect::from_center_size(
                center.to_pos2(),
                Vec2::splat(radius * 2.0),
            )),
            AnnotationKind::SpotBlur {
                points,
                brush_radius,
            } => points_bounds(points).map(|rect| rect.expand(brush_radius / 2.0)),
            AnnotationKind::FocusRect { rect } => Some(rect.to_rect()),
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds_with(None)
    }

    /// Per-variant point test used by selection. The match stays exhaustive:
    /// a new variant without a case here is a compile error, not a silent
    /// miss.
    pub fn contains(&self, point: Point, threshold: f32) -> bool {
        let p = point.to_pos2();
        match &self.kind {
            AnnotationKind::Pen { points, width, .. }
            | AnnotationKind::Highlighter { points, width, .. } => {
                near_polyline(p, points, threshold.max(width / 2.0))
            }
            AnnotationKind::Arrow {
                from, to, width, ..
            } => {
                distance_to_segment(p, from.to_pos2(), to.to_pos2()) <= threshold.max(width / 2.0)
            }
            AnnotationKind::Rectangle {
                rect, line_width, ..
            } => {
                let r = rect.to_rect();
                if r.contains(p) {
                    return true;
                }
                // The border is still grabbable just outside the box.
                r.expand(threshold.max(line_width / 2.0)).contains(p)
            }
            AnnotationKind::Ellipse {
                center,
                rx,
                ry,
                line_width,
                ..
            } => {
                if *rx <= 0.0 || *ry <= 0.0 {
                    return false;
                }
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                if (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry) <= 1.0 {
                    return true;
                }
                // Annulus around the rim for near-misses on the stroke.
                let half = threshold.max(line_width / 2.0);
                let outer_rx = rx + half;
                let outer_ry = ry + half;
                (dx * dx) / (outer_rx * outer_rx) + (dy * dy) / (outer_ry * outer_ry) <= 1.0
            }
            AnnotationKind::Text { .. } => self
                .bounds()
                .is_some_and(|bounds| bounds.expand(threshold).contains(p)),
            AnnotationKind::Step { center, radius, .. } => {
                // Steps are filled discs, so the whole disc hits.
                let reach = radius + threshold;
                center.delta(point).length_sq() <= reach * reach
            }
            AnnotationKind::SpotBlur {
                points,
                brush_radius,
            } => near_polyline(p, points, threshold.max(brush_radius / 2.0)),
            AnnotationKind::FocusRect { rect } => rect.to_rect().contains(p),
        }
    }

    pub fn translate_by(&mut self, delta: Vec2) {
        match &mut self.kind {
            AnnotationKind::Pen { points, .. }
            | AnnotationKind::Highlighter { points, .. }
            | AnnotationKind::SpotBlur { points, .. } => {
                for point in points.iter_mut() {
                    *point = point.translated(delta);
                }
            }
            AnnotationKind::Arrow { from, to, .. } => {
                *from = from.translated(delta);
                *to = to.translated(delta);
            }
            AnnotationKind::Rectangle { rect, .. } | AnnotationKind::FocusRect { rect } => {
                rect.min = rect.min.translated(delta);
                rect.max = rect.max.translated(delta);
            }
            AnnotationKind::Ellipse { center, .. } | AnnotationKind::Step { center, .. } => {
                *center = center.translated(delta);
            }
            AnnotationKind::Text { pos, .. } => *pos = pos.translated(delta),
        }
    }

    /// Blur annotations composite after every ordinary annotation regardless
    /// of creation order.
    pub fn is_blur(&self) -> bool {
        matches!(
            self.kind,
            AnnotationKind::SpotBlur { .. } | AnnotationKind::FocusRect { .. }
        )
    }

    pub fn is_spot_blur(&self) -> bool {
        matches!(self.kind, AnnotationKind::SpotBlur { .. })
    }

    pub fn focus_rect(&self) -> Option<Rect> {
        match &self.kind {
            AnnotationKind::FocusRect { rect } => Some(rect.to_rect()),
            _ => None,
        }
    }
}

/// Bounds estimate for text. The first line's baseline sits at `pos.y`, so
/// the box starts above the anchor.
fn text_bounds(
    pos: Point,
    content: &str,
    font_px: f32,
    measure: Option<&dyn Fn(&str, f32) -> Vec2>,
) -> Rect {
    let lines: Vec<&str> = content.split('\n').collect();
    let (width, line_height) = match measure {
        Some(measure) => {
            let line_height = measure("Mg", font_px).y.max(font_px);
            let width = lines
                .iter()
                .map(|line| measure(line, font_px).x)
                .fold(0.0f32, f32::max);
            (width, line_height)
        }
        None => {
            let max_chars = lines
                .iter()
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0);
            (max_chars as f32 * font_px * 0.6, font_px * 1.3)
        }
    };
    Rect::from_min_size(
        Pos2::new(pos.x, pos.y - line_height * 0.8),
        Vec2::new(width.max(20.0), lines.len().max(1) as f32 * line_height),
    )
}

fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_min_max(first.to_pos2(), first.to_pos2());
    for point in &points[1..] {
        rect.extend_with(point.to_pos2());
    }
    Some(rect)
}

pub fn distance_to_segment(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let ap = point - a;
    let ab_len_sq = ab.length_sq();
    if ab_len_sq <= f32::EPSILON {
        return ap.length();
    }
    let t = (ap.dot(ab) / ab_len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    (point - projection).length()
}

pub fn near_polyline(point: Pos2, points: &[Point], threshold: f32) -> bool {
    if points.len() < 2 {
        return false;
    }
    points
        .windows(2)
        .any(|pair| distance_to_segment(point, pair[0].to_pos2(), pair[1].to_pos2()) <= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(points: Vec<Point>, width: f32) -> Annotation {
        Annotation {
            id: 1,
            kind: AnnotationKind::Pen {
                points,
                color: [255, 0, 0, 255],
                width,
            },
        }
    }

    #[test]
    fn polyline_hit_on_and_off_stroke() {
        let stroke = pen(
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 50.0),
            ],
            4.0,
        );
        assert!(stroke.contains(Point::new(25.0, 0.0), 0.0));
        assert!(stroke.contains(Point::new(50.0, 25.0), 0.0));
        // Within half the stroke width off the segment.
        assert!(stroke.contains(Point::new(25.0, 1.9), 0.0));
        // Clearly past width/2 + threshold.
        assert!(!stroke.contains(Point::new(25.0, 8.0), 2.0));
    }

    #[test]
    fn single_point_stroke_never_hits() {
        let stroke = pen(vec![Point::new(10.0, 10.0)], 4.0);
        assert!(!stroke.contains(Point::new(10.0, 10.0), 5.0));
    }

    #[test]
    fn pen_bounds_padded_by_half_width() {
        let stroke = pen(vec![Point::new(10.0, 10.0), Point::new(30.0, 40.0)], 6.0);
        let bounds = stroke.bounds().expect("two points give bounds");
        assert_eq!(bounds.min.x, 7.0);
        assert_eq!(bounds.min.y, 7.0);
        assert_eq!(bounds.max.x, 33.0);
        assert_eq!(bounds.max.y, 43.0);
    }

    #[test]
    fn empty_stroke_has_no_bounds() {
        assert!(pen(vec![], 4.0).bounds().is_none());
    }

    #[test]
    fn rectangle_hits_inside_and_on_border_only() {
        let rect = Annotation {
            id: 1,
            kind: AnnotationKind::Rectangle {
                rect: RectData::from_points(Point::new(10.0, 10.0), Point::new(60.0, 40.0)),
                color: [0, 0, 0, 255],
                line_width: 2.0,
            },
        };
        assert!(rect.contains(Point::new(35.0, 25.0), 2.0));
        assert!(rect.contains(Point::new(10.0, 25.0), 2.0));
        assert!(!rect.contains(Point::new(70.0, 25.0), 2.0));
    }

    #[test]
    fn ellipse_hits_interior_and_rim() {
        let ellipse = Annotation {
            id: 1,
            kind: AnnotationKind::Ellipse {
                center: Point::new(50.0, 50.0),
                rx: 30.0,
                ry: 20.0,
                color: [0, 0, 0, 255],
                line_width: 4.0,
            },
        };
        assert!(ellipse.contains(Point::new(50.0, 50.0), 2.0));
        // Just outside the rim, within the stroke half-width.
        assert!(ellipse.contains(Point::new(81.0, 50.0), 2.0));
        assert!(!ellipse.contains(Point::new(95.0, 50.0), 2.0));
    }

    #[test]
    fn step_is_a_filled_disc() {
        let step = Annotation {
            id: 1,
            kind: AnnotationKind::Step {
                center: Point::new(20.0, 20.0),
                radius: 12.8,
                number: 3,
                color: [255, 0, 0, 255],
                font_px: 16.0,
            },
        };
        assert!(step.contains(Point::new(20.0, 20.0), 0.0));
        assert!(step.contains(Point::new(30.0, 20.0), 0.0));
        assert!(!step.contains(Point::new(40.0, 20.0), 5.0));
        let bounds = step.bounds().unwrap();
        assert!((bounds.width() - 25.6).abs() < 1e-4);
    }

    #[test]
    fn translate_moves_arrow_endpoints() {
        let mut arrow = Annotation {
            id: 1,
            kind: AnnotationKind::Arrow {
                from: Point::new(0.0, 0.0),
                to: Point::new(10.0, 0.0),
                color: [0, 0, 0, 255],
                width: 2.0,
            },
        };
        arrow.translate_by(Vec2::new(5.0, 7.0));
        match arrow.kind {
            AnnotationKind::Arrow { from, to, .. } => {
                assert_eq!(from, Point::new(5.0, 7.0));
                assert_eq!(to, Point::new(15.0, 7.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn focus_rect_bounds_are_unpadded() {
        let focus = Annotation {
            id: 1,
            kind: AnnotationKind::FocusRect {
                rect: RectData::from_points(Point::new(0.0, 0.0), Point::new(100.0, 100.0)),
            },
        };
        let bounds = focus.bounds().unwrap();
        assert_eq!(bounds.min, Pos2::new(0.0, 0.0));
        assert_eq!(bounds.max, Pos2::new(100.0, 100.0));
        assert!(focus.is_blur());
        assert!(!focus.is_spot_blur());
    }

    #[test]
    fn text_bounds_fall_back_to_character_heuristic() {
        let text = Annotation {
            id: 1,
            kind: AnnotationKind::Text {
                pos: Point::new(10.0, 50.0),
                content: "hello\nworld!".to_string(),
                color: [0, 0, 0, 255],
                font_px: 16.0,
            },
        };
        let bounds = text.bounds().unwrap();
        // Two lines, widest has six characters.
        assert!((bounds.width() - 6.0 * 16.0 * 0.6).abs() < 0.01);
        assert!((bounds.height() - 2.0 * 16.0 * 1.3).abs() < 0.01);
        assert!(bounds.min.y < 50.0);
    }

    #[test]
    fn text_bounds_follow_provided_font_metrics() {
        let text = Annotation {
            id: 1,
            kind: AnnotationKind::Text {
                pos: Point::new(10.0, 50.0),
                content: "wide\nw".to_string(),
                color: [0, 0, 0, 255],
                font_px: 16.0,
            },
        };
        // Fixed-advance fake metrics: 9 px per glyph, 20 px line height.
        let measure = |line: &str, _font_px: f32| Vec2::new(line.chars().count() as f32 * 9.0, 20.0);
        let bounds = text.bounds_with(Some(&measure)).unwrap();

        assert_eq!(bounds.width(), 4.0 * 9.0);
        assert_eq!(bounds.height(), 2.0 * 20.0);
        // Measured line height positions the box top, not the heuristic one.
        assert_eq!(bounds.min.y, 50.0 - 20.0 * 0.8);
        assert_eq!(bounds.min.x, 10.0);
    }

    #[test]
    fn spot_blur_bounds_padded_by_half_brush() {
        let spot = Annotation {
            id: 1,
            kind: AnnotationKind::SpotBlur {
                points: vec![Point::new(10.0, 10.0), Point::new(20.0, 10.0)],
                brush_radius: 8.0,
            },
        };
        let bounds = spot.bounds().unwrap();
        assert_eq!(bounds.min.x, 6.0);
        assert_eq!(bounds.max.x, 24.0);
    }
}
