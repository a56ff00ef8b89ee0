use egui::Rect;
use tracing::debug;

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, BlurMode, MarkSize, Point, RectData, Tool,
};
use crate::render::annotation_visible;
use crate::store::AnnotationStore;

/// Minimum drawn extent per axis for rectangles, and minimum radius for
/// ellipses.
pub const MIN_SHAPE_EXTENT: f32 = 5.0;
/// Minimum arrow length.
pub const MIN_ARROW_LEN: f32 = 5.0;
/// Minimum text box size before an edit session starts.
pub const MIN_TEXT_BOX: (f32, f32) = (30.0, 20.0);
/// Minimum focus window extent per axis.
pub const MIN_FOCUS_EXTENT: f32 = 10.0;
/// Distance threshold for select-tool hit testing.
pub const HIT_THRESHOLD: f32 = 5.0;
/// Interval between spot-blur composite refreshes during a drag.
pub const SPOT_COMPOSITE_INTERVAL: f64 = 0.040;

/// Per-tool drawing options, persisted across sessions. Shape tools
/// (arrow, rectangle, ellipse) share the pen color and width.
#[derive(Clone, Copy, Debug)]
pub struct ToolOptions {
    pub pen_color: [u8; 4],
    pub pen_size: MarkSize,
    pub highlighter_color: [u8; 4],
    pub highlighter_size: MarkSize,
    pub text_color: [u8; 4],
    pub text_size: MarkSize,
    pub step_color: [u8; 4],
    pub step_size: MarkSize,
    pub blur_mode: BlurMode,
    pub blur_strength: f32,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            pen_color: [255, 0, 0, 255],
            pen_size: MarkSize::M,
            highlighter_color: [255, 235, 59, 255],
            highlighter_size: MarkSize::M,
            text_color: [255, 0, 0, 255],
            text_size: MarkSize::M,
            step_color: [255, 0, 0, 255],
            step_size: MarkSize::M,
            blur_mode: BlurMode::Spot,
            blur_strength: 5.0,
        }
    }
}

impl ToolOptions {
    pub fn step_radius(&self) -> f32 {
        self.step_size.font_px() * 0.8
    }

    pub fn spot_brush_radius(&self) -> f32 {
        self.pen_size.pen_px()
    }
}

#[derive(Clone, Debug)]
enum Gesture {
    /// Pen, highlighter, or spot blur; the live annotation sits on top of
    /// the store.
    Stroke { last: Point },
    /// Arrow, rectangle, ellipse, or focus window; nothing is in the store
    /// until commit.
    Shape {
        tool: Tool,
        focus: bool,
        start: Point,
        current: Point,
    },
    /// Text box drag; commit opens the edit sub-state.
    TextDrag { start: Point, current: Point },
    /// Select-tool translation of an existing annotation.
    MoveSelection {
        id: AnnotationId,
        original: Annotation,
        start: Point,
        current: Point,
    },
}

/// Pointer-gesture state machine for all tools.
///
/// `pointer_down` / `pointer_move` / `pointer_up` mirror the platform events
/// after coordinate mapping; `cancel` stands in for pointer-leave and acts as
/// pointer-up at the last known point. All points are in image space.
#[derive(Default)]
pub struct ToolController {
    gesture: Option<Gesture>,
    pub selection: Option<AnnotationId>,
    pub editing_text: Option<AnnotationId>,
    spot_last_tick: f64,
    spot_committed: usize,
}

impl ToolController {
    pub fn is_drawing(&self) -> bool {
        self.gesture.is_some()
    }

    /// Point count of the active spot stroke covered by the last composite
    /// tick. Points past this index get the cheap outline preview until the
    /// next tick.
    pub fn spot_committed_points(&self) -> usize {
        self.spot_committed
    }

    pub fn pointer_down(
        &mut self,
        store: &mut AnnotationStore,
        tool: Tool,
        options: &ToolOptions,
        point: Point,
        now: f64,
    ) {
        if let Some(id) = self.editing_text.take() {
            finish_text_annotation(store, id);
        }
        match tool {
            Tool::Pen => {
                let id = store.next_id();
                store.begin_live(Annotation {
                    id,
                    kind: AnnotationKind::Pen {
                        points: vec![point],
                        color: options.pen_color,
                        width: options.pen_size.pen_px(),
                    },
                });
                self.gesture = Some(Gesture::Stroke { last: point });
            }
            Tool::Highlighter => {
                let id = store.next_id();
                store.begin_live(Annotation {
                    id,
                    kind: AnnotationKind::Highlighter {
                        points: vec![point],
                        color: options.highlighter_color,
                        width: options.highlighter_size.highlighter_px(),
                    },
                });
                self.gesture = Some(Gesture::Stroke { last: point });
            }
            Tool::Blur => match options.blur_mode {
                BlurMode::Spot => {
                    let id = store.next_id();
                    store.begin_live(Annotation {
                        id,
                        kind: AnnotationKind::SpotBlur {
                            points: vec![point],
                            brush_radius: options.spot_brush_radius(),
                        },
                    });
                    self.spot_last_tick = now;
                    self.spot_committed = 1;
                    self.gesture = Some(Gesture::Stroke { last: point });
                }
                BlurMode::Focus => {
                    self.gesture = Some(Gesture::Shape {
                        tool,
                        focus: true,
                        start: point,
                        current: point,
                    });
                }
            },
            Tool::Arrow | Tool::Rectangle | Tool::Ellipse => {
                self.gesture = Some(Gesture::Shape {
                    tool,
                    focus: false,
                    start: point,
                    current: point,
                });
            }
            Tool::Text => {
                self.gesture = Some(Gesture::TextDrag {
                    start: point,
                    current: point,
                });
            }
            Tool::Step => {
                let number = store.next_step_number();
                let id = store.next_id();
                store.commit(Annotation {
                    id,
                    kind: AnnotationKind::Step {
                        center: point,
                        radius: options.step_radius(),
                        number,
                        color: options.step_color,
                        font_px: options.step_size.font_px(),
                    },
                });
            }
            Tool::Select => {
                let hit = store.top_hit(point, HIT_THRESHOLD, |annotation| {
                    annotation_visible(annotation, store.items())
                });
                match hit {
                    Some(id) => {
                        self.selection = Some(id);
                        if let Some(original) = store.get(id).cloned() {
                            self.gesture = Some(Gesture::MoveSelection {
                                id,
                                original,
                                start: point,
                                current: point,
                            });
                        }
                    }
                    None => self.selection = None,
                }
            }
        }
    }

    pub fn pointer_move(&mut self, store: &mut AnnotationStore, point: Point, now: f64) {
        match &mut self.gesture {
            Some(Gesture::Stroke { last }) => {
                *last = point;
                store.append_live_point(point);
                let is_spot = store
                    .live_mut()
                    .is_some_and(|annotation| annotation.is_spot_blur());
                if is_spot && now - self.spot_last_tick >= SPOT_COMPOSITE_INTERVAL {
                    self.spot_last_tick = now;
                    self.spot_committed = store.live_point_count();
                }
            }
            Some(Gesture::Shape { current, .. }) | Some(Gesture::TextDrag { current, .. }) => {
                *current = point;
            }
            Some(Gesture::MoveSelection {
                id,
                original,
                start,
                current,
            }) => {
                *current = point;
                let delta = start.delta(point);
                if let Some(annotation) = store.get_mut(*id) {
                    let mut moved = original.clone();
                    moved.translate_by(delta);
                    *annotation = moved;
                }
            }
            None => {}
        }
    }

    pub fn pointer_up(&mut self, store: &mut AnnotationStore, point: Point, options: &ToolOptions) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        match gesture {
            Gesture::Stroke { .. } => {
                self.spot_committed = store.live_point_count();
                if store.live_point_count() >= 2 {
                    store.finish_live();
                } else {
                    debug!("discarding single-point stroke");
                    store.abort_live();
                }
            }
            Gesture::Shape {
                tool,
                focus,
                start,
                ..
            } => {
                self.commit_shape(store, tool, focus, start, point, options);
            }
            Gesture::TextDrag { start, .. } => {
                let rect = RectData::from_points(start, point);
                if rect.width() > MIN_TEXT_BOX.0 && rect.height() > MIN_TEXT_BOX.1 {
                    let font_px = options.text_size.font_px();
                    let id = store.next_id();
                    store.begin_live(Annotation {
                        id,
                        kind: AnnotationKind::Text {
                            pos: Point::new(rect.min.x + 5.0, rect.min.y + font_px + 5.0),
                            content: String::new(),
                            color: options.text_color,
                            font_px,
                        },
                    });
                    self.selection = Some(id);
                    self.editing_text = Some(id);
                }
            }
            Gesture::MoveSelection { start, current, .. } => {
                let delta = start.delta(current);
                if delta.length_sq() > 0.0 {
                    store.finish_live();
                }
            }
        }
    }

    /// Drops an in-flight gesture without committing anything. Used when the
    /// store is about to be replaced under the gesture (undo, redo, clear);
    /// a stroke's live annotation is removed, a move is rolled back.
    pub fn abort_gesture(&mut self, store: &mut AnnotationStore) {
        match self.gesture.take() {
            Some(Gesture::Stroke { .. }) => {
                store.abort_live();
                self.spot_committed = 0;
            }
            Some(Gesture::MoveSelection { id, original, .. }) => {
                if let Some(annotation) = store.get_mut(id) {
                    *annotation = original;
                }
            }
            // Nothing reached the store yet.
            Some(Gesture::Shape { .. }) | Some(Gesture::TextDrag { .. }) | None => {}
        }
    }

    /// Pointer-leave while drawing; acts as pointer-up at the last known
    /// point so the machine never sticks in an active gesture.
    pub fn cancel(&mut self, store: &mut AnnotationStore, options: &ToolOptions) {
        let last = match &self.gesture {
            Some(Gesture::Stroke { last }) => *last,
            Some(Gesture::Shape { current, .. })
            | Some(Gesture::TextDrag { current, .. })
            | Some(Gesture::MoveSelection { current, .. }) => *current,
            None => return,
        };
        self.pointer_up(store, last, options);
    }

    fn commit_shape(
        &mut self,
        store: &mut AnnotationStore,
        tool: Tool,
        focus: bool,
        start: Point,
        end: Point,
        options: &ToolOptions,
    ) {
        if focus {
            let rect = RectData::from_points(start, end);
            if rect.width() > MIN_FOCUS_EXTENT && rect.height() > MIN_FOCUS_EXTENT {
                let id = store.next_id();
                store.commit(Annotation {
                    id,
                    kind: AnnotationKind::FocusRect { rect },
                });
            }
            return;
        }
        match tool {
            Tool::Arrow => {
                if start.delta(end).length() > MIN_ARROW_LEN {
                    let id = store.next_id();
                    store.commit(Annotation {
                        id,
                        kind: AnnotationKind::Arrow {
                            from: start,
                            to: end,
                            color: options.pen_color,
                            width: options.pen_size.pen_px(),
                        },
                    });
                }
            }
            Tool::Rectangle => {
                let rect = RectData::from_points(start, end);
                if rect.width() > MIN_SHAPE_EXTENT && rect.height() > MIN_SHAPE_EXTENT {
                    let id = store.next_id();
                    store.commit(Annotation {
                        id,
                        kind: AnnotationKind::Rectangle {
                            rect,
                            color: options.pen_color,
                            line_width: options.pen_size.pen_px(),
                        },
                    });
                }
            }
            Tool::Ellipse => {
                let center = Point::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
                let rx = (end.x - start.x).abs() / 2.0;
                let ry = (end.y - start.y).abs() / 2.0;
                if rx > MIN_SHAPE_EXTENT && ry > MIN_SHAPE_EXTENT {
                    let id = store.next_id();
                    store.commit(Annotation {
                        id,
                        kind: AnnotationKind::Ellipse {
                            center,
                            rx,
                            ry,
                            color: options.pen_color,
                            line_width: options.pen_size.pen_px(),
                        },
                    });
                }
            }
            _ => {}
        }
    }

    /// Transient shape for the renderer while an arrow/rectangle/ellipse
    /// drag is active. Id 0 is never allocated by the store.
    pub fn shape_preview(&self, options: &ToolOptions) -> Option<Annotation> {
        match &self.gesture {
            Some(Gesture::Shape {
                tool,
                focus: false,
                start,
                current,
            }) => {
                let kind = match tool {
                    Tool::Arrow => AnnotationKind::Arrow {
                        from: *start,
                        to: *current,
                        color: options.pen_color,
                        width: options.pen_size.pen_px(),
                    },
                    Tool::Rectangle => AnnotationKind::Rectangle {
                        rect: RectData::from_points(*start, *current),
                        color: options.pen_color,
                        line_width: options.pen_size.pen_px(),
                    },
                    Tool::Ellipse => AnnotationKind::Ellipse {
                        center: Point::new(
                            (start.x + current.x) / 2.0,
                            (start.y + current.y) / 2.0,
                        ),
                        rx: (current.x - start.x).abs() / 2.0,
                        ry: (current.y - start.y).abs() / 2.0,
                        color: options.pen_color,
                        line_width: options.pen_size.pen_px(),
                    },
                    _ => return None,
                };
                Some(Annotation { id: 0, kind })
            }
            _ => None,
        }
    }

    /// Dashed-outline rect for active text-box and focus-window drags.
    pub fn drag_rect_preview(&self) -> Option<Rect> {
        match &self.gesture {
            Some(Gesture::Shape {
                focus: true,
                start,
                current,
                ..
            })
            | Some(Gesture::TextDrag { start, current }) => {
                Some(RectData::from_points(*start, *current).to_rect())
            }
            _ => None,
        }
    }

    pub fn text_insert(&mut self, store: &mut AnnotationStore, input: &str) {
        let Some(id) = self.editing_text else {
            return;
        };
        if let Some(Annotation {
            kind: AnnotationKind::Text { content, .. },
            ..
        }) = store.get_mut(id)
        {
            content.push_str(input);
        }
    }

    pub fn text_backspace(&mut self, store: &mut AnnotationStore) {
        let Some(id) = self.editing_text else {
            return;
        };
        if let Some(Annotation {
            kind: AnnotationKind::Text { content, .. },
            ..
        }) = store.get_mut(id)
        {
            content.pop();
        }
    }

    /// Enter or Escape. Empty text boxes vanish without a history entry.
    pub fn finish_text_edit(&mut self, store: &mut AnnotationStore) {
        if let Some(id) = self.editing_text.take() {
            if !finish_text_annotation(store, id) {
                self.selection = None;
            }
        }
    }
}

/// Commits or discards a text annotation when its edit session ends.
/// Returns false when the annotation was discarded.
fn finish_text_annotation(store: &mut AnnotationStore, id: AnnotationId) -> bool {
    let empty = matches!(
        store.get(id),
        Some(Annotation {
            kind: AnnotationKind::Text { content, .. },
            ..
        }) if content.is_empty()
    );
    if empty {
        // Live text sits on top of the store.
        store.abort_live();
        false
    } else {
        store.finish_live();
        true
    }
}
