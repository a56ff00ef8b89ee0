use tracing::debug;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, Point};
use crate::history::UndoHistory;

/// Ordered annotation collection plus its undo history.
///
/// Ordering is render order: later entries draw on top of earlier ones (blur
/// annotations are re-ordered at render time, not here). Exactly one history
/// snapshot is recorded per completed user gesture; in-progress drags mutate
/// the live list without touching history.
pub struct AnnotationStore {
    items: Vec<Annotation>,
    history: UndoHistory<Vec<Annotation>>,
    next_id: AnnotationId,
    next_step: u32,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            history: UndoHistory::new(Vec::new()),
            next_id: 1,
            next_step: 1,
        }
    }
}

impl AnnotationStore {
    pub fn items(&self) -> &[Annotation] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.iter().find(|annotation| annotation.id == id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.items.iter_mut().find(|annotation| annotation.id == id)
    }

    /// Ids are unique for the lifetime of the store and never reused, even
    /// after deletion or undo.
    pub fn next_id(&mut self) -> AnnotationId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Step numbers increment across the whole session and reset only on
    /// `clear` or `reset`.
    pub fn next_step_number(&mut self) -> u32 {
        let number = self.next_step;
        self.next_step = self.next_step.saturating_add(1);
        number
    }

    pub fn peek_step_number(&self) -> u32 {
        self.next_step
    }

    /// Appends a finished annotation and records one snapshot.
    pub fn commit(&mut self, annotation: Annotation) {
        debug!(id = annotation.id, "commit annotation");
        self.items.push(annotation);
        self.snapshot();
    }

    /// Appends an in-progress annotation without a snapshot. The gesture
    /// mutates it via `live_mut` and ends with `finish_live` or `abort_live`.
    pub fn begin_live(&mut self, annotation: Annotation) {
        self.items.push(annotation);
    }

    pub fn live_mut(&mut self) -> Option<&mut Annotation> {
        self.items.last_mut()
    }

    pub fn live_point_count(&self) -> usize {
        match self.items.last().map(|annotation| &annotation.kind) {
            Some(AnnotationKind::Pen { points, .. })
            | Some(AnnotationKind::Highlighter { points, .. })
            | Some(AnnotationKind::SpotBlur { points, .. }) => points.len(),
            _ => 0,
        }
    }

    pub fn append_live_point(&mut self, point: Point) {
        if let Some(annotation) = self.items.last_mut() {
            match &mut annotation.kind {
                AnnotationKind::Pen { points, .. }
                | AnnotationKind::Highlighter { points, .. }
                | AnnotationKind::SpotBlur { points, .. } => points.push(point),
                _ => {}
            }
        }
    }

    /// Ends the live gesture with one snapshot.
    pub fn finish_live(&mut self) {
        self.snapshot();
    }

    /// Discards the live annotation without recording anything.
    pub fn abort_live(&mut self) {
        self.items.pop();
    }

    /// Swaps in a whole new list and records one snapshot. Used when a drag
    /// translation completes.
    pub fn replace_all(&mut self, items: Vec<Annotation>) {
        self.items = items;
        self.snapshot();
    }

    pub fn remove(&mut self, id: AnnotationId) {
        let before = self.items.len();
        self.items.retain(|annotation| annotation.id != id);
        if self.items.len() != before {
            self.snapshot();
        }
    }

    /// Removes everything and resets the step counter to 1.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.next_step = 1;
        self.snapshot();
    }

    /// Drops annotations, history, and counters; used when a new image is
    /// loaded.
    pub fn reset(&mut self) {
        self.items.clear();
        self.history.clear_with(Vec::new());
        self.next_step = 1;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_depth(&self) -> usize {
        self.history.depth()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.items = snapshot;
                self.resync_step_counter();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.items = snapshot;
                self.resync_step_counter();
                true
            }
            None => false,
        }
    }

    /// Topmost annotation hit by `point`, searching in reverse render order.
    /// `filter` lets the caller exclude annotations hidden by focus windows.
    pub fn top_hit(
        &self,
        point: Point,
        threshold: f32,
        filter: impl Fn(&Annotation) -> bool,
    ) -> Option<AnnotationId> {
        self.items
            .iter()
            .rev()
            .find(|annotation| filter(annotation) && annotation.contains(point, threshold))
            .map(|annotation| annotation.id)
    }

    fn snapshot(&mut self) {
        self.history.push_snapshot(self.items.clone());
    }

    /// After undo/redo the step counter follows the restored annotations so
    /// the next step marker continues the visible sequence.
    fn resync_step_counter(&mut self) {
        let max_number = self
            .items
            .iter()
            .filter_map(|annotation| match &annotation.kind {
                AnnotationKind::Step { number, .. } => Some(*number),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.next_step = max_number.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, Point, RectData};

    fn pen_annotation(store: &mut AnnotationStore, y0: f32, y1: f32) -> Annotation {
        Annotation {
            id: store.next_id(),
            kind: AnnotationKind::Pen {
                points: vec![Point::new(10.0, y0), Point::new(10.0, y1)],
                color: [255, 0, 0, 255],
                width: 5.0,
            },
        }
    }

    #[test]
    fn commit_records_one_snapshot() {
        let mut store = AnnotationStore::default();
        let pen = pen_annotation(&mut store, 10.0, 60.0);
        store.commit(pen);
        assert_eq!(store.len(), 1);
        assert_eq!(store.history_depth(), 1);
    }

    #[test]
    fn live_gesture_snapshots_only_on_finish() {
        let mut store = AnnotationStore::default();
        let pen = pen_annotation(&mut store, 10.0, 10.0);
        store.begin_live(pen);
        for y in 11..=60 {
            store.append_live_point(Point::new(10.0, y as f32));
        }
        assert_eq!(store.history_depth(), 0);
        store.finish_live();
        assert_eq!(store.history_depth(), 1);
        assert_eq!(store.live_point_count(), 51);
    }

    #[test]
    fn aborted_gesture_leaves_no_trace() {
        let mut store = AnnotationStore::default();
        let pen = pen_annotation(&mut store, 10.0, 10.0);
        store.begin_live(pen);
        store.abort_live();
        assert!(store.is_empty());
        assert_eq!(store.history_depth(), 0);
        // The id is spent regardless.
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn undo_is_lifo_back_to_empty() {
        let mut store = AnnotationStore::default();
        for i in 0..3 {
            let pen = pen_annotation(&mut store, i as f32, i as f32 + 10.0);
            store.commit(pen);
        }
        assert_eq!(store.history_depth(), 3);

        assert!(store.undo());
        assert_eq!(store.len(), 2);
        assert!(store.undo());
        assert!(store.undo());
        assert!(store.is_empty());
        assert!(!store.undo());
    }

    #[test]
    fn step_numbers_increment_and_clear_resets() {
        let mut store = AnnotationStore::default();
        let mut numbers = Vec::new();
        for i in 0..3 {
            let number = store.next_step_number();
            numbers.push(number);
            let id = store.next_id();
            store.commit(Annotation {
                id,
                kind: AnnotationKind::Step {
                    center: Point::new(10.0 * i as f32, 10.0),
                    radius: 12.8,
                    number,
                    color: [255, 0, 0, 255],
                    font_px: 16.0,
                },
            });
        }
        assert_eq!(numbers, vec![1, 2, 3]);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.peek_step_number(), 1);
    }

    #[test]
    fn undo_restores_step_sequence() {
        let mut store = AnnotationStore::default();
        for i in 0..2 {
            let number = store.next_step_number();
            let id = store.next_id();
            store.commit(Annotation {
                id,
                kind: AnnotationKind::Step {
                    center: Point::new(10.0 * i as f32, 10.0),
                    radius: 12.8,
                    number,
                    color: [255, 0, 0, 255],
                    font_px: 16.0,
                },
            });
        }
        assert!(store.undo());
        assert_eq!(store.peek_step_number(), 2);
    }

    #[test]
    fn top_hit_prefers_later_annotations() {
        let mut store = AnnotationStore::default();
        for _ in 0..2 {
            let id = store.next_id();
            store.commit(Annotation {
                id,
                kind: AnnotationKind::Rectangle {
                    rect: RectData::from_points(Point::new(0.0, 0.0), Point::new(50.0, 50.0)),
                    color: [0, 0, 0, 255],
                    line_width: 2.0,
                },
            });
        }
        let hit = store.top_hit(Point::new(25.0, 25.0), 5.0, |_| true);
        assert_eq!(hit, Some(2));
        assert_eq!(store.top_hit(Point::new(200.0, 200.0), 5.0, |_| true), None);
    }

    #[test]
    fn remove_missing_id_records_nothing() {
        let mut store = AnnotationStore::default();
        store.remove(42);
        assert_eq!(store.history_depth(), 0);
    }
}
