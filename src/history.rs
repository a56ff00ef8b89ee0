/// Snapshot stack with a cursor. Each entry is a full deep copy of the
/// tracked state; the cursor points at the entry matching the live state.
/// The stack never grows past `MAX_DEPTH` entries above the baseline; pushing
/// beyond that discards the oldest snapshot.
#[derive(Clone, Debug)]
pub struct UndoHistory<T: Clone> {
    stack: Vec<T>,
    cursor: usize,
}

impl<T: Clone> UndoHistory<T> {
    pub const MAX_DEPTH: usize = 50;

    pub fn new(initial: T) -> Self {
        Self {
            stack: vec![initial],
            cursor: 0,
        }
    }

    pub fn push_snapshot(&mut self, value: T) {
        if self.cursor + 1 < self.stack.len() {
            self.stack.truncate(self.cursor + 1);
        }
        self.stack.push(value);
        if self.stack.len() > Self::MAX_DEPTH + 1 {
            self.stack.remove(0);
        }
        self.cursor = self.stack.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.stack.len()
    }

    /// Number of undo steps currently available.
    pub fn depth(&self) -> usize {
        self.cursor
    }

    /// Steps back one snapshot. At the bottom of the stack this is a no-op
    /// returning `None`, never an error.
    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn clear_with(&mut self, value: T) {
        self.stack.clear();
        self.stack.push(value);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::UndoHistory;

    #[test]
    fn undo_redo_flow() {
        let mut history = UndoHistory::new(vec![1]);
        history.push_snapshot(vec![1, 2]);
        history.push_snapshot(vec![1, 2, 3]);
        assert_eq!(history.depth(), 2);

        assert_eq!(history.undo(), Some(vec![1, 2]));
        assert_eq!(history.undo(), Some(vec![1]));
        assert_eq!(history.undo(), None);

        assert_eq!(history.redo(), Some(vec![1, 2]));
        history.push_snapshot(vec![9]);
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn capped_at_max_depth_drops_oldest() {
        let mut history = UndoHistory::new(0usize);
        for i in 1..=(UndoHistory::<usize>::MAX_DEPTH + 10) {
            history.push_snapshot(i);
        }
        assert_eq!(history.depth(), UndoHistory::<usize>::MAX_DEPTH);

        let mut undone = 0;
        while let Some(_) = history.undo() {
            undone += 1;
        }
        assert_eq!(undone, UndoHistory::<usize>::MAX_DEPTH);
        // Oldest entries fell off; the bottom is no longer the initial state.
        assert_eq!(history.redo(), Some(11));
    }

    #[test]
    fn undo_at_bottom_is_a_noop() {
        let mut history = UndoHistory::new(vec!["a"]);
        assert_eq!(history.undo(), None);
        assert_eq!(history.undo(), None);
        assert!(!history.can_undo());
    }
}
