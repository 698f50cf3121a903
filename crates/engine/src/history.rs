use std::collections::VecDeque;

use crate::config::HistoryConfig;

/// Debounced, bounded undo/redo over whole-document snapshots.
///
/// `baseline` is the document as of the last commit. Edits only schedule a
/// commit; once the quiet period has passed, the baseline is pushed onto
/// `past` and the current document becomes the new baseline, so one burst
/// of edits is one undo step. Undo and redo replace the document without
/// scheduling anything, so they never produce history entries themselves.
pub struct HistoryManager<T> {
    past: VecDeque<T>,
    future: VecDeque<T>,
    baseline: T,
    deadline: Option<u64>,
    max_undo: usize,
    max_redo: usize,
    debounce_ms: u64,
}

impl<T: Clone + PartialEq> HistoryManager<T> {
    pub fn new(initial: T, config: &HistoryConfig) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            baseline: initial,
            deadline: None,
            max_undo: config.max_undo,
            max_redo: config.max_redo,
            debounce_ms: config.debounce_ms,
        }
    }

    /// Schedules a commit `debounce_ms` from `now`, superseding any pending one.
    pub fn record_change(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.debounce_ms));
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Commits if the quiet period has elapsed. Returns whether an entry was pushed.
    pub fn poll(&mut self, now: u64, current: &T) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => self.commit(current),
            _ => false,
        }
    }

    /// Commits any pending change immediately.
    pub fn flush(&mut self, current: &T) -> bool {
        if self.deadline.is_some() {
            self.commit(current)
        } else {
            false
        }
    }

    fn commit(&mut self, current: &T) -> bool {
        self.deadline = None;
        if *current == self.baseline {
            return false;
        }
        let previous = std::mem::replace(&mut self.baseline, current.clone());
        push_capped(&mut self.past, previous, self.max_undo);
        self.future.clear();
        tracing::debug!(past = self.past.len(), "history commit");
        true
    }

    /// Returns the document to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: &T) -> Option<T> {
        self.flush(current);
        let previous = self.past.pop_back()?;
        push_capped(&mut self.future, current.clone(), self.max_redo);
        self.baseline = previous.clone();
        tracing::debug!(past = self.past.len(), future = self.future.len(), "undo");
        Some(previous)
    }

    pub fn redo(&mut self, current: &T) -> Option<T> {
        if self.deadline.is_some() {
            // A pending edit supersedes whatever was undone.
            self.flush(current);
            return None;
        }
        let next = self.future.pop_back()?;
        push_capped(&mut self.past, current.clone(), self.max_undo);
        self.baseline = next.clone();
        tracing::debug!(past = self.past.len(), future = self.future.len(), "redo");
        Some(next)
    }

    /// Drops both stacks and any pending commit; `baseline` becomes the new start.
    pub fn reset(&mut self, baseline: T) {
        self.past.clear();
        self.future.clear();
        self.deadline = None;
        self.baseline = baseline;
        tracing::debug!("history reset");
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty() || self.deadline.is_some()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty() && self.deadline.is_none()
    }
}

/// Pushes onto the newest end, dropping the oldest entry past `cap`.
fn push_capped<T>(stack: &mut VecDeque<T>, item: T, cap: usize) {
    stack.push_back(item);
    while stack.len() > cap {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(start: i32) -> HistoryManager<i32> {
        HistoryManager::new(start, &HistoryConfig::default())
    }

    #[test]
    fn burst_commits_once_after_quiet_period() {
        let mut h = history(0);
        h.record_change(0);
        h.record_change(300);
        h.record_change(600);
        assert!(!h.poll(900, &3));
        assert!(h.poll(1_000, &3));
        assert_eq!(h.undo_depth(), 1);
        assert!(!h.is_pending());
        assert_eq!(h.undo(&3), Some(0));
    }

    #[test]
    fn unchanged_burst_is_not_recorded() {
        let mut h = history(5);
        h.record_change(0);
        assert!(!h.flush(&5));
        assert_eq!(h.undo_depth(), 0);
    }

    #[test]
    fn undo_then_flush_adds_nothing() {
        let mut h = history(0);
        h.record_change(0);
        h.poll(400, &1);
        h.record_change(1_000);
        h.poll(1_400, &2);
        assert_eq!(h.undo(&2), Some(1));
        assert!(!h.flush(&1));
        assert!(!h.poll(10_000, &1));
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.redo_depth(), 1);
    }

    #[test]
    fn undo_flushes_pending_edit_first() {
        let mut h = history(0);
        h.record_change(0);
        assert!(h.can_undo());
        assert_eq!(h.undo(&7), Some(0));
        assert_eq!(h.redo(&0), Some(7));
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut h = history(0);
        h.record_change(0);
        h.flush(&1);
        h.undo(&1);
        assert!(h.can_redo());
        h.record_change(10);
        assert!(!h.can_redo());
        assert_eq!(h.redo(&4), None);
        assert_eq!(h.redo_depth(), 0);
        assert_eq!(h.undo_depth(), 1);
    }

    #[test]
    fn stacks_are_capped() {
        let config = HistoryConfig {
            max_undo: 3,
            max_redo: 2,
            debounce_ms: 10,
        };
        let mut h = HistoryManager::new(0, &config);
        for v in 1..=5 {
            h.record_change(0);
            h.flush(&v);
        }
        assert_eq!(h.undo_depth(), 3);
        let mut doc = 5;
        while let Some(prev) = h.undo(&doc) {
            doc = prev;
        }
        assert_eq!(doc, 2);
        assert_eq!(h.redo_depth(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut h = history(0);
        h.record_change(0);
        h.flush(&1);
        h.record_change(5);
        h.reset(9);
        assert_eq!((h.undo_depth(), h.redo_depth(), h.is_pending()), (0, 0, false));
        assert_eq!(h.undo(&9), None);
    }
}
