//! One-shot tasks on the millisecond timeline.
//!
//! A [`Schedule`] holds payloads with due times. The owner polls it once per
//! tick with [`Schedule::drain_due`]; tasks come back in due-time order, ties
//! broken by scheduling order, so a replayed step sequence fires identically.

#[derive(Debug, Clone)]
struct Task<T> {
    /// Scheduling order; breaks due-time ties.
    seq: u64,
    due_ms: u64,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct Schedule<T> {
    tasks: Vec<Task<T>>,
    next_seq: u64,
}

impl<T> Schedule<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
        }
    }

    /// Queue `payload` to fire `delay_ms` after `now_ms`.
    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(Task {
            seq,
            due_ms: now_ms.saturating_add(delay_ms),
            payload,
        });
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        cancelled
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove and return every task due at or before `now_ms`.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<T> {
        if !self.tasks.iter().any(|task| task.due_ms <= now_ms) {
            return Vec::new();
        }
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.due_ms <= now_ms);
        self.tasks = waiting;
        due.sort_by_key(|task| (task.due_ms, task.seq));
        due.into_iter().map(|task| task.payload).collect()
    }
}

impl<T> Default for Schedule<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_only_due_tasks() {
        let mut schedule = Schedule::new();
        schedule.schedule(0, 100, "a");
        schedule.schedule(0, 300, "b");
        assert!(schedule.drain_due(99).is_empty());
        assert_eq!(schedule.drain_due(100), vec!["a"]);
        assert_eq!(schedule.pending(), 1);
        assert_eq!(schedule.drain_due(1_000), vec!["b"]);
        assert!(schedule.is_empty());
    }

    #[test]
    fn drain_orders_by_due_time_then_insertion() {
        let mut schedule = Schedule::new();
        schedule.schedule(0, 400, "late");
        schedule.schedule(0, 100, "first");
        schedule.schedule(50, 50, "second");
        assert_eq!(schedule.drain_due(500), vec!["first", "second", "late"]);
    }

    #[test]
    fn cancel_all_clears_queue() {
        let mut schedule = Schedule::new();
        schedule.schedule(0, 10, ());
        schedule.schedule(0, 20, ());
        assert_eq!(schedule.cancel_all(), 2);
        assert!(schedule.drain_due(u64::MAX).is_empty());
    }

    #[test]
    fn huge_delay_saturates() {
        let mut schedule = Schedule::new();
        schedule.schedule(u64::MAX - 1, 10, "x");
        assert_eq!(schedule.drain_due(u64::MAX), vec!["x"]);
    }
}
