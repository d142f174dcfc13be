//! Priority-ordered queue of pending mutations.

use crate::mutation::QueuedMutation;
use uuid::Uuid;

/// An ordered backlog of mutations not yet confirmed against the remote
/// system.
///
/// Entries are kept sorted by priority class (critical first) and FIFO
/// within a class. The queue itself is a plain data structure; callers
/// serialize access and persist its contents.
///
/// # Invariants
///
/// - Insertion preserves priority-then-FIFO order
/// - `snapshot` is a read view; removal happens per entry as the
///   orchestrator confirms success or permanent failure
/// - `retry_count` only increases
#[derive(Debug, Default)]
pub struct MutationQueue {
    entries: Vec<QueuedMutation>,
}

impl MutationQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mutation, maintaining priority-then-FIFO order.
    pub fn push(&mut self, mutation: QueuedMutation) {
        // First index whose priority is strictly lower than the new entry:
        // appends within the entry's own class.
        let pos = self
            .entries
            .partition_point(|e| e.priority >= mutation.priority);
        self.entries.insert(pos, mutation);
    }

    /// Returns an ordered copy of all entries for a sync pass.
    pub fn snapshot(&self) -> Vec<QueuedMutation> {
        self.entries.clone()
    }

    /// Returns the entries in drain order.
    pub fn entries(&self) -> &[QueuedMutation] {
        &self.entries
    }

    /// Removes the entry with the given ID.
    pub fn remove(&mut self, id: Uuid) -> Option<QueuedMutation> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Increments the retry count of the entry with the given ID.
    ///
    /// Returns the new count, or `None` if the entry is no longer queued.
    pub fn record_failure(&mut self, id: Uuid) -> Option<u32> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.retry_count += 1;
        Some(entry.retry_count)
    }

    /// Replaces all entries, re-establishing drain order.
    ///
    /// Used by snapshot import. The relative order of entries within a
    /// priority class is preserved.
    pub fn replace_all(&mut self, entries: Vec<QueuedMutation>) {
        self.entries = entries;
        self.entries
            .sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Returns the number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;
    use proptest::prelude::*;

    fn make(priority: Priority, id_byte: u8) -> QueuedMutation {
        QueuedMutation::update(
            "tasks",
            format!("t{id_byte}"),
            vec![id_byte],
            priority,
            u64::from(id_byte),
        )
    }

    #[test]
    fn critical_drains_first() {
        let mut queue = MutationQueue::new();
        queue.push(make(Priority::Low, 1));
        queue.push(make(Priority::Critical, 2));
        queue.push(make(Priority::Medium, 3));
        queue.push(make(Priority::High, 4));

        let order: Vec<Priority> = queue.snapshot().iter().map(|e| e.priority).collect();
        assert_eq!(
            order,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Medium,
                Priority::Low
            ]
        );
    }

    #[test]
    fn fifo_within_class() {
        let mut queue = MutationQueue::new();
        queue.push(make(Priority::Medium, 1));
        queue.push(make(Priority::High, 2));
        queue.push(make(Priority::Medium, 3));
        queue.push(make(Priority::Medium, 4));

        let ids: Vec<String> = queue
            .snapshot()
            .iter()
            .map(|e| e.entity_id.clone())
            .collect();
        assert_eq!(ids, vec!["t2", "t1", "t3", "t4"]);
    }

    #[test]
    fn remove_by_id() {
        let mut queue = MutationQueue::new();
        let m = make(Priority::Medium, 1);
        let id = m.id;
        queue.push(m);
        queue.push(make(Priority::Medium, 2));

        let removed = queue.remove(id).unwrap();
        assert_eq!(removed.entity_id, "t1");
        assert_eq!(queue.len(), 1);
        assert!(queue.remove(id).is_none());
    }

    #[test]
    fn record_failure_increments() {
        let mut queue = MutationQueue::new();
        let m = make(Priority::Medium, 1);
        let id = m.id;
        queue.push(m);

        assert_eq!(queue.record_failure(id), Some(1));
        assert_eq!(queue.record_failure(id), Some(2));
        assert_eq!(queue.record_failure(Uuid::new_v4()), None);
    }

    #[test]
    fn replace_all_restores_order() {
        let mut queue = MutationQueue::new();
        queue.replace_all(vec![
            make(Priority::Low, 1),
            make(Priority::Critical, 2),
            make(Priority::Low, 3),
        ]);

        let order: Vec<Priority> = queue.snapshot().iter().map(|e| e.priority).collect();
        assert_eq!(
            order,
            vec![Priority::Critical, Priority::Low, Priority::Low]
        );
        // FIFO preserved within the low class
        assert_eq!(queue.entries()[1].entity_id, "t1");
        assert_eq!(queue.entries()[2].entity_id, "t3");
    }

    fn priority_strategy() -> impl Strategy<Value = Priority> {
        prop::sample::select(Priority::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn drain_order_is_priority_then_fifo(
            priorities in prop::collection::vec(priority_strategy(), 0..64)
        ) {
            let mut queue = MutationQueue::new();
            let mutations: Vec<QueuedMutation> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| make(*p, i as u8))
                .collect();
            for m in mutations.clone() {
                queue.push(m);
            }

            // A stable sort of the insertion order by descending priority
            // gives the expected drain order.
            let mut expected = mutations;
            expected.sort_by(|a, b| b.priority.cmp(&a.priority));

            let drained: Vec<Uuid> = queue.snapshot().iter().map(|e| e.id).collect();
            let expected_ids: Vec<Uuid> = expected.iter().map(|e| e.id).collect();
            prop_assert_eq!(drained, expected_ids);
        }
    }
}
