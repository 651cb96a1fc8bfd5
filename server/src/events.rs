//! Per-caster event queue.
//!
//! Every caster owns exactly one queue, processed on the single world-logic
//! thread. A queued spell event fires when its deadline passes and then
//! either re-enqueues itself with the next wake delay or drops off when the
//! spell reports finished. Within one tick a caster's events run in FIFO
//! scheduling order, and a given spell is advanced at most once per tick;
//! across casters there is no ordering guarantee beyond tick granularity.

use crate::spell::SpellInstanceId;
use crate::world::Ms;

/// One pending advance of an in-flight spell.
#[derive(Debug, Clone, Copy)]
pub struct QueuedSpell {
    pub spell: SpellInstanceId,
    pub run_at: Ms,
    seq: u64,
}

/// FIFO-within-tick deadline queue of spell events.
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: Vec<QueuedSpell>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spell: SpellInstanceId, run_at: Ms) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueuedSpell {
            spell,
            run_at,
            seq,
        });
    }

    /// Remove and return every event due at `now`, in scheduling order.
    /// Events pushed while the caller processes the returned batch wait for
    /// the next tick, which is what bounds a spell to one advance per tick.
    pub fn take_due(&mut self, now: Ms) -> Vec<QueuedSpell> {
        let mut due: Vec<QueuedSpell> = Vec::new();
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].run_at <= now {
                due.push(self.queue.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|e| e.seq);
        due
    }

    /// Drop every pending event for one spell.
    pub fn remove(&mut self, spell: SpellInstanceId) {
        self.queue.retain(|e| e.spell != spell);
    }

    /// Every spell with a pending event, for teardown.
    pub fn spells(&self) -> Vec<SpellInstanceId> {
        self.queue.iter().map(|e| e.spell).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> SpellInstanceId {
        SpellInstanceId(n)
    }

    #[test]
    fn test_take_due_is_fifo() {
        let mut q = EventQueue::new();
        q.push(id(1), 100);
        q.push(id(2), 50);
        q.push(id(3), 100);

        let due = q.take_due(100);
        let order: Vec<u64> = due.iter().map(|e| e.spell.0).collect();
        // scheduling order, not deadline order
        assert_eq!(order, vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_take_due_leaves_future_events() {
        let mut q = EventQueue::new();
        q.push(id(1), 100);
        q.push(id(2), 200);

        let due = q.take_due(150);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].spell, id(1));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut q = EventQueue::new();
        q.push(id(1), 100);
        q.push(id(1), 200);
        q.push(id(2), 100);
        q.remove(id(1));
        assert_eq!(q.spells(), vec![id(2)]);
    }
}
