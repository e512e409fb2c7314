//! Per-actor scheduled effects.
//!
//! At most one record is live per `(actor, kind)`. Scheduling again replaces
//! the earlier record, and cancelling drops it. Superseded entries stay in the
//! heap and are skipped when they surface.

use shared::ActorId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    Unfreeze,
    InvisibilityEnd,
    MeditationTick,
    StaminaRest,
    Revive,
    NpcRespawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Scheduled {
    pub due_ms: u64,
    seq: u64,
    pub actor: ActorId,
    pub kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    live: HashMap<(ActorId, TimerKind), (u64, u64)>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, actor: ActorId, kind: TimerKind, due_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert((actor, kind), (seq, due_ms));
        self.heap.push(Reverse(Scheduled {
            due_ms,
            seq,
            actor,
            kind,
        }));
    }

    /// Schedules only when nothing of this kind is pending for the actor.
    pub fn ensure(&mut self, actor: ActorId, kind: TimerKind, due_ms: u64) {
        if !self.is_scheduled(actor, kind) {
            self.schedule(actor, kind, due_ms);
        }
    }

    pub fn cancel(&mut self, actor: ActorId, kind: TimerKind) -> bool {
        self.live.remove(&(actor, kind)).is_some()
    }

    pub fn cancel_all(&mut self, actor: ActorId) {
        self.live.retain(|(owner, _), _| *owner != actor);
    }

    pub fn is_scheduled(&self, actor: ActorId, kind: TimerKind) -> bool {
        self.live.contains_key(&(actor, kind))
    }

    pub fn due_at(&self, actor: ActorId, kind: TimerKind) -> Option<u64> {
        self.live.get(&(actor, kind)).map(|(_, due)| *due)
    }

    /// Earliest live due time.
    pub fn next_due(&mut self) -> Option<u64> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(entry)| entry.due_ms)
    }

    /// Removes and returns the earliest live record due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Scheduled> {
        self.discard_stale();
        let Reverse(head) = self.heap.peek()?;
        if head.due_ms > now_ms {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&(entry.actor, entry.kind));
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            let current = self.live.get(&(head.actor, head.kind));
            if current.map(|(seq, _)| *seq) == Some(head.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
