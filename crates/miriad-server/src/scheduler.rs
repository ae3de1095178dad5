//! Single-turn-at-a-time scheduling with an out-of-turn queue.
//!
//! States: `idle` (no turn), `running` (one turn in progress), `draining`
//! (between turns, processing the queue). Invariants: at most one turn runs
//! at a time; the queue is strictly FIFO; queue processing never re-enters
//! itself through event callbacks.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Running,
    Draining,
}

impl ScheduleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
        }
    }
}

/// A user message waiting for (or starting) a turn.
#[derive(Clone, Debug)]
pub struct QueuedTurn {
    pub prompt: String,
    pub session_id: Option<String>,
}

/// Outcome of submitting a user message.
pub enum Submission {
    /// The scheduler was idle; the caller must run this turn and call
    /// [`TurnScheduler::finish_turn`] when it ends.
    Started {
        turn: QueuedTurn,
        cancel: CancellationToken,
    },
    /// A turn is running; the message was enqueued (1-based position).
    Queued { position: usize },
}

struct Inner {
    state: ScheduleState,
    queue: Vec<QueuedTurn>,
    current_cancel: Option<CancellationToken>,
}

pub struct TurnScheduler {
    inner: Mutex<Inner>,
    /// Guard against re-entrant queue processing from event callbacks.
    processing: AtomicBool,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ScheduleState::Idle,
                queue: Vec::new(),
                current_cancel: None,
            }),
            processing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.inner.lock().state
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Submit a user message: start a turn when idle, enqueue otherwise.
    pub fn submit(&self, turn: QueuedTurn) -> Submission {
        let mut inner = self.inner.lock();
        match inner.state {
            ScheduleState::Idle => {
                let cancel = CancellationToken::new();
                inner.state = ScheduleState::Running;
                inner.current_cancel = Some(cancel.clone());
                Submission::Started { turn, cancel }
            }
            ScheduleState::Running | ScheduleState::Draining => {
                inner.queue.push(turn);
                Submission::Queued {
                    position: inner.queue.len(),
                }
            }
        }
    }

    /// Atomically drain all queued messages for mid-turn injection.
    /// Returns the prompts joined by blank lines plus the drained count.
    pub fn take_injection(&self) -> Option<(String, usize)> {
        let mut inner = self.inner.lock();
        if inner.queue.is_empty() {
            return None;
        }
        let drained: Vec<QueuedTurn> = inner.queue.drain(..).collect();
        let count = drained.len();
        let joined = drained
            .iter()
            .map(|t| t.prompt.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Some((joined, count))
    }

    /// Cancel the current turn only. Returns false when no turn is running.
    pub fn interrupt(&self) -> bool {
        let inner = self.inner.lock();
        match (&inner.state, &inner.current_cancel) {
            (ScheduleState::Running, Some(cancel)) => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Mark the running turn done: drain to the next queued turn or go
    /// idle. Returns the next turn to run, if any.
    pub fn finish_turn(&self) -> Option<(QueuedTurn, CancellationToken)> {
        if self.processing.swap(true, Ordering::SeqCst) {
            // Re-entered from an event callback; the outer call owns the
            // drain.
            return None;
        }

        let next = {
            let mut inner = self.inner.lock();
            inner.current_cancel = None;
            inner.state = ScheduleState::Draining;
            if inner.queue.is_empty() {
                inner.state = ScheduleState::Idle;
                None
            } else {
                let turn = inner.queue.remove(0);
                let cancel = CancellationToken::new();
                inner.state = ScheduleState::Running;
                inner.current_cancel = Some(cancel.clone());
                Some((turn, cancel))
            }
        };

        self.processing.store(false, Ordering::SeqCst);
        next
    }
}

impl Default for TurnScheduler {
    fn default() -> Self {
        Self::new()
    }
}
