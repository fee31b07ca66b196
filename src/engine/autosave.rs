use std::time::{Duration, Instant};

/// Time source behind the debounce, injectable so tests can drive it
/// without sleeping.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Idle,
    /// Debounce armed, waiting for the quiet period.
    Pending,
    Saving,
    Error,
}

/// Trailing-edge debounce over document mutations. Rapid edits within
/// the interval coalesce into one save carrying the final snapshot; a
/// failed save re-arms on the next mutation rather than retrying.
pub struct Autosave<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    enabled: bool,
    phase: SavePhase,
    deadline: Option<Instant>,
    generation: u64,
    saved_generation: u64,
    pub last_saved_at: Option<Instant>,
    pub last_error: Option<String>,
}

impl Autosave<SystemClock> {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self::with_clock(interval, enabled, SystemClock)
    }
}

impl<C: Clock> Autosave<C> {
    pub fn with_clock(interval: Duration, enabled: bool, clock: C) -> Self {
        Self {
            clock,
            interval,
            enabled,
            phase: SavePhase::Idle,
            deadline: None,
            generation: 0,
            saved_generation: 0,
            last_saved_at: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> SavePhase {
        self.phase
    }

    pub fn is_saving(&self) -> bool {
        self.phase == SavePhase::Saving
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.generation != self.saved_generation
    }

    /// A document mutation occurred: re-arm the debounce window.
    pub fn note_mutation(&mut self) {
        self.generation += 1;
        if !self.enabled {
            return;
        }
        self.deadline = Some(self.clock.now() + self.interval);
        if self.phase != SavePhase::Saving {
            self.phase = SavePhase::Pending;
        }
    }

    /// Poll from the tick loop: true exactly when the quiet period has
    /// elapsed and a save should start now.
    pub fn take_due(&mut self) -> bool {
        if self.phase != SavePhase::Pending {
            return false;
        }
        match self.deadline {
            Some(dl) if self.clock.now() >= dl => {
                self.begin_save();
                true
            }
            _ => false,
        }
    }

    /// Manual trigger (save shortcut): bypasses the debounce, no-op when
    /// there is nothing to save or a save is already in flight.
    pub fn force(&mut self) -> bool {
        if self.has_unsaved_changes() && self.phase != SavePhase::Saving {
            self.begin_save();
            true
        } else {
            false
        }
    }

    fn begin_save(&mut self) {
        self.phase = SavePhase::Saving;
        self.deadline = None;
        self.saved_generation = self.generation;
    }

    /// Outcome of the persistence callback. Mutations that landed while
    /// the save was in flight keep the document marked unsaved.
    pub fn complete(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.last_saved_at = Some(self.clock.now());
                self.last_error = None;
                self.phase = if self.deadline.is_some() {
                    SavePhase::Pending
                } else {
                    SavePhase::Idle
                };
            }
            Err(e) => {
                // Roll the marker back so the snapshot still counts as dirty.
                self.saved_generation = self.saved_generation.wrapping_sub(1);
                self.last_error = Some(e);
                self.phase = SavePhase::Error;
            }
        }
    }

    /// A different record was loaded into the form: cancel any pending
    /// debounce so a stale snapshot is never persisted against it.
    pub fn reset(&mut self) {
        self.phase = SavePhase::Idle;
        self.deadline = None;
        self.generation = 0;
        self.saved_generation = 0;
        self.last_saved_at = None;
        self.last_error = None;
    }
}
