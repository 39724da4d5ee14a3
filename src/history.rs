//! Event history with usage accounting.
//!
//! The history is the shared matching state: an ordered, append-only record
//! of button events, each carrying a `used` counter that tracks how many rule
//! matches the entry has participated in. Rules themselves are stateless;
//! everything non-local about pattern matching (a press staying "live" across
//! several matches, `max_use` caps gating later matches) lives here.
//!
//! Entries leave the history in two ways: a release-pop when a consumed `Up`
//! closes its press/release cycle, and trimming once the history outgrows its
//! soft cap. Trimming never touches an entry whose button is still held; that
//! `Down` must stay live to anchor future combination matches.

use crate::event::{Action, Button, ButtonEvent};
use crate::state::PedalState;
use std::fmt;

/// One recorded event plus its usage count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The recorded event. Never re-timestamped.
    pub event: ButtonEvent,
    /// How many rule matches have consumed this entry. Monotonically
    /// non-decreasing for the lifetime of the entry.
    pub used: u32,
}

impl HistoryEntry {
    fn new(event: ButtonEvent) -> Self {
        Self { event, used: 0 }
    }
}

impl fmt::Display for HistoryEntry {
    /// Format: `B1 pressed (used:0)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (used:{})", self.event, self.used)
    }
}

/// Ordered record of recent button events.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the history empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a new entry with `used = 0`.
    pub fn append(&mut self, event: ButtonEvent) {
        self.entries.push(HistoryEntry::new(event));
    }

    /// Read-only view of the entries, oldest first.
    pub fn snapshot(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Increment `used` on each of the given entries.
    pub fn mark_used(&mut self, indices: &[usize]) {
        for &i in indices {
            self.entries[i].used += 1;
        }
    }

    /// Close a press/release cycle after an `Up` of `button` has been
    /// consumed: pop the `Up` from the tail, and its paired `Down` too when
    /// no other button's events sit between them. A `Down` separated from
    /// its `Up` by other buttons' events stays live and is trimmed later.
    /// Only the two entries of the closing cycle are removed; entries for
    /// earlier cycles of the same button are left alone.
    pub fn release_pop(&mut self, button: Button) {
        let tail_is = |entries: &[HistoryEntry], action: Action| {
            entries
                .last()
                .map(|e| e.event.button == button && e.event.action == action)
                .unwrap_or(false)
        };
        if tail_is(&self.entries, Action::Up) {
            self.entries.pop();
        }
        if tail_is(&self.entries, Action::Down) {
            self.entries.pop();
        }
    }

    /// Compact the tail: drop trailing entries whose button is released and
    /// that can no longer earn a match, either because their `used` count
    /// reached `used_ceiling` or because they are an `Up` whose paired
    /// `Down` is already gone.
    pub fn tail_trim(&mut self, state: &PedalState, used_ceiling: u32) {
        while let Some(last) = self.entries.last() {
            if state.is_pressed(last.event.button) {
                break;
            }
            let orphan_up = last.event.action == Action::Up
                && !self.entries[..self.entries.len() - 1]
                    .iter()
                    .any(|e| e.event.button == last.event.button && e.event.action == Action::Down);
            if last.used >= used_ceiling || orphan_up {
                self.entries.pop();
            } else {
                break;
            }
        }
    }

    /// Enforce the soft size cap: while over `cap`, drop the oldest entry
    /// whose button is not currently held, along with the `Up` it would
    /// orphan. Entries for held buttons are never dropped.
    pub fn enforce_cap(&mut self, cap: usize, state: &PedalState) {
        while self.entries.len() > cap {
            let Some(oldest) = self
                .entries
                .iter()
                .position(|e| !state.is_pressed(e.event.button))
            else {
                break;
            };
            let removed = self.entries.remove(oldest);
            log::debug!("history over cap, dropped {removed}");
            if removed.event.action == Action::Down {
                let paired_up = self.entries[oldest..]
                    .iter()
                    .position(|e| e.event.button == removed.event.button)
                    .map(|p| oldest + p)
                    .filter(|&p| self.entries[p].event.action == Action::Up);
                if let Some(p) = paired_up {
                    self.entries.remove(p);
                }
            }
        }
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn down(button: Button) -> ButtonEvent {
        ButtonEvent::down(button, Instant::now())
    }

    fn up(button: Button) -> ButtonEvent {
        ButtonEvent::up(button, Instant::now())
    }

    fn buttons(history: &History) -> Vec<(Button, Action)> {
        history
            .snapshot()
            .iter()
            .map(|e| (e.event.button, e.event.action))
            .collect()
    }

    #[test]
    fn test_append_starts_unused() {
        let mut history = History::new();
        history.append(down(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history.snapshot()[0].used, 0);
    }

    #[test]
    fn test_mark_used_increments() {
        let mut history = History::new();
        history.append(down(1));
        history.append(down(2));
        history.mark_used(&[0]);
        history.mark_used(&[0, 1]);
        assert_eq!(history.snapshot()[0].used, 2);
        assert_eq!(history.snapshot()[1].used, 1);
    }

    #[test]
    fn test_release_pop_removes_pair() {
        let mut history = History::new();
        history.append(down(1));
        history.append(up(1));
        history.release_pop(1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_release_pop_keeps_separated_down() {
        // 1 is pressed, 2 taps in between, then 1 releases: popping the 1^
        // must leave the 1v live since 2's entries sit between them.
        let mut history = History::new();
        history.append(down(1));
        history.append(down(2));
        history.append(up(1));
        history.release_pop(1);
        assert_eq!(buttons(&history), [(1, Action::Down), (2, Action::Down)]);
    }

    #[test]
    fn test_release_pop_leaves_other_buttons() {
        let mut history = History::new();
        history.append(down(1));
        history.append(down(2));
        history.append(up(2));
        history.release_pop(2);
        assert_eq!(buttons(&history), [(1, Action::Down)]);
    }

    #[test]
    fn test_tail_trim_drops_spent_entries() {
        let mut history = History::new();
        history.append(down(1));
        history.append(up(1));
        history.mark_used(&[0, 1]);
        let state = PedalState::with_buttons(1);
        history.tail_trim(&state, 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_tail_trim_keeps_fresh_and_held() {
        let mut history = History::new();
        history.append(down(1));
        history.append(up(1));
        let state = PedalState::with_buttons(1);
        // used:0 is under the ceiling and the pair is intact
        history.tail_trim(&state, 1);
        assert_eq!(history.len(), 2);

        let mut held = PedalState::with_buttons(1);
        held.update(1, Action::Down);
        let mut history = History::new();
        history.append(down(1));
        history.mark_used(&[0]);
        history.tail_trim(&held, 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_enforce_cap_drops_oldest_released() {
        let mut state = PedalState::with_buttons(3);
        state.update(3, Action::Down);
        let mut history = History::new();
        history.append(down(1));
        history.append(up(1));
        history.append(down(2));
        history.append(up(2));
        history.append(down(3));
        history.enforce_cap(3, &state);
        assert_eq!(
            buttons(&history),
            [(2, Action::Down), (2, Action::Up), (3, Action::Down)]
        );
    }

    #[test]
    fn test_enforce_cap_drops_paired_up_with_down() {
        // Dropping 1v must also drop 1^ even with 2's entries between them,
        // otherwise the history would hold a release with no press.
        let state = PedalState::with_buttons(2);
        let mut history = History::new();
        history.append(down(1));
        history.append(down(2));
        history.append(up(2));
        history.append(up(1));
        history.enforce_cap(2, &state);
        assert_eq!(buttons(&history), [(2, Action::Down), (2, Action::Up)]);
    }

    #[test]
    fn test_enforce_cap_never_drops_held() {
        let mut state = PedalState::with_buttons(2);
        state.update(1, Action::Down);
        state.update(2, Action::Down);
        let mut history = History::new();
        history.append(down(1));
        history.append(down(2));
        history.enforce_cap(1, &state);
        assert_eq!(history.len(), 2);
    }
}
