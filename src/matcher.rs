//! Pattern matching and command dispatch.
//!
//! The matcher owns all mutable runtime state (pedal state and history) and
//! is driven one event at a time. Each event runs through five phases:
//!
//! 1. **Ingest**: update pedal state, append a history entry.
//! 2. **Rule scan**: find every rule with a tail-aligned match, in
//!    declaration order, against the pre-event `used` counts.
//! 3. **Commit**: bump `used` on each matched entry and dispatch each
//!    matched rule's command to the sink, in declaration order.
//! 4. **Release cleanup**: when a consumed `Up` closes its press/release
//!    cycle, pop it (and its paired `Down`) from the history tail.
//! 5. **Bounded growth**: trim the oldest released entries once the history
//!    outgrows the soft cap.
//!
//! Overlapping patterns are resolved by config order alone; the engine never
//! prefers longer or more specific patterns. Every rule whose predicate
//! holds fires.

use crate::config::{Config, Rule};
use crate::event::{Action, ButtonEvent};
use crate::history::{History, HistoryEntry};
use crate::sink::CommandSink;
use crate::state::PedalState;

/// Default soft cap on history length.
pub const DEFAULT_HISTORY_CAP: usize = 256;

/// The macro engine: consumes [`ButtonEvent`]s, fires rules into the sink.
pub struct Matcher<S: CommandSink> {
    rules: Vec<Rule>,
    state: PedalState,
    history: History,
    sink: S,
    history_cap: usize,
}

impl<S: CommandSink> Matcher<S> {
    /// Create a matcher over the config's rules, dispatching into `sink`.
    pub fn new(config: &Config, sink: S) -> Self {
        Self {
            rules: config.rules.clone(),
            state: PedalState::with_buttons(config.button_count()),
            history: History::new(),
            sink,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }

    /// Override the soft cap on history length.
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /// Process one event: update state, match rules, fire commands.
    pub fn handle(&mut self, event: ButtonEvent) {
        if !self.state.is_known(event.button) {
            log::warn!("dropping event for unknown button {}", event.button);
            return;
        }
        if event.action == Action::Up && !self.state.is_pressed(event.button) {
            log::warn!("dropping release of button {} with no matching press", event.button);
            return;
        }

        // Ingest
        let (button, action) = (event.button, event.action);
        self.state.update(button, action);
        self.history.append(event);
        log::debug!("{event} | {}", self.state);

        // Rule scan, against pre-event used counts
        let matched: Vec<(usize, Vec<usize>)> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.fires_on_press() == (action == Action::Down))
            .filter_map(|(i, rule)| match_tail(rule, self.history.snapshot()).map(|m| (i, m)))
            .collect();

        // Commit
        for (i, indices) in &matched {
            self.history.mark_used(indices);
            let rule = &self.rules[*i];
            log::debug!("rule at line {} fired: {}", rule.source_line, rule.command);
            self.sink.dispatch(&rule.command);
        }

        // Release cleanup: a consumed Up closes its press/release cycle.
        // An unconsumed Up stays live; its entries may yet anchor a later
        // combination match and fall to trimming otherwise.
        if action == Action::Up && !matched.is_empty() {
            self.history.release_pop(button);
        }

        // Bounded growth
        self.history.enforce_cap(self.history_cap, &self.state);
        log::debug!("history: [{}]", self.history);
    }
}

/// Find the tail-aligned injection of `rule.sequence` into `entries`.
///
/// The final element must match the just-appended entry; earlier elements
/// match a strictly increasing subsequence of prior entries, chosen greedily
/// from the tail so that a fresh press wins over an older already-used one.
/// Returns the matched indices (ascending) or `None`.
fn match_tail(rule: &Rule, entries: &[HistoryEntry]) -> Option<Vec<usize>> {
    let seq = &rule.sequence;
    if seq.is_empty() || seq.len() > entries.len() {
        return None;
    }
    let last = entries.len() - 1;
    if !seq[seq.len() - 1].matches(&entries[last]) {
        return None;
    }

    let mut picked = vec![last; seq.len()];
    let mut below = last;
    for (k, element) in seq.iter().enumerate().rev().skip(1) {
        let found = (0..below).rev().find(|&i| element.matches(&entries[i]))?;
        picked[k] = found;
        below = found;
    }

    if let Some(limit) = rule.time_limit {
        let earliest = entries[picked[0]].event.t;
        let current = entries[last].event.t;
        if current.saturating_duration_since(earliest) > limit {
            return None;
        }
    }

    Some(picked)
}
