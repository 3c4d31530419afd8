//! Anti-repetition guard over blackboard writes.
//!
//! Each iteration the model is expected to contribute one substantive
//! blackboard entry. The guard compares the proposed entry against the
//! most recent entries of the same category; when it sees the model
//! restating itself it queues a warning for the next iteration's input,
//! and when the model stalls outright (no entry, a degenerate one, or
//! duplicates twice in a row) it synthesizes an auto-logged entry from
//! the iteration's observable activity so the record stays truthful.

use agentry_types::llm::ProposedEntry;
use agentry_types::memory::{BlackboardCategory, BlackboardEntry};
use serde_json::json;

/// How many recent entries a proposed entry is compared against.
const DUPLICATE_LOOKBACK: usize = 5;

/// Token-overlap ratio at or above which two entries count as duplicates.
const DUPLICATE_OVERLAP: f64 = 0.8;

/// Minimum trimmed length for an entry to count as substantive.
const MIN_SUBSTANTIVE_LEN: usize = 10;

/// What the engine should append to the blackboard this iteration.
#[derive(Debug, PartialEq)]
pub enum GuardDecision {
    /// Append the model's entry as proposed.
    Accept,
    /// Drop the model's entry (missing, degenerate, or a repeat streak)
    /// and append a synthesized activity summary instead.
    Synthesize,
}

/// Observable activity of one iteration, used to synthesize an entry
/// when the model fails to author a useful one.
#[derive(Debug, Default)]
pub struct IterationActivity {
    /// Titles of artifacts created this iteration.
    pub artifact_titles: Vec<String>,
    /// Names of tools invoked this iteration.
    pub tools_invoked: Vec<String>,
    pub scratchpad_changed: bool,
}

/// Per-session duplicate tracking. Not persisted; rebuilt fresh each run
/// (the lookback window over the stored blackboard carries the history).
#[derive(Debug, Default)]
pub struct LoopGuard {
    consecutive_duplicates: u32,
    pending_warning: Option<String>,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the model's proposed entry against the existing blackboard.
    ///
    /// Side effect: on duplication, queues a warning retrievable with
    /// [`take_warning`](Self::take_warning).
    pub fn evaluate(
        &mut self,
        blackboard: &[BlackboardEntry],
        proposed: Option<&ProposedEntry>,
    ) -> GuardDecision {
        let Some(entry) = proposed else {
            self.consecutive_duplicates = 0;
            return GuardDecision::Synthesize;
        };

        if entry.content.trim().len() < MIN_SUBSTANTIVE_LEN {
            self.consecutive_duplicates = 0;
            return GuardDecision::Synthesize;
        }

        let recent = blackboard.iter().rev().take(DUPLICATE_LOOKBACK);
        let duplicate = recent
            .filter(|prior| prior.category == entry.category)
            .any(|prior| is_near_duplicate(&prior.content, &entry.content));

        if !duplicate {
            self.consecutive_duplicates = 0;
            return GuardDecision::Accept;
        }

        self.consecutive_duplicates += 1;
        self.pending_warning = Some(format!(
            "Your last blackboard entry repeated an earlier {} entry. \
             Do not restate prior findings; record new information or \
             change strategy.",
            entry.category.as_str()
        ));

        if self.consecutive_duplicates >= 2 {
            GuardDecision::Synthesize
        } else {
            GuardDecision::Accept
        }
    }

    /// Take the queued warning, if any. Injected into the next
    /// iteration's input exactly once.
    pub fn take_warning(&mut self) -> Option<String> {
        self.pending_warning.take()
    }

    /// Current run of consecutive duplicate entries.
    pub fn duplicate_streak(&self) -> u32 {
        self.consecutive_duplicates
    }

    /// Build an auto-logged entry summarizing what actually happened in
    /// the iteration.
    pub fn synthesize(&self, iteration: u32, activity: &IterationActivity) -> BlackboardEntry {
        let mut parts = Vec::new();
        if !activity.artifact_titles.is_empty() {
            parts.push(format!(
                "created {} artifact(s): {}",
                activity.artifact_titles.len(),
                activity.artifact_titles.join(", ")
            ));
        }
        if !activity.tools_invoked.is_empty() {
            parts.push(format!("invoked tools: {}", activity.tools_invoked.join(", ")));
        }
        if activity.scratchpad_changed {
            parts.push("updated the scratchpad".to_string());
        }
        let summary = if parts.is_empty() {
            "no recorded activity".to_string()
        } else {
            parts.join("; ")
        };

        let mut entry = BlackboardEntry::new(
            BlackboardCategory::Observation,
            format!("Auto-logged iteration summary: {summary}."),
            iteration,
        );
        entry.auto = true;
        entry.tools = activity.tools_invoked.clone();
        entry.data = Some(json!({ "auto_logged": true }));
        entry
    }
}

/// Near-duplicate check: exact match after normalization, or token
/// overlap at/above the threshold.
fn is_near_duplicate(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return true;
    }
    token_overlap(&a, &b) >= DUPLICATE_OVERLAP
}

/// Lowercase and collapse whitespace runs to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard overlap of the two normalized token sets.
fn token_overlap(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let set_a: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let set_b: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
