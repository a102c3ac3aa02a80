use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How many generations a session remembers for back/forward browsing.
pub const HISTORY_DEPTH: usize = 4;

/// One generated artifact as remembered by the browsing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEntry {
    /// Image filename under the user's media directory.
    pub filename: String,
    /// Caption the generation produced.
    pub caption: String,
    /// Prompt that produced it.
    pub prompt: String,
}

/// Outcome of a back/forward step through the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStep {
    /// Moved onto a stored entry.
    Entry(GenerationEntry),
    /// Stepped forward past the newest entry, back onto the live view.
    Live,
    /// No entry exists in that direction.
    Exhausted,
}

/// Bounded back/forward history over a user's recent generations.
///
/// Entries are ordered oldest to newest and capped at [`HISTORY_DEPTH`].
/// `cursor` counts steps back from the newest entry; `None` means the user
/// is on the live (most recent) view. Generating while rewound discards the
/// viewed entry and everything newer before the new one is appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationHistory {
    entries: Vec<GenerationEntry>,
    cursor: Option<usize>,
}

impl GenerationHistory {
    /// Appends a freshly generated entry, truncating any abandoned forward
    /// entries first and dropping the oldest entry once the cap is hit.
    pub fn push(&mut self, entry: GenerationEntry) {
        if let Some(cursor) = self.cursor.take() {
            let keep = self.entries.len().saturating_sub(cursor + 1);
            self.entries.truncate(keep);
        }
        self.entries.push(entry);
        if self.entries.len() > HISTORY_DEPTH {
            self.entries.remove(0);
        }
    }

    /// Steps one entry back (towards older generations).
    pub fn back(&mut self) -> HistoryStep {
        let next = match self.cursor {
            None => 0,
            Some(cursor) => cursor + 1,
        };
        if next < self.entries.len() {
            self.cursor = Some(next);
            HistoryStep::Entry(self.entries[self.entries.len() - 1 - next].clone())
        } else {
            HistoryStep::Exhausted
        }
    }

    /// Steps one entry forward (towards newer generations). Stepping past
    /// the newest entry lands back on the live view.
    pub fn forward(&mut self) -> HistoryStep {
        match self.cursor {
            Some(0) => {
                self.cursor = None;
                HistoryStep::Live
            }
            Some(cursor) => {
                let next = cursor - 1;
                self.cursor = Some(next);
                HistoryStep::Entry(self.entries[self.entries.len() - 1 - next].clone())
            }
            None => HistoryStep::Exhausted,
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Represents a logged-in browser session, persisted in Redis keyed by the
/// session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The username, denormalized for cheap auth responses.
    pub username: String,
    /// Back/forward history of the user's recent generations.
    #[serde(default)]
    pub history: GenerationHistory,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str) -> GenerationEntry {
        GenerationEntry {
            filename: format!("img_{tag}.png"),
            caption: format!("caption {tag}"),
            prompt: format!("prompt {tag}"),
        }
    }

    #[test]
    fn back_steps_through_recent_generations() {
        let mut history = GenerationHistory::default();
        history.push(entry("a"));
        history.push(entry("b"));
        history.push(entry("c"));

        assert_eq!(history.back(), HistoryStep::Entry(entry("c")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("b")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("a")));
        assert_eq!(history.back(), HistoryStep::Exhausted);
    }

    #[test]
    fn forward_returns_to_live_view() {
        let mut history = GenerationHistory::default();
        history.push(entry("a"));
        history.push(entry("b"));
        history.back();
        history.back();

        assert_eq!(history.forward(), HistoryStep::Entry(entry("b")));
        assert_eq!(history.forward(), HistoryStep::Live);
        assert_eq!(history.forward(), HistoryStep::Exhausted);
    }

    #[test]
    fn back_on_empty_history_is_exhausted() {
        let mut history = GenerationHistory::default();
        assert_eq!(history.back(), HistoryStep::Exhausted);
    }

    #[test]
    fn push_caps_depth() {
        let mut history = GenerationHistory::default();
        for tag in ["a", "b", "c", "d", "e"] {
            history.push(entry(tag));
        }

        assert_eq!(history.len(), HISTORY_DEPTH);
        // Oldest entry was dropped, so rewinding all the way lands on "b".
        assert_eq!(history.back(), HistoryStep::Entry(entry("e")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("d")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("c")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("b")));
        assert_eq!(history.back(), HistoryStep::Exhausted);
    }

    #[test]
    fn push_while_rewound_discards_forward_entries() {
        let mut history = GenerationHistory::default();
        history.push(entry("a"));
        history.push(entry("b"));
        history.push(entry("c"));
        history.back();
        history.back();
        // Viewing "b"; generating now branches off and drops "b" and "c".
        history.push(entry("d"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.back(), HistoryStep::Entry(entry("d")));
        assert_eq!(history.back(), HistoryStep::Entry(entry("a")));
        assert_eq!(history.back(), HistoryStep::Exhausted);
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut history = GenerationHistory::default();
        history.push(entry("a"));
        let session = Session {
            user_id: Uuid::new_v4(),
            username: "maria".to_string(),
            history,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(7),
        };

        let json = sonic_rs::to_string(&session).unwrap();
        let mut restored: Session = sonic_rs::from_str(&json).unwrap();
        assert_eq!(restored.user_id, session.user_id);
        assert_eq!(restored.history.back(), HistoryStep::Entry(entry("a")));
    }
}
