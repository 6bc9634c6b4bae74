//! Thinking log: the bounded buffer of the bot's own narration, merged with
//! the event store for display (C11).

use crate::persist::{read_json_or_default, write_json_atomic, PersistLock};
use agent_core::clock::{format_local_hms, normalize_timestamp};
use agent_core::error::PersistenceError;
use agent_core::events::EventStore;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;

const PRIMARY_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Thinking,
    Action,
    Notice,
    /// Never persisted to the primary buffer; `event`-kind lines in a
    /// rendered view are drawn live from the event store instead.
    Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingEntry {
    pub text: String,
    pub kind: EntryKind,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSize {
    Short,
    Full,
}

#[derive(Debug, Clone)]
pub struct RenderedLine {
    pub kind: EntryKind,
    pub timestamp_s: f64,
    pub text: String,
}

pub struct ThinkingLog {
    entries: VecDeque<ThinkingEntry>,
    path: PathBuf,
    lock: PersistLock,
}

impl ThinkingLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            entries: VecDeque::with_capacity(PRIMARY_CAPACITY),
            path,
            lock: PersistLock::new(),
        }
    }

    pub async fn load(path: PathBuf) -> Result<Self, PersistenceError> {
        let entries: Vec<ThinkingEntry> = read_json_or_default(&path).await?;
        Ok(Self {
            entries: entries.into(),
            path,
            lock: PersistLock::new(),
        })
    }

    pub async fn push(&mut self, text: impl Into<String>, kind: EntryKind, timestamp: f64) -> Result<(), PersistenceError> {
        if kind == EntryKind::Event {
            // The primary buffer never stores event-kind entries in
            // practice; rendering reads those live from the event store.
            return Ok(());
        }
        if self.entries.len() == PRIMARY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(ThinkingEntry {
            text: text.into(),
            kind,
            timestamp: normalize_timestamp(timestamp),
        });
        self.persist().await
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        let snapshot: Vec<&ThinkingEntry> = self.entries.iter().collect();
        write_json_atomic(&self.path, &snapshot, &self.lock).await
    }

    /// Merges the primary buffer with live `event`-kind lines from `store`
    /// into one chronologically sorted, per-kind-budgeted view (§4.11).
    pub fn render(&self, size: ViewSize, store: &EventStore) -> Vec<RenderedLine> {
        let (thinking_cap, action_cap, notice_cap, event_store_take, event_cap) = match size {
            ViewSize::Short => (3, 8, 8, 15, 5),
            ViewSize::Full => (10, 10, 10, 20, 10),
        };

        let mut thinking = Vec::new();
        let mut action = Vec::new();
        let mut notice = Vec::new();
        for entry in self.entries.iter().rev() {
            match entry.kind {
                EntryKind::Thinking if thinking.len() < thinking_cap => thinking.push(line_from_entry(entry)),
                EntryKind::Action if action.len() < action_cap => action.push(line_from_entry(entry)),
                EntryKind::Notice if notice.len() < notice_cap => notice.push(line_from_entry(entry)),
                _ => {}
            }
        }

        let mut event: Vec<RenderedLine> = store
            .recent(event_store_take)
            .into_iter()
            .rev()
            .take(event_cap)
            .map(|e| RenderedLine {
                kind: EntryKind::Event,
                timestamp_s: e.timestamp_s(),
                text: e.to_context_string(),
            })
            .collect();

        let mut merged = Vec::with_capacity(thinking.len() + action.len() + notice.len() + event.len());
        merged.append(&mut thinking);
        merged.append(&mut action);
        merged.append(&mut notice);
        merged.append(&mut event);
        merged.sort_by(|a, b| a.timestamp_s.partial_cmp(&b.timestamp_s).unwrap_or(std::cmp::Ordering::Equal));
        merged
    }
}

fn line_from_entry(entry: &ThinkingEntry) -> RenderedLine {
    RenderedLine {
        kind: entry.kind,
        timestamp_s: entry.timestamp,
        text: entry.text.clone(),
    }
}

/// Renders a line's timestamp as `HH:MM:SS` local time, the display
/// convention every caller ultimately wants.
pub fn format_line_timestamp(line: &RenderedLine) -> String {
    format_local_hms(line.timestamp_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::events::{ChatEvent, Event, EventData};

    fn event(ts: f64) -> Event {
        Event {
            event_type: "chat".into(),
            game_tick: 0,
            timestamp: ts,
            data: EventData::Chat(ChatEvent {
                sender: "Mai".into(),
                message: "hi".into(),
                chat_type: None,
            }),
        }
    }

    #[tokio::test]
    async fn primary_buffer_never_keeps_more_than_twenty() {
        let dir = std::env::temp_dir().join(format!("agent-tasks-test-{}", unique()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let mut log = ThinkingLog::new(dir.join("thinking.json"));
        for i in 0..25 {
            log.push(format!("thought {i}"), EntryKind::Thinking, i as f64).await.unwrap();
        }
        assert_eq!(log.entries.len(), 20);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn event_kind_push_is_a_no_op_on_the_primary_buffer() {
        let dir = std::env::temp_dir().join(format!("agent-tasks-test-{}", unique()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let mut log = ThinkingLog::new(dir.join("thinking.json"));
        log.push("ignored", EntryKind::Event, 1.0).await.unwrap();
        assert!(log.entries.is_empty());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn short_view_caps_thinking_at_three_and_merges_chronologically() {
        let dir = std::env::temp_dir().join(format!("agent-tasks-test-{}", unique()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let mut log = ThinkingLog::new(dir.join("thinking.json"));
        for i in 0..6 {
            log.push(format!("t{i}"), EntryKind::Thinking, i as f64).await.unwrap();
        }
        let mut store = EventStore::with_capacity(10);
        store.add(event(10.0));

        let rendered = log.render(ViewSize::Short, &store);
        let thinking_count = rendered.iter().filter(|l| l.kind == EntryKind::Thinking).count();
        assert_eq!(thinking_count, 3);
        assert!(rendered.windows(2).all(|w| w[0].timestamp_s <= w[1].timestamp_s));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    fn unique() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}
