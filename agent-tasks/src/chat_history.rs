//! Rolling chat view over the event store (extension type, §3).

use agent_core::events::{EventData, EventStore};

const WINDOW_SECONDS: f64 = 30.0 * 60.0;
const MAX_ENTRIES: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub sender: String,
    pub message: String,
    pub timestamp_s: f64,
}

/// A view, not a store: every call re-derives the window from the event
/// store's current contents rather than keeping its own buffer.
pub struct ChatHistory<'a> {
    bot_username: &'a str,
}

impl<'a> ChatHistory<'a> {
    pub fn new(bot_username: &'a str) -> Self {
        Self { bot_username }
    }

    /// Chat events from `store`, windowed to the last 30 minutes relative
    /// to `now_s` and capped to the most recent 30, with the bot's own
    /// messages rendered as "you".
    pub fn recent(&self, store: &EventStore, now_s: f64) -> Vec<ChatLine> {
        let cutoff = now_s - WINDOW_SECONDS;
        let mut lines: Vec<ChatLine> = store
            .by_type("chat", usize::MAX)
            .into_iter()
            .filter_map(|e| {
                let EventData::Chat(chat) = &e.data else {
                    return None;
                };
                let ts = e.timestamp_s();
                if ts < cutoff {
                    return None;
                }
                let sender = if chat.sender == self.bot_username {
                    "you".to_string()
                } else {
                    chat.sender.clone()
                };
                Some(ChatLine {
                    sender,
                    message: chat.message.clone(),
                    timestamp_s: ts,
                })
            })
            .collect();

        if lines.len() > MAX_ENTRIES {
            let drop = lines.len() - MAX_ENTRIES;
            lines.drain(0..drop);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::events::{ChatEvent, Event};

    fn chat_event(sender: &str, ts: f64) -> Event {
        Event {
            event_type: "chat".into(),
            game_tick: 0,
            timestamp: ts,
            data: EventData::Chat(ChatEvent {
                sender: sender.into(),
                message: "hello".into(),
                chat_type: None,
            }),
        }
    }

    #[test]
    fn bot_messages_render_as_you() {
        let mut store = EventStore::with_capacity(10);
        store.add(chat_event("Mai", 100.0));
        store.add(chat_event("Steve", 101.0));
        let history = ChatHistory::new("Mai");
        let lines = history.recent(&store, 200.0);
        assert_eq!(lines[0].sender, "you");
        assert_eq!(lines[1].sender, "Steve");
    }

    #[test]
    fn entries_older_than_thirty_minutes_are_dropped() {
        let mut store = EventStore::with_capacity(10);
        store.add(chat_event("Steve", 0.0));
        store.add(chat_event("Steve", 5000.0));
        let history = ChatHistory::new("Mai");
        let lines = history.recent(&store, 5000.0);
        assert_eq!(lines.len(), 1);
    }
}
