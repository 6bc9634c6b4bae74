//! Event store (C5): a bounded FIFO with filtered tail queries.

use super::Event;
use std::collections::VecDeque;
use std::collections::HashMap;

const DEFAULT_CAPACITY: usize = 500;

pub struct EventStore {
    capacity: usize,
    events: VecDeque<Event>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn recent(&self, limit: usize) -> Vec<&Event> {
        tail(&self.events, limit)
    }

    pub fn by_type(&self, event_type: &str, limit: usize) -> Vec<&Event> {
        let filtered: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect();
        tail_of_vec(filtered, limit)
    }

    pub fn by_player(&self, player_name: &str, limit: usize) -> Vec<&Event> {
        let filtered: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.player_name() == Some(player_name))
            .collect();
        tail_of_vec(filtered, limit)
    }

    pub fn stats(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for e in &self.events {
            *counts.entry(e.event_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn tail(events: &VecDeque<Event>, limit: usize) -> Vec<&Event> {
    let len = events.len();
    let start = len.saturating_sub(limit);
    events.iter().skip(start).collect()
}

fn tail_of_vec(events: Vec<&Event>, limit: usize) -> Vec<&Event> {
    let len = events.len();
    let start = len.saturating_sub(limit);
    events.into_iter().skip(start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatEvent, EventData};

    fn chat(sender: &str, ts: f64) -> Event {
        Event {
            event_type: "chat".into(),
            game_tick: 0,
            timestamp: ts,
            data: EventData::Chat(ChatEvent {
                sender: sender.into(),
                message: "hi".into(),
                chat_type: None,
            }),
        }
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut store = EventStore::with_capacity(2);
        store.add(chat("A", 1.0));
        store.add(chat("B", 2.0));
        store.add(chat("C", 3.0));
        assert_eq!(store.len(), 2);
        let recent = store.recent(10);
        assert_eq!(recent[0].player_name(), Some("B"));
        assert_eq!(recent[1].player_name(), Some("C"));
    }

    #[test]
    fn by_player_filters_and_caps() {
        let mut store = EventStore::with_capacity(10);
        store.add(chat("A", 1.0));
        store.add(chat("B", 2.0));
        store.add(chat("A", 3.0));
        let a_events = store.by_player("A", 10);
        assert_eq!(a_events.len(), 2);
    }
}
