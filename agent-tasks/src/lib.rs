//! Thinking log, task/goal list, location bookmarks, and the chat history
//! view (C11, C12, and the extension types of §3).

mod persist;

pub mod chat_history;
pub mod locations;
pub mod tasks;
pub mod thinking_log;

pub use chat_history::{ChatHistory, ChatLine};
pub use locations::{LocationPoint, LocationPoints};
pub use persist::PersistLock;
pub use tasks::{Task, TaskList};
pub use thinking_log::{EntryKind, RenderedLine, ThinkingEntry, ThinkingLog, ViewSize};
