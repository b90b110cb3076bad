//! Client side of the chat API: thread caching, reply dedup and the
//! conversation transcript used by the terminal chat.

pub mod api;
pub mod conversation;
pub mod dedup;
pub mod thread_cache;

pub use api::ChatApiClient;
pub use conversation::{acquire_thread, Conversation, DisplayRole, DisplayedMessage, ThreadRetryPolicy};
pub use dedup::DedupLoop;
pub use thread_cache::ThreadCache;
