use super::types::{MessageRole, ThreadMessage};

/// Pick the reply text out of a thread's message list.
///
/// Returns the text of the first agent message in the order given, with its
/// text segments concatenated. No ordering is applied here: the result is the
/// most recent reply only when the service lists messages newest-first.
pub fn extract_reply(messages: &[ThreadMessage]) -> Option<String> {
    messages
        .iter()
        .find(|message| message.role == MessageRole::Agent)
        .map(|message| message.text_segments().collect())
}
