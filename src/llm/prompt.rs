//! Prompt construction and bounded conversation memory.

use chrono::{Duration, NaiveDate};
use std::collections::VecDeque;

/// Rolling record of (user, assistant) turns embedded in every prompt.
///
/// Trimmed oldest-first to a character budget; there is no model-side
/// summarization, just a bounded transcript. Cleared by the restart control
/// intent.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<(String, String)>,
    max_chars: usize,
}

impl ConversationMemory {
    /// Memory bounded to roughly `max_chars` characters of transcript.
    pub fn new(max_chars: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_chars,
        }
    }

    /// Record one completed turn.
    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.turns.push_back((user.to_owned(), assistant.to_owned()));
        while self.transcript_len() > self.max_chars && self.turns.len() > 1 {
            self.turns.pop_front();
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Whether any turns are recorded.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The transcript embedded in the prompt.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|(user, assistant)| format!("User: {user}\nAssistant: {assistant}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn transcript_len(&self) -> usize {
        self.turns
            .iter()
            .map(|(user, assistant)| user.len() + assistant.len())
            .sum()
    }
}

/// Build the full prompt for one turn.
///
/// Embeds the running transcript, the current and next date (so the model
/// can resolve relative dates like "tomorrow"), the task context, and the
/// detected emotion.
pub fn build_prompt(
    user_message: &str,
    context_json: &str,
    emotion: &str,
    memory: &ConversationMemory,
    today: NaiveDate,
) -> String {
    let tomorrow = today + Duration::days(1);
    let transcript = memory.transcript();

    format!(
        r#"You are PATO, a friendly voice assistant that manages the user's personal tasks.

Conversation so far:
{transcript}

Current date: {today}

INSTRUCTIONS:
1. ALWAYS answer with a single JSON object of this shape:
   {{ "response": "friendly text for the user", "tool_calls": [...] }}
2. Output nothing outside the JSON object.
3. When the user asks for task operations, fill "tool_calls" with one entry per operation:
   - "action": one of "add", "remove", "complete", "modify", "undo", "query".
   - "task": the task name (when it applies).
   - "new_task": the replacement name (only for "modify").
   - "due_date": convert relative dates like "tomorrow" to YYYY-MM-DD (tomorrow is {tomorrow}).
   - "priority": one of "low", "normal", "high", "urgent"; include it only when the user mentions it.
4. When the user just wants to chat, "tool_calls" must be an empty list.
5. The detected emotion is "{emotion}"; adjust the tone of "response" accordingly.
6. Do not use line breaks inside "response".

Emotion detected: {emotion}
Task context: {context_json}

User: {user_message}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_trims_oldest_turns_first() {
        let mut memory = ConversationMemory::new(40);
        memory.record_turn("first question here", "first answer here");
        memory.record_turn("second question here", "second answer here");

        let transcript = memory.transcript();
        assert!(!transcript.contains("first question"));
        assert!(transcript.contains("second question"));
    }

    #[test]
    fn clear_forgets_the_transcript() {
        let mut memory = ConversationMemory::new(1024);
        memory.record_turn("hola", "buenas");
        assert!(!memory.is_empty());
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.transcript().is_empty());
    }

    #[test]
    fn prompt_embeds_dates_context_and_emotion() {
        let memory = ConversationMemory::new(1024);
        let today = NaiveDate::from_ymd_opt(2026, 8, 26).expect("valid date");
        let prompt = build_prompt("add buy bread", "{\"pending_tasks\":[]}", "happy", &memory, today);

        assert!(prompt.contains("Current date: 2026-08-26"));
        assert!(prompt.contains("tomorrow is 2026-08-27"));
        assert!(prompt.contains("\"pending_tasks\""));
        assert!(prompt.contains("happy"));
        assert!(prompt.contains("User: add buy bread"));
    }
}
