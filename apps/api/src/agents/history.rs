// Conversation history with a bounded window
//
// Turns older than the window are folded into a running summary. The view
// handed to the model always opens with a user turn and never carries a tool
// result whose tool call was evicted.

use std::collections::VecDeque;

use super::llm::{ContentBlock, Speaker, Turn};
use super::tools::truncate_chars;

const SUMMARY_LINE_CHARS: usize = 200;
const SUMMARY_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    summary: String,
    max_turns: usize,
    evicted: usize,
}

impl ConversationHistory {
    /// `max_turns` is clamped to at least 2 so a call and its result fit
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            summary: String::new(),
            max_turns: max_turns.max(2),
            evicted: 0,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        self.compact();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns folded into the summary so far
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary.clear();
        self.evicted = 0;
    }

    /// Turns to send to the model
    ///
    /// The first turn is always a user turn. If it carries tool results whose
    /// calls were evicted, they are rendered as plain text. The running
    /// summary, when present, leads the first turn.
    pub fn request_view(&self) -> Vec<Turn> {
        let mut view: Vec<Turn> = self.turns.iter().cloned().collect();

        if let Some(first) = view.first_mut() {
            if self.evicted > 0 {
                first.content = first
                    .content
                    .drain(..)
                    .map(|block| match block {
                        ContentBlock::ToolResult { content, .. } => {
                            ContentBlock::text(format!("[Earlier tool result]: {}", content))
                        }
                        other => other,
                    })
                    .collect();
            }
            if !self.summary.is_empty() {
                first.content.insert(
                    0,
                    ContentBlock::text(format!(
                        "[Summary of earlier conversation]\n{}",
                        self.summary
                    )),
                );
            }
        }

        view
    }

    fn compact(&mut self) {
        while self.turns.len() > self.max_turns
            || self
                .turns
                .front()
                .is_some_and(|t| t.role == Speaker::Assistant && self.evicted > 0)
        {
            let Some(turn) = self.turns.pop_front() else {
                break;
            };
            self.absorb(&turn);
        }
    }

    fn absorb(&mut self, turn: &Turn) {
        self.evicted += 1;

        let speaker = match turn.role {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        };
        let mut line = turn.text();
        let calls: Vec<&str> = turn
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        if !calls.is_empty() {
            line.push_str(&format!(" [tools: {}]", calls.join(", ")));
        }
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if !self.summary.is_empty() {
            self.summary.push('\n');
        }
        self.summary
            .push_str(&format!("{}: {}", speaker, truncate_chars(line, SUMMARY_LINE_CHARS)));

        // Keep the newest part of the summary
        let count = self.summary.chars().count();
        if count > SUMMARY_MAX_CHARS {
            self.summary = self.summary.chars().skip(count - SUMMARY_MAX_CHARS).collect();
        }
    }
}
