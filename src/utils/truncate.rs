//! Text budgets
//!
//! Middle truncation for agent output embedded in prompts. Keeps the head and
//! tail of the text and never splits a UTF-8 character.

use serde::{Deserialize, Serialize};

const APPROX_BYTES_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "limit", rename_all = "snake_case")]
pub enum TruncationPolicy {
    Bytes(usize),
    Tokens(usize),
}

impl TruncationPolicy {
    pub fn byte_budget(&self) -> usize {
        match self {
            TruncationPolicy::Bytes(b) => *b,
            TruncationPolicy::Tokens(t) => t.saturating_mul(APPROX_BYTES_PER_TOKEN),
        }
    }
}

/// Rough token estimate (4 bytes per token).
pub fn approx_token_count(text: &str) -> usize {
    text.len().div_ceil(APPROX_BYTES_PER_TOKEN)
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Cut `content` down to the policy's byte budget, replacing the middle with a
/// marker that records how many bytes were dropped.
pub fn truncate_text(content: &str, policy: TruncationPolicy) -> String {
    let budget = policy.byte_budget();
    if content.len() <= budget {
        return content.to_string();
    }

    let half = budget / 2;
    let head_end = floor_boundary(content, half);
    let tail_start = ceil_boundary(content, content.len() - half).max(head_end);
    let dropped = tail_start - head_end;

    format!(
        "{} ... [{} chars truncated] ... {}",
        &content[..head_end],
        dropped,
        &content[tail_start..]
    )
}
