//! Workpad
//!
//! Per-query scratch space holding the accepted output of each agent, in
//! execution order. One entry per agent name; a repeated write replaces the
//! text in place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkpadEntry {
    pub agent: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workpad {
    entries: Vec<WorkpadEntry>,
}

impl Workpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, agent: impl Into<String>, content: impl Into<String>) {
        let agent = agent.into();
        let content = content.into();
        match self.entries.iter_mut().find(|e| e.agent == agent) {
            Some(entry) => entry.content = content,
            None => self.entries.push(WorkpadEntry { agent, content }),
        }
    }

    pub fn read(&self, agent: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.agent == agent).map(|e| e.content.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[WorkpadEntry] {
        &self.entries
    }

    pub fn agents(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.agent.clone()).collect()
    }
}
