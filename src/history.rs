//! In-memory interaction history.
//!
//! Every tool call appends one [`InteractionRecord`]. The store is a bounded
//! ring scoped to the running process: once full, the oldest record is
//! evicted, sequence numbers keep counting so the gap stays visible, and
//! nothing is persisted.

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::tools::format::truncate_chars;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Characters of input/output kept per record.
const MAX_STORED_CHARS: usize = 2000;

/// Characters of output shown per record when rendering.
pub const RENDERED_OUTPUT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InteractionStatus {
    Success,
    Failure,
}

impl std::fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One logged tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionRecord {
    /// 1-based, increasing for the life of the process
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub input: String,
    pub output: String,
    pub status: InteractionStatus,
}

#[derive(Debug)]
struct Inner {
    records: VecDeque<InteractionRecord>,
    next_sequence: u64,
    evicted: u64,
}

/// Shared, thread-safe interaction log.
///
/// Clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    session_id: Uuid,
    capacity: usize,
    inner: Arc<Mutex<Inner>>,
}

impl Default for InteractionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl InteractionHistory {
    /// Create an empty history holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            session_id: Uuid::new_v4(),
            capacity,
            inner: Arc::new(Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity.min(1024)),
                next_sequence: 1,
                evicted: 0,
            })),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the ring half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record and return its sequence number.
    pub fn record(
        &self,
        tool: impl Into<String>,
        input: impl AsRef<str>,
        output: impl AsRef<str>,
        status: InteractionStatus,
    ) -> u64 {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        if inner.records.len() >= self.capacity {
            inner.records.pop_front();
            inner.evicted += 1;
        }
        inner.records.push_back(InteractionRecord {
            sequence,
            timestamp: Utc::now(),
            tool: tool.into(),
            input: truncate_chars(input.as_ref(), MAX_STORED_CHARS),
            output: truncate_chars(output.as_ref(), MAX_STORED_CHARS),
            status,
        });
        sequence
    }

    /// Copy of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<InteractionRecord> {
        self.lock().records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Number of records dropped to honour the capacity.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Markdown rendering used by the `get_interaction_history` tool.
    pub fn render(&self) -> String {
        let (records, evicted) = {
            let inner = self.lock();
            (inner.records.iter().cloned().collect::<Vec<_>>(), inner.evicted)
        };

        if records.is_empty() {
            return "No interactions found in this session.".to_string();
        }

        let mut out = String::from("## Interaction History\n\n");
        if evicted > 0 {
            out.push_str(&format!(
                "*{} older interactions were evicted (keeping the last {}).*\n\n",
                evicted, self.capacity
            ));
        }
        for record in &records {
            out.push_str(&format!(
                "### {}. {} ({}, {})\n",
                record.sequence,
                record.tool,
                record.status,
                record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!("**Input:** {}\n", inline_code(&record.input)));
            out.push_str(&format!(
                "**Output:** {}\n\n",
                truncate_chars(&record.output, RENDERED_OUTPUT_CHARS)
            ));
        }
        out
    }
}

/// Markdown code span that survives backticks and line breaks in `text`.
fn inline_code(text: &str) -> String {
    let text = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let longest_run = text
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}
